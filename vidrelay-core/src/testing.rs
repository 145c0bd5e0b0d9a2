//! Test doubles for the fetch layer.
//!
//! Available to this crate's unit tests and, through the `test-utils`
//! feature, to downstream crates.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::fetch::{Delay, TransportError, UpstreamResponse, UpstreamTransport};

/// One scripted outcome for a single GET.
pub type ScriptedResponse = Result<UpstreamResponse, TransportError>;

/// Transport replaying scripted responses per URL and recording every call.
///
/// Unscripted URLs, or URLs whose script ran out, fail with a connection
/// error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues responses for `url`, replacing any previous script.
    pub fn script(&self, url: &str, responses: Vec<ScriptedResponse>) {
        self.scripts
            .lock()
            .insert(url.to_string(), responses.into_iter().collect());
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|u| u.starts_with(prefix))
            .count()
    }

    /// 200 response with a JSON content type.
    pub fn ok_json(value: serde_json::Value) -> ScriptedResponse {
        Ok(UpstreamResponse::json(200, value.to_string()))
    }

    /// Response with the given status and a small JSON error body.
    pub fn status(code: u16) -> ScriptedResponse {
        Ok(UpstreamResponse::json(code, r#"{"error":"unavailable"}"#))
    }

    /// 200 response carrying an HTML interstitial instead of JSON.
    pub fn html_page() -> ScriptedResponse {
        Ok(UpstreamResponse {
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: Bytes::from_static(b"<html><body>Checking your browser</body></html>"),
        })
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, TransportError> {
        self.calls.lock().push(url.to_string());
        self.scripts
            .lock()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportError::Connection {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                })
            })
    }
}

/// Delay that returns immediately and counts how often it was asked to wait.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    waits: AtomicUsize,
}

impl RecordingDelay {
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn wait(&self, _duration: Duration) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}
