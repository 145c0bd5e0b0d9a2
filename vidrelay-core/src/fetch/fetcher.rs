//! Sequential retry-and-failover over the mirror registry

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{AttemptFailure, Delay, FetchError, TokioDelay, UpstreamTransport};
use crate::mirrors::{Mirror, MirrorRegistry};

/// How hard the fetcher tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts against one mirror before moving to the next one
    pub max_attempts_per_mirror: u32,
    /// Fixed wait between two attempts on the same mirror
    pub backoff: Duration,
    /// Bound on the whole mirror chain (None = unbounded)
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_mirror: 3,
            backoff: Duration::from_secs(1),
            deadline: Some(Duration::from_secs(30)),
        }
    }
}

/// Fetches JSON documents from the first mirror able to serve them.
///
/// Mirrors are contacted strictly in registry order, one attempt at a time.
/// The first attempt that yields a parseable JSON body wins and no later
/// mirror is contacted. The fetcher holds no mutable state, so one instance
/// is shared by every request.
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    registry: Arc<MirrorRegistry>,
    transport: Arc<dyn UpstreamTransport>,
    delay: Arc<dyn Delay>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    /// Creates a fetcher that sleeps on the tokio timer between attempts.
    pub fn new(
        registry: Arc<MirrorRegistry>,
        transport: Arc<dyn UpstreamTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            transport,
            delay: Arc::new(TokioDelay),
            policy,
        }
    }

    /// Replaces the backoff delay implementation.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Mirrors this fetcher walks through.
    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }

    /// Active retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches `relative_path` using the configured attempts per mirror.
    ///
    /// # Errors
    /// - `FetchError::AllSourcesUnavailable` - Every mirror failed every attempt
    /// - `FetchError::DeadlineExceeded` - The request deadline elapsed first
    pub async fn fetch_json(&self, relative_path: &str) -> Result<Value, FetchError> {
        self.fetch_json_with_attempts(relative_path, self.policy.max_attempts_per_mirror)
            .await
    }

    /// Fetches `relative_path` with an explicit attempt budget per mirror.
    ///
    /// A budget of zero is treated as one attempt.
    ///
    /// # Errors
    /// - `FetchError::AllSourcesUnavailable` - Every mirror failed every attempt
    /// - `FetchError::DeadlineExceeded` - The request deadline elapsed first
    pub async fn fetch_json_with_attempts(
        &self,
        relative_path: &str,
        max_attempts_per_mirror: u32,
    ) -> Result<Value, FetchError> {
        let attempts = max_attempts_per_mirror.max(1);

        let Some(deadline) = self.policy.deadline else {
            return self.walk_mirrors(relative_path, attempts).await;
        };

        // Dropping the chain future on timeout aborts the in-flight attempt.
        match tokio::time::timeout(deadline, self.walk_mirrors(relative_path, attempts)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    path = relative_path,
                    "Upstream request exceeded deadline of {:?}",
                    deadline
                );
                Err(FetchError::DeadlineExceeded {
                    path: relative_path.to_string(),
                    deadline,
                })
            }
        }
    }

    async fn walk_mirrors(&self, relative_path: &str, attempts: u32) -> Result<Value, FetchError> {
        let mut last_failure: Option<AttemptFailure> = None;

        for mirror in self.registry.iter() {
            match self.try_mirror(mirror, relative_path, attempts).await {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    tracing::warn!(
                        mirror = %mirror,
                        path = relative_path,
                        "Abandoning mirror after {} attempts: {}",
                        attempts,
                        failure
                    );
                    last_failure = Some(failure);
                }
            }
        }

        Err(FetchError::AllSourcesUnavailable {
            path: relative_path.to_string(),
            mirrors_tried: self.registry.len(),
            last_failure: last_failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no attempt was made".to_string()),
        })
    }

    /// Runs up to `attempts` attempts against one mirror, returning the last
    /// failure when all of them were rejected.
    async fn try_mirror(
        &self,
        mirror: &Mirror,
        relative_path: &str,
        attempts: u32,
    ) -> Result<Value, AttemptFailure> {
        let url = mirror.url_for(relative_path);
        let mut attempt = 1;

        loop {
            tracing::debug!(
                mirror = %mirror,
                path = relative_path,
                attempt,
                "Fetching upstream JSON"
            );

            match self.attempt(&url).await {
                Ok(value) => {
                    tracing::debug!(
                        mirror = %mirror,
                        path = relative_path,
                        attempt,
                        "Upstream answered"
                    );
                    return Ok(value);
                }
                Err(failure) => {
                    tracing::warn!(
                        mirror = %mirror,
                        path = relative_path,
                        attempt,
                        max_attempts = attempts,
                        "Upstream attempt failed: {}",
                        failure
                    );

                    if attempt >= attempts {
                        return Err(failure);
                    }
                }
            }

            self.delay.wait(self.policy.backoff).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Value, AttemptFailure> {
        let response = self.transport.get(url).await?;

        if !response.is_success() {
            return Err(AttemptFailure::Status {
                status: response.status,
            });
        }

        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => {
                if !response.declares_json() {
                    tracing::debug!(
                        url,
                        content_type = ?response.content_type,
                        "Accepted JSON body with non-JSON content type"
                    );
                }
                Ok(value)
            }
            Err(e) if response.declares_json() => Err(AttemptFailure::MalformedBody {
                reason: e.to_string(),
            }),
            Err(_) => Err(AttemptFailure::UnexpectedContentType {
                content_type: response
                    .content_type
                    .unwrap_or_else(|| "<none>".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::fetch::{NoDelay, TransportError, UpstreamResponse};
    use crate::testing::{RecordingDelay, ScriptedTransport};

    #[derive(Debug)]
    struct HangingTransport;

    #[async_trait]
    impl UpstreamTransport for HangingTransport {
        async fn get(&self, _url: &str) -> Result<UpstreamResponse, TransportError> {
            futures::future::pending().await
        }
    }

    fn registry(urls: &[&str]) -> Arc<MirrorRegistry> {
        Arc::new(MirrorRegistry::new(urls.iter().copied()).unwrap())
    }

    fn fetcher_with(
        urls: &[&str],
        transport: Arc<ScriptedTransport>,
        delay: Arc<dyn Delay>,
    ) -> ResilientFetcher {
        ResilientFetcher::new(registry(urls), transport, RetryPolicy::default()).with_delay(delay)
    }

    #[tokio::test]
    async fn test_first_mirror_success_stops_iteration() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://a.example/api/v1/videos/x",
            vec![ScriptedTransport::ok_json(json!({"ok": 1}))],
        );
        let fetcher = fetcher_with(
            &["https://a.example", "https://b.example"],
            transport.clone(),
            Arc::new(NoDelay),
        );

        let value = fetcher.fetch_json("/api/v1/videos/x").await.unwrap();

        assert_eq!(value, json!({"ok": 1}));
        assert_eq!(transport.calls(), vec!["https://a.example/api/v1/videos/x"]);
    }

    #[tokio::test]
    async fn test_failover_abandons_two_mirrors_and_stops_at_third() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://a.example/p",
            vec![
                ScriptedTransport::status(503),
                ScriptedTransport::status(502),
                ScriptedTransport::status(500),
            ],
        );
        // b.example is unscripted: every attempt is a connection failure.
        transport.script(
            "https://c.example/p",
            vec![ScriptedTransport::ok_json(json!([1, 2, 3]))],
        );
        let delay = Arc::new(RecordingDelay::default());
        let fetcher = fetcher_with(
            &[
                "https://a.example",
                "https://b.example",
                "https://c.example",
                "https://d.example",
            ],
            transport.clone(),
            delay.clone(),
        );

        let value = fetcher.fetch_json("/p").await.unwrap();

        assert_eq!(value, json!([1, 2, 3]));
        assert_eq!(transport.calls_to("https://a.example"), 3);
        assert_eq!(transport.calls_to("https://b.example"), 3);
        assert_eq!(transport.calls_to("https://c.example"), 1);
        assert_eq!(transport.calls_to("https://d.example"), 0);
        // Two waits on each abandoned mirror, none after a mirror's last attempt.
        assert_eq!(delay.waits(), 4);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_same_mirror() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://a.example/p",
            vec![
                ScriptedTransport::status(500),
                ScriptedTransport::ok_json(json!({"title": "ok"})),
            ],
        );
        let delay = Arc::new(RecordingDelay::default());
        let fetcher = fetcher_with(
            &["https://a.example", "https://b.example"],
            transport.clone(),
            delay.clone(),
        );

        let value = fetcher.fetch_json("/p").await.unwrap();

        assert_eq!(value["title"], "ok");
        assert_eq!(transport.calls_to("https://a.example"), 2);
        assert_eq!(transport.calls_to("https://b.example"), 0);
        assert_eq!(delay.waits(), 1);
    }

    #[tokio::test]
    async fn test_html_response_counts_as_failed_attempt() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://a.example/p",
            vec![
                ScriptedTransport::html_page(),
                ScriptedTransport::html_page(),
                ScriptedTransport::html_page(),
            ],
        );
        transport.script("https://b.example/p", vec![ScriptedTransport::ok_json(json!({}))]);
        let fetcher = fetcher_with(
            &["https://a.example", "https://b.example"],
            transport.clone(),
            Arc::new(NoDelay),
        );

        fetcher.fetch_json("/p").await.unwrap();

        assert_eq!(transport.calls_to("https://a.example"), 3);
        assert_eq!(transport.calls_to("https://b.example"), 1);
    }

    #[tokio::test]
    async fn test_json_body_with_wrong_content_type_is_accepted() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://a.example/p",
            vec![Ok(UpstreamResponse {
                status: 200,
                content_type: Some("text/plain".to_string()),
                body: Bytes::from_static(br#"{"videoId":"abc"}"#),
            })],
        );
        let fetcher = fetcher_with(&["https://a.example"], transport.clone(), Arc::new(NoDelay));

        let value = fetcher.fetch_json("/p").await.unwrap();

        assert_eq!(value["videoId"], "abc");
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_retried() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://a.example/p",
            vec![
                Ok(UpstreamResponse::json(200, r#"{"truncated": "#)),
                ScriptedTransport::ok_json(json!({"complete": true})),
            ],
        );
        let fetcher = fetcher_with(&["https://a.example"], transport.clone(), Arc::new(NoDelay));

        let value = fetcher.fetch_json("/p").await.unwrap();

        assert_eq!(value["complete"], true);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_single_unavailable_error() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            "https://b.example/p",
            vec![
                ScriptedTransport::status(503),
                ScriptedTransport::status(503),
                ScriptedTransport::status(503),
            ],
        );
        let delay = Arc::new(RecordingDelay::default());
        let fetcher = fetcher_with(
            &["https://a.example", "https://b.example"],
            transport.clone(),
            delay.clone(),
        );

        let error = fetcher.fetch_json("/p").await.unwrap_err();

        assert!(matches!(
            &error,
            FetchError::AllSourcesUnavailable { path, mirrors_tried: 2, last_failure }
                if path == "/p" && last_failure.contains("503")
        ));
        assert_eq!(error.path(), "/p");
        assert_eq!(transport.calls().len(), 6);
        assert_eq!(delay.waits(), 4);
    }

    #[tokio::test]
    async fn test_explicit_attempt_budget_overrides_policy() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = fetcher_with(
            &["https://a.example", "https://b.example"],
            transport.clone(),
            Arc::new(NoDelay),
        );

        let result = fetcher.fetch_json_with_attempts("/p", 1).await;

        assert!(result.is_err());
        assert_eq!(
            transport.calls(),
            vec!["https://a.example/p", "https://b.example/p"]
        );
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_tries_each_mirror_once() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = fetcher_with(&["https://a.example"], transport.clone(), Arc::new(NoDelay));

        let _ = fetcher.fetch_json_with_attempts("/p", 0).await;

        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_aborts_hanging_mirror() {
        let policy = RetryPolicy {
            deadline: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let fetcher = ResilientFetcher::new(
            registry(&["https://slow.example"]),
            Arc::new(HangingTransport),
            policy,
        )
        .with_delay(Arc::new(NoDelay));

        let error = fetcher.fetch_json("/api/v1/videos/x").await.unwrap_err();

        assert_eq!(
            error,
            FetchError::DeadlineExceeded {
                path: "/api/v1/videos/x".to_string(),
                deadline: Duration::from_millis(20),
            }
        );
    }
}
