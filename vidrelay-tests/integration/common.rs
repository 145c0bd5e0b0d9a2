//! Shared helpers: fake upstream servers and request plumbing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;
use vidrelay_core::RelayConfig;
use vidrelay_web::AppState;

/// What a fake mirror answers to every request.
#[derive(Debug, Clone)]
pub enum MirrorBehavior {
    Status(u16),
    Html,
    /// 200 with a JSON content type but a truncated body
    TruncatedJson,
    Json(Value),
}

impl IntoResponse for MirrorBehavior {
    fn into_response(self) -> Response {
        match self {
            MirrorBehavior::Status(code) => (
                StatusCode::from_u16(code).unwrap(),
                Json(serde_json::json!({ "error": "mirror unavailable" })),
            )
                .into_response(),
            MirrorBehavior::Html => {
                Html("<html><body>Please complete the captcha</body></html>").into_response()
            }
            MirrorBehavior::TruncatedJson => (
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"title": "cut of"#,
            )
                .into_response(),
            MirrorBehavior::Json(value) => Json(value).into_response(),
        }
    }
}

/// A running fake mirror and the number of requests it served.
pub struct FakeMirror {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl FakeMirror {
    pub async fn spawn(behavior: MirrorBehavior) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().fallback(move || {
            let counter = Arc::clone(&counter);
            let behavior = behavior.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                behavior
            }
        });

        let addr = spawn_server(router).await;
        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `router` on an ephemeral localhost port for the rest of the test.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Base URL of a localhost port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Production state with real HTTP clients, one attempt per mirror.
pub fn http_state(mirrors: &[&str]) -> AppState {
    let config = RelayConfig::for_testing(mirrors.iter().map(|m| m.to_string()).collect());
    AppState::from_config(&config.upstream).unwrap()
}

/// Same as [`http_state`] with a custom per-attempt timeout.
pub fn http_state_with_timeout(mirrors: &[&str], attempt_timeout: Duration) -> AppState {
    let mut config = RelayConfig::for_testing(mirrors.iter().map(|m| m.to_string()).collect());
    config.upstream.attempt_timeout = attempt_timeout;
    AppState::from_config(&config.upstream).unwrap()
}

/// Accepts connections and never writes a byte back.
pub async fn spawn_silent_host() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Answers every connection with `head` and `partial_body`, then hangs up.
///
/// Returns the address and a counter of accepted connections.
pub async fn spawn_truncating_host(
    head: &'static str,
    partial_body: &'static [u8],
) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(partial_body).await;
                let _ = socket.flush().await;
            });
        }
    });
    (addr, accepted)
}

/// Response captured from a oneshot request.
pub struct Captured {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(router: Router, request: Request<Body>) -> Captured {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Captured {
        status,
        headers,
        body,
    }
}

pub async fn get(router: Router, uri: &str) -> Captured {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}
