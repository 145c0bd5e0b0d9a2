//! Route behavior against scripted mirrors, without any network.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use vidrelay_core::testing::ScriptedTransport;
use vidrelay_core::{MediaRelay, MirrorRegistry, NoDelay, ResilientFetcher, RetryPolicy};
use vidrelay_web::{AppState, build_router};

use crate::common::get;

const PRIMARY: &str = "https://primary.example";
const SECONDARY: &str = "https://secondary.example";

fn router(transport: Arc<ScriptedTransport>) -> axum::Router {
    let registry = Arc::new(MirrorRegistry::new([PRIMARY, SECONDARY]).unwrap());
    let policy = RetryPolicy {
        max_attempts_per_mirror: 2,
        backoff: Duration::from_millis(500),
        deadline: None,
    };
    let fetcher = ResilientFetcher::new(registry, transport, policy).with_delay(Arc::new(NoDelay));
    let state = AppState::new(
        Arc::new(fetcher),
        MediaRelay::from_client(reqwest::Client::new()),
    );
    build_router(state, None)
}

#[tokio::test]
async fn test_invalid_video_id_rejected_before_network() {
    let transport = Arc::new(ScriptedTransport::new());

    let response = get(router(transport.clone()), "/api/video/bad.id").await;

    assert_eq!(response.status, 400);
    assert!(response.json()["error"].is_string());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_unplayable_video_returns_raw_formats() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(
        &format!("{PRIMARY}/api/v1/videos/abc"),
        vec![ScriptedTransport::ok_json(json!({
            "title": "Audio only",
            "formatStreams": [],
            "adaptiveFormats": [{"itag": 140, "type": "audio/m4a", "url": "https://media/140"}]
        }))],
    );

    let response = get(router(transport), "/api/video/abc").await;

    assert_eq!(response.status, 404);
    let body = response.json();
    assert_eq!(body["formatStreams"], json!([]));
    assert_eq!(body["adaptiveFormats"][0]["itag"], 140);
}

#[tokio::test]
async fn test_all_mirrors_down_returns_500_with_details() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(
        &format!("{PRIMARY}/api/v1/videos/abc"),
        vec![ScriptedTransport::status(503), ScriptedTransport::status(503)],
    );
    transport.script(
        &format!("{SECONDARY}/api/v1/videos/abc"),
        vec![ScriptedTransport::html_page(), ScriptedTransport::status(429)],
    );

    let response = get(router(transport.clone()), "/api/video/abc").await;

    assert_eq!(response.status, 500);
    let body = response.json();
    assert_eq!(body["error"], "Failed to fetch video");
    assert!(body["details"].as_str().unwrap().contains("429"));
    assert_eq!(transport.calls().len(), 4);
}

#[tokio::test]
async fn test_retry_on_same_mirror_before_failover() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(
        &format!("{PRIMARY}/api/v1/videos/abc"),
        vec![
            ScriptedTransport::html_page(),
            ScriptedTransport::ok_json(json!({
                "title": "Second try",
                "formatStreams": [{"itag": "18", "url": "https://media/18", "type": "video/mp4"}]
            })),
        ],
    );

    let response = get(router(transport.clone()), "/api/video/abc").await;

    assert_eq!(response.status, 200);
    assert_eq!(
        response.json(),
        json!({"videoUrl": "https://media/18", "mimeType": "video/mp4", "title": "Second try"})
    );
    assert_eq!(transport.calls_to(SECONDARY), 0);
}

#[tokio::test]
async fn test_legacy_video_route() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(
        &format!("{PRIMARY}/api/v1/videos/abc"),
        vec![ScriptedTransport::ok_json(json!({
            "formatStreams": [{"itag": 18, "url": "https://media/18"}]
        }))],
    );

    let missing = get(router(transport.clone()), "/video").await;
    assert_eq!(missing.status, 400);

    let found = get(router(transport), "/video?id=abc").await;
    assert_eq!(found.status, 200);
    assert_eq!(found.json(), json!({"url": "https://media/18"}));
}

#[tokio::test]
async fn test_blank_search_rejected_before_network() {
    let transport = Arc::new(ScriptedTransport::new());

    for uri in ["/api/search", "/api/search?q=", "/api/search?q=%20%20"] {
        let response = get(router(transport.clone()), uri).await;
        assert_eq!(response.status, 400, "{uri}");
    }
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_page_gets_json_error_before_network() {
    let transport = Arc::new(ScriptedTransport::new());

    for uri in ["/api/search?q=cats&page=abc", "/api/search?q=cats&page=-1"] {
        let response = get(router(transport.clone()), uri).await;
        assert_eq!(response.status, 400, "{uri}");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.json()["error"], "Invalid page number");
    }
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_blank_page_means_first_page() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(
        &format!("{PRIMARY}/api/v1/search?q=cats&type=video"),
        vec![ScriptedTransport::ok_json(json!([]))],
    );

    let response = get(router(transport), "/api/search?q=cats&page=").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.json(), json!({"results": []}));
}

#[tokio::test]
async fn test_search_returns_normalized_results() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(
        &format!("{PRIMARY}/api/v1/search?q=lofi%20beats&type=video&page=2"),
        vec![ScriptedTransport::ok_json(json!([
            {"videoId": "a", "title": "T"},
            {"videoId": "b", "title": "U", "lengthSeconds": 61,
             "videoThumbnails": [{"url": "https://img/b.jpg", "width": 120}]}
        ]))],
    );

    let response = get(router(transport), "/api/search?q=lofi%20beats&page=2").await;

    assert_eq!(response.status, 200);
    assert_eq!(
        response.json(),
        json!({"results": [
            {"videoId": "a", "title": "T", "thumbnail": ""},
            {"videoId": "b", "title": "U", "thumbnail": "https://img/b.jpg"}
        ]})
    );
}

#[tokio::test]
async fn test_proxy_requires_url_or_id() {
    let transport = Arc::new(ScriptedTransport::new());

    let missing = get(router(transport.clone()), "/proxy-video").await;
    assert_eq!(missing.status, 400);

    let bad_scheme = get(router(transport.clone()), "/proxy-video?url=ftp%3A%2F%2Fhost%2Fv.mp4").await;
    assert_eq!(bad_scheme.status, 400);
    assert!(bad_scheme.json()["error"].as_str().unwrap().contains("Invalid media URL"));

    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_proxy_refuses_private_destinations() {
    let transport = Arc::new(ScriptedTransport::new());

    for target in [
        "http://127.0.0.1:9/clip.mp4",
        "http://169.254.169.254/latest/meta-data/",
        "http://localhost:3000/health",
    ] {
        let uri = format!("/proxy-video?url={}", urlencoding::encode(target));
        let response = get(router(transport.clone()), &uri).await;
        assert_eq!(response.status, 400, "{target}");
        assert!(
            response.json()["error"]
                .as_str()
                .unwrap()
                .contains("not publicly routable")
        );
    }
}

#[tokio::test]
async fn test_cors_headers_present() {
    let transport = Arc::new(ScriptedTransport::new());
    let request = axum::http::Request::get("/health")
        .header("Origin", "https://player.example")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = crate::common::send(router(transport), request).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert_eq!(response.json()["status"], Value::from("ok"));
}
