//! Byte relay against a fake media host.

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get as route_get;
use serde_json::json;
use tower::ServiceExt;
use vidrelay_web::build_router;

use crate::common::{
    FakeMirror, MirrorBehavior, get, http_state, http_state_with_timeout, send, spawn_server,
    spawn_silent_host, spawn_truncating_host,
};

const MEDIA: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake media payload";

async fn ranged(headers: HeaderMap) -> impl IntoResponse {
    match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some("bytes=0-3") => (
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, "video/mp4".to_string()),
                (header::CONTENT_RANGE, format!("bytes 0-3/{}", MEDIA.len())),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            &MEDIA[..4],
        )
            .into_response(),
        _ => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
    }
}

async fn media_host() -> String {
    let router = Router::new()
        .route(
            "/clip.mp4",
            route_get(|| async { ([(header::CONTENT_TYPE, "application/octet-stream")], MEDIA) }),
        )
        .route(
            "/videoplayback",
            route_get(|| async { ([(header::CONTENT_TYPE, "text/plain")], MEDIA) }),
        )
        .route(
            "/forbidden",
            route_get(|| async { (StatusCode::FORBIDDEN, "secret upstream error page") }),
        )
        .route("/ranged", route_get(ranged));
    format!("http://{}", spawn_server(router).await)
}

fn proxy_uri(media_url: &str) -> String {
    format!("/proxy-video?url={}", urlencoding::encode(media_url))
}

#[tokio::test]
async fn test_streams_bytes_with_guessed_container_type() {
    let host = media_host().await;
    let router = build_router(http_state(&["https://unused.example"]), None);

    let response = get(router, &proxy_uri(&format!("{host}/clip.mp4"))).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("video/mp4"));
    assert_eq!(response.header("accept-ranges"), None);
    assert_eq!(response.body, MEDIA);
}

#[tokio::test]
async fn test_mime_query_parameter_sets_content_type() {
    let host = media_host().await;
    let router = build_router(http_state(&["https://unused.example"]), None);

    let response = get(
        router,
        &proxy_uri(&format!("{host}/videoplayback?itag=43&mime=video%2Fwebm")),
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("video/webm"));
}

#[tokio::test]
async fn test_upstream_refusal_writes_no_upstream_bytes() {
    let host = media_host().await;
    let router = build_router(http_state(&["https://unused.example"]), None);

    let response = get(router, &proxy_uri(&format!("{host}/forbidden"))).await;

    assert_eq!(response.status, 500);
    assert_eq!(response.json()["error"], "Failed to proxy video");
    assert!(!String::from_utf8_lossy(&response.body).contains("secret upstream error page"));
}

#[tokio::test]
async fn test_range_request_is_forwarded() {
    let host = media_host().await;
    let router = build_router(http_state(&["https://unused.example"]), None);
    let request = Request::get(proxy_uri(&format!("{host}/ranged")))
        .header(header::RANGE, "bytes=0-3")
        .body(Body::empty())
        .unwrap();

    let response = send(router, request).await;

    assert_eq!(response.status, 206);
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes 0-3/{}", MEDIA.len()).as_str())
    );
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.body, &MEDIA[..4]);
}

#[tokio::test]
async fn test_proxy_by_video_id_resolves_then_relays() {
    let host = media_host().await;
    let mirror = FakeMirror::spawn(MirrorBehavior::Json(json!({
        "title": "Relayed",
        "formatStreams": [{"itag": 18, "url": format!("{host}/clip.mp4"), "type": "video/mp4"}]
    })))
    .await;
    let router = build_router(http_state(&[&mirror.base_url]), None);

    let response = get(router, "/proxy-video?id=abc").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, MEDIA);
    assert_eq!(mirror.hits(), 1);
}

#[tokio::test]
async fn test_silent_media_host_fails_within_attempt_timeout() {
    let addr = spawn_silent_host().await;
    let state = http_state_with_timeout(&["https://unused.example"], Duration::from_millis(300));
    let router = build_router(state, None);

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        get(router, &proxy_uri(&format!("http://{addr}/clip.mp4"))),
    )
    .await
    .expect("relay must give up on a silent host");

    assert_eq!(response.status, 500);
    assert_eq!(response.json()["error"], "Failed to proxy video");
}

#[tokio::test]
async fn test_mid_stream_drop_ends_body_without_retry() {
    let (addr, accepted) = spawn_truncating_host(
        "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 1000\r\n\r\n",
        b"0123456789",
    )
    .await;
    let router = build_router(http_state(&["https://unused.example"]), None);
    let request = Request::get(proxy_uri(&format!("http://{addr}/clip.mp4")))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        "1000"
    );

    let body = tokio::time::timeout(
        Duration::from_secs(5),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("truncated body must terminate");

    if let Ok(bytes) = body {
        assert!(bytes.len() < 1000, "body should be cut short");
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}
