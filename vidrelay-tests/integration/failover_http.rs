//! Mirror failover over real HTTP against fake in-process mirrors.

use serde_json::json;
use vidrelay_web::build_router;

use crate::common::{FakeMirror, MirrorBehavior, closed_port_url, get, http_state};

fn playable_video() -> MirrorBehavior {
    MirrorBehavior::Json(json!({
        "videoId": "abc",
        "title": "Served by the third mirror",
        "formatStreams": [
            {"itag": "22", "url": "https://media/22", "type": "video/mp4", "container": "mp4"},
            {"itag": "18", "url": "https://media/18", "type": "video/mp4", "container": "mp4"}
        ]
    }))
}

#[tokio::test]
async fn test_failover_stops_at_first_valid_mirror() {
    let unavailable = FakeMirror::spawn(MirrorBehavior::Status(503)).await;
    let captcha = FakeMirror::spawn(MirrorBehavior::Html).await;
    let healthy = FakeMirror::spawn(playable_video()).await;
    let untouched = FakeMirror::spawn(playable_video()).await;
    let state = http_state(&[
        &unavailable.base_url,
        &captcha.base_url,
        &healthy.base_url,
        &untouched.base_url,
    ]);

    let response = get(build_router(state, None), "/api/video/abc").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.json()["videoUrl"], "https://media/18");
    assert_eq!(unavailable.hits(), 1);
    assert_eq!(captcha.hits(), 1);
    assert_eq!(healthy.hits(), 1);
    assert_eq!(untouched.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_mirror_is_skipped() {
    let dead = closed_port_url().await;
    let healthy = FakeMirror::spawn(playable_video()).await;
    let state = http_state(&[&dead, &healthy.base_url]);

    let response = get(build_router(state, None), "/video?id=abc").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.json(), json!({"url": "https://media/18"}));
}

#[tokio::test]
async fn test_every_mirror_failing_yields_single_error() {
    let first = FakeMirror::spawn(MirrorBehavior::Status(500)).await;
    let second = FakeMirror::spawn(MirrorBehavior::Html).await;
    let state = http_state(&[&first.base_url, &second.base_url]);

    let response = get(build_router(state, None), "/api/search?q=cats").await;

    assert_eq!(response.status, 500);
    let body = response.json();
    assert_eq!(body["error"], "Failed to search videos");
    assert!(
        body["details"]
            .as_str()
            .unwrap()
            .contains("All upstream sources unavailable")
    );
    assert_eq!(first.hits(), 1);
    assert_eq!(second.hits(), 1);
}

#[tokio::test]
async fn test_malformed_json_triggers_failover() {
    let broken = FakeMirror::spawn(MirrorBehavior::TruncatedJson).await;
    let healthy = FakeMirror::spawn(MirrorBehavior::Json(json!([
        {"videoId": "x1", "title": "Found"}
    ])))
    .await;
    let state = http_state(&[&broken.base_url, &healthy.base_url]);

    let response = get(build_router(state, None), "/api/search?q=x").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.json()["results"][0]["videoId"], "x1");
    assert_eq!(broken.hits(), 1);
}
