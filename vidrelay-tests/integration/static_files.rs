//! Static client page served as the router fallback.

use std::fs;

use vidrelay_web::build_router;

use crate::common::{get, http_state};

#[tokio::test]
async fn test_static_dir_serves_unmatched_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>player</h1>").unwrap();
    fs::write(dir.path().join("app.js"), "console.log('ready');").unwrap();
    let state = http_state(&["https://unused.example"]);
    let router = build_router(state, Some(dir.path()));

    let index = get(router.clone(), "/").await;
    assert_eq!(index.status, 200);
    assert_eq!(index.body, b"<h1>player</h1>");

    let script = get(router.clone(), "/app.js").await;
    assert_eq!(script.status, 200);
    assert!(script.header("content-type").unwrap().contains("javascript"));

    let api = get(router.clone(), "/health").await;
    assert_eq!(api.json()["status"], "ok");

    let missing = get(router, "/nope.css").await;
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn test_without_static_dir_unknown_paths_are_404() {
    let router = build_router(http_state(&["https://unused.example"]), None);

    let response = get(router, "/index.html").await;

    assert_eq!(response.status, 404);
}
