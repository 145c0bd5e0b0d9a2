//! Integration tests for Vidrelay
//!
//! Router-level tests drive the full axum application through
//! `tower::ServiceExt::oneshot`. End-to-end tests additionally spawn fake
//! mirrors and media hosts as in-process axum servers on ephemeral ports and
//! talk to them through the real HTTP clients.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/api_routes.rs"]
mod api_routes;
#[path = "integration/failover_http.rs"]
mod failover_http;
#[path = "integration/relay_streaming.rs"]
mod relay_streaming;
#[path = "integration/static_files.rs"]
mod static_files;
