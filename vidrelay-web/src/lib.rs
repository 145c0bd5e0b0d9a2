//! Vidrelay Web - JSON API and media proxy server
//!
//! Exposes stream resolution, search and the byte relay over HTTP for the
//! browser client page.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]

pub mod handlers;
pub mod server;

// Re-export main types
pub use handlers::ApiError;
pub use server::{AppState, ServerError, build_router, run_server};
