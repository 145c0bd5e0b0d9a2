//! Upstream JSON fetching with per-mirror retry and cross-mirror failover.
//!
//! The fetcher walks the mirror registry in order, retrying each mirror a
//! bounded number of times before moving on. HTTP access and the backoff
//! sleep are both behind traits so the algorithm runs without network or
//! wall-clock time in tests.

pub mod delay;
pub mod fetcher;
pub mod transport;

use std::time::Duration;

pub use delay::{Delay, NoDelay, TokioDelay};
pub use fetcher::{ResilientFetcher, RetryPolicy};
pub use transport::{HttpTransport, TransportError, UpstreamResponse, UpstreamTransport};

/// Errors surfaced by the resilient fetcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Every mirror was tried the configured number of times.
    #[error(
        "All upstream sources unavailable for {path} ({mirrors_tried} mirrors tried, last failure: {last_failure})"
    )]
    AllSourcesUnavailable {
        path: String,
        mirrors_tried: usize,
        last_failure: String,
    },

    /// The request-scoped deadline elapsed before any mirror answered.
    #[error("Upstream request for {path} exceeded its {deadline:?} deadline")]
    DeadlineExceeded { path: String, deadline: Duration },
}

impl FetchError {
    /// Path that was being fetched when the error occurred.
    pub fn path(&self) -> &str {
        match self {
            FetchError::AllSourcesUnavailable { path, .. }
            | FetchError::DeadlineExceeded { path, .. } => path,
        }
    }
}

/// Why a single attempt against a mirror was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("unexpected content type '{content_type}'")]
    UnexpectedContentType { content_type: String },

    #[error("malformed JSON body: {reason}")]
    MalformedBody { reason: String },
}
