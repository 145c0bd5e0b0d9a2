//! Vidrelay Core - Mirror failover and stream resolution
//!
//! This crate provides the decision logic behind the relay: an ordered
//! registry of upstream mirrors, a fetcher that retries and fails over
//! between them, the metadata model and stream selector, and the byte relay
//! used to proxy media to clients.

pub mod config;
pub mod fetch;
pub mod metadata;
pub mod mirrors;
pub mod relay;
pub mod resolver;
pub mod selector;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ConfigError, RelayConfig, ServerConfig, UpstreamConfig};
pub use fetch::{
    Delay, FetchError, HttpTransport, NoDelay, ResilientFetcher, RetryPolicy, TokioDelay,
    TransportError, UpstreamResponse, UpstreamTransport,
};
pub use metadata::{FormatTag, MediaStream, VideoMetadata};
pub use mirrors::{Mirror, MirrorRegistry};
pub use relay::{MediaRelay, RelayError, RelayStream};
pub use resolver::{Resolution, ResolveError, StreamResolver};
pub use selector::{ResolvedStream, SelectionRule, StreamKind, select_stream};

/// Errors that can bubble up from any core subsystem.
///
/// High-level error type used by callers that drive several components at
/// once, such as the command-line interface.
#[derive(Debug, thiserror::Error)]
pub enum RelayServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

impl RelayServiceError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            RelayServiceError::Config(e) => format!("Invalid configuration: {e}"),
            RelayServiceError::Fetch(FetchError::AllSourcesUnavailable { .. })
            | RelayServiceError::Resolve(ResolveError::Fetch(
                FetchError::AllSourcesUnavailable { .. },
            )) => "All upstream sources are unavailable".to_string(),
            RelayServiceError::Fetch(FetchError::DeadlineExceeded { .. })
            | RelayServiceError::Resolve(ResolveError::Fetch(FetchError::DeadlineExceeded {
                ..
            })) => "Upstream sources did not answer in time".to_string(),
            RelayServiceError::Resolve(ResolveError::InvalidVideoId { video_id }) => {
                format!("'{video_id}' is not a valid video id")
            }
            RelayServiceError::Relay(_) => "Failed to relay media".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RelayServiceError::Config(_)
                | RelayServiceError::Resolve(ResolveError::InvalidVideoId { .. })
                | RelayServiceError::Relay(RelayError::InvalidUrl { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayServiceError>;
