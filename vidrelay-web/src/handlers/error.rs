//! Mapping of domain failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};
use vidrelay_core::{RelayError, Resolution, ResolveError, ResolvedStream};
use vidrelay_search::SearchError;

/// Error returned by every JSON and proxy handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed request parameter; no upstream was contacted.
    #[error("{message}")]
    BadRequest {
        /// Client-facing reason
        message: String,
    },

    /// Metadata was fetched but contained nothing playable.
    #[error("No playable stream found for video {video_id}")]
    StreamNotFound {
        /// The id that was resolved
        video_id: String,
        /// Raw upstream `formatStreams`, `null` when absent
        format_streams: Value,
        /// Raw upstream `adaptiveFormats`, `null` when absent
        adaptive_formats: Value,
    },

    /// Upstream mirrors or the media host failed.
    #[error("{message}: {details}")]
    Upstream {
        /// Short description of the failed operation
        message: String,
        /// Underlying failure text
        details: String,
    },
}

impl ApiError {
    /// Shorthand for a 400 response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    /// Unpacks a successful resolution into its title and stream.
    ///
    /// # Errors
    ///
    /// - `ApiError::StreamNotFound` - The resolution found nothing playable
    pub fn require_found(resolution: Resolution) -> Result<(String, ResolvedStream), Self> {
        match resolution {
            Resolution::Found { title, stream, .. } => Ok((title, stream)),
            Resolution::NotFound {
                video_id,
                format_streams,
                adaptive_formats,
            } => Err(ApiError::StreamNotFound {
                video_id,
                format_streams,
                adaptive_formats,
            }),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::StreamNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::InvalidVideoId { .. } => ApiError::bad_request("Invalid video ID"),
            ResolveError::Fetch(e) => ApiError::Upstream {
                message: "Failed to fetch video".to_string(),
                details: e.to_string(),
            },
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::EmptyQuery => ApiError::bad_request("Search query is required"),
            SearchError::Fetch(e) => ApiError::Upstream {
                message: "Failed to search videos".to_string(),
                details: e.to_string(),
            },
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::InvalidUrl { reason, .. } => {
                ApiError::bad_request(format!("Invalid media URL: {reason}"))
            }
            other => ApiError::Upstream {
                message: "Failed to proxy video".to_string(),
                details: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!(error = %self, "Request failed"),
            _ => tracing::debug!(error = %self, status = status.as_u16(), "Request rejected"),
        }

        let body = match self {
            ApiError::BadRequest { message } => json!({ "error": message }),
            ApiError::StreamNotFound {
                format_streams,
                adaptive_formats,
                ..
            } => json!({
                "error": "No playable stream found",
                "formatStreams": format_streams,
                "adaptiveFormats": adaptive_formats,
            }),
            ApiError::Upstream { message, details } => json!({
                "error": message,
                "details": details,
            }),
        };

        (status, Json(body)).into_response()
    }
}
