//! Video id to playable stream resolution.
//!
//! Combines the resilient fetcher with the stream selector. When the
//! metadata arrives but nothing in it is playable, the raw format
//! collections are handed back so callers can expose them for debugging
//! upstream schema drift.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::fetch::{FetchError, ResilientFetcher};
use crate::metadata::VideoMetadata;
use crate::selector::{ResolvedStream, select_stream};

static VIDEO_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("video id pattern is a valid regex")
});

/// Errors produced while resolving a video id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid video id: '{video_id}'")]
    InvalidVideoId { video_id: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Outcome of a resolution whose metadata fetch succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found {
        video_id: String,
        title: String,
        stream: ResolvedStream,
    },
    /// Metadata was fetched but no stream matched any preference rule.
    NotFound {
        video_id: String,
        /// Raw `formatStreams` value, `null` when absent
        format_streams: Value,
        /// Raw `adaptiveFormats` value, `null` when absent
        adaptive_formats: Value,
    },
}

/// Resolves video ids into a single playable stream.
#[derive(Debug, Clone)]
pub struct StreamResolver {
    fetcher: Arc<ResilientFetcher>,
}

impl StreamResolver {
    pub fn new(fetcher: Arc<ResilientFetcher>) -> Self {
        Self { fetcher }
    }

    /// Rejects ids that could not possibly name a video.
    ///
    /// Keeps path separators and query characters out of upstream URLs.
    ///
    /// # Errors
    ///
    /// - `ResolveError::InvalidVideoId` - Empty, too long or illegal characters
    pub fn validate_video_id(video_id: &str) -> Result<&str, ResolveError> {
        let trimmed = video_id.trim();
        if VIDEO_ID_PATTERN.is_match(trimmed) {
            Ok(trimmed)
        } else {
            Err(ResolveError::InvalidVideoId {
                video_id: video_id.to_string(),
            })
        }
    }

    /// Upstream metadata path for a validated id.
    pub fn video_path(video_id: &str) -> String {
        format!("/api/v1/videos/{video_id}")
    }

    /// Fetches metadata for `video_id` and selects the best stream.
    ///
    /// # Errors
    ///
    /// - `ResolveError::InvalidVideoId` - Rejected before any network call
    /// - `ResolveError::Fetch` - Every mirror failed or the deadline elapsed
    pub async fn resolve(&self, video_id: &str) -> Result<Resolution, ResolveError> {
        let video_id = Self::validate_video_id(video_id)?;
        let raw = self.fetcher.fetch_json(&Self::video_path(video_id)).await?;
        let metadata = VideoMetadata::from_value(&raw);

        match select_stream(&metadata) {
            Some(stream) => {
                tracing::info!(
                    video_id,
                    rule = ?stream.rule,
                    mime_type = %stream.mime_type,
                    "Resolved playable stream"
                );
                Ok(Resolution::Found {
                    video_id: video_id.to_string(),
                    title: metadata.title,
                    stream,
                })
            }
            None => {
                tracing::warn!(
                    video_id,
                    empty = metadata.has_no_streams(),
                    combined = metadata.format_streams.len(),
                    adaptive = metadata.adaptive_formats.len(),
                    "No playable stream in upstream metadata"
                );
                Ok(Resolution::NotFound {
                    video_id: video_id.to_string(),
                    format_streams: raw.get("formatStreams").cloned().unwrap_or(Value::Null),
                    adaptive_formats: raw.get("adaptiveFormats").cloned().unwrap_or(Value::Null),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fetch::{NoDelay, RetryPolicy};
    use crate::mirrors::MirrorRegistry;
    use crate::testing::ScriptedTransport;

    fn resolver(transport: Arc<ScriptedTransport>) -> StreamResolver {
        let registry = Arc::new(MirrorRegistry::new(["https://iv.example"]).unwrap());
        let fetcher = ResilientFetcher::new(registry, transport, RetryPolicy::default())
            .with_delay(Arc::new(NoDelay));
        StreamResolver::new(Arc::new(fetcher))
    }

    #[test]
    fn test_video_id_validation() {
        assert_eq!(
            StreamResolver::validate_video_id("dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(StreamResolver::validate_video_id(" a-b_c ").unwrap(), "a-b_c");
        for bad in ["", "   ", "../etc/passwd", "abc?x=1", "a/b", &"x".repeat(65)] {
            assert!(
                matches!(
                    StreamResolver::validate_video_id(bad),
                    Err(ResolveError::InvalidVideoId { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_found() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "https://iv.example/api/v1/videos/abc",
            vec![ScriptedTransport::ok_json(json!({
                "videoId": "abc",
                "title": "A video",
                "formatStreams": [{"url": "https://media/18", "itag": "18", "type": "video/mp4"}]
            }))],
        );

        let resolution = resolver(transport).resolve("abc").await.unwrap();

        match resolution {
            Resolution::Found {
                video_id,
                title,
                stream,
            } => {
                assert_eq!(video_id, "abc");
                assert_eq!(title, "A video");
                assert_eq!(stream.url, "https://media/18");
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_not_found_keeps_raw_collections() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "https://iv.example/api/v1/videos/abc",
            vec![ScriptedTransport::ok_json(json!({
                "videoId": "abc",
                "formatStreams": [{"itag": 17, "type": "video/3gpp"}]
            }))],
        );

        let resolution = resolver(transport).resolve("abc").await.unwrap();

        assert_eq!(
            resolution,
            Resolution::NotFound {
                video_id: "abc".to_string(),
                format_streams: json!([{"itag": 17, "type": "video/3gpp"}]),
                adaptive_formats: Value::Null,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_id_makes_no_network_call() {
        let transport = Arc::new(ScriptedTransport::new());

        let error = resolver(transport.clone()).resolve("a/b").await.unwrap_err();

        assert!(matches!(error, ResolveError::InvalidVideoId { .. }));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_propagated() {
        let transport = Arc::new(ScriptedTransport::new());

        let error = resolver(transport).resolve("abc").await.unwrap_err();

        assert!(matches!(
            error,
            ResolveError::Fetch(FetchError::AllSourcesUnavailable { .. })
        ));
    }
}
