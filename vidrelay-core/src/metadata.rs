//! Video metadata model decoded from upstream mirror responses.
//!
//! Mirrors disagree on field types and frequently omit collections, so every
//! field decodes leniently: absent, `null` or mistyped values become empty
//! defaults and malformed stream entries are dropped. Decoding a metadata
//! document never fails.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Legacy numeric format identifier (`itag`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FormatTag(pub u32);

impl FormatTag {
    /// Coerces a JSON number or numeric string into a format tag.
    ///
    /// Anything else (negative, fractional, non-numeric text) yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                        .map(|f| f as u64)
                })
                .and_then(|n| u32::try_from(n).ok())
                .map(FormatTag),
            Value::String(s) => s.trim().parse::<u32>().ok().map(FormatTag),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of `formatStreams` or `adaptiveFormats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStream {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub url: Option<String>,
    /// MIME type including codecs, e.g. `video/mp4; codecs="avc1.42001E"`
    #[serde(default, rename = "type", deserialize_with = "lenient_opt_string")]
    pub mime_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub container: Option<String>,
    #[serde(default, rename = "itag", deserialize_with = "lenient_format_tag")]
    pub format_tag: Option<FormatTag>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub quality_label: Option<String>,
}

impl MediaStream {
    /// Playback URL, if present and non-empty.
    pub fn playable_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Case-insensitive substring match against the MIME essence or container.
    ///
    /// Codec parameters are ignored: `video/3gpp; codecs="mp4v.20.3"` is not
    /// an mp4 stream.
    pub fn matches_container(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        [self.mime_essence(), self.container.as_deref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_ascii_lowercase().contains(&needle))
    }

    /// MIME type without its parameters, e.g. `video/mp4`.
    pub fn mime_essence(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .and_then(|mime| mime.split(';').next())
            .map(str::trim)
            .filter(|essence| !essence.is_empty())
    }

    /// True when the entry carries the given format tag.
    pub fn has_format_tag(&self, tag: FormatTag) -> bool {
        self.format_tag == Some(tag)
    }
}

/// Decoded video metadata document (`/api/v1/videos/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub video_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Combined (muxed audio+video) streams
    #[serde(default, deserialize_with = "lenient_streams")]
    pub format_streams: Vec<MediaStream>,
    /// Video-only or audio-only streams
    #[serde(default, deserialize_with = "lenient_streams")]
    pub adaptive_formats: Vec<MediaStream>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub dash_url: Option<String>,
}

impl VideoMetadata {
    /// Decodes a raw upstream document. Never fails; a non-object document
    /// decodes to empty metadata.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        Self::deserialize(value).unwrap_or_default()
    }

    /// True when neither collection holds a single entry.
    pub fn has_no_streams(&self) -> bool {
        self.format_streams.is_empty() && self.adaptive_formats.is_empty()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_format_tag<'de, D>(deserializer: D) -> Result<Option<FormatTag>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(FormatTag::from_value(&Value::deserialize(deserializer)?))
}

fn lenient_streams<'de, D>(deserializer: D) -> Result<Vec<MediaStream>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(entries
        .iter()
        .filter(|entry| entry.is_object())
        .filter_map(|entry| MediaStream::deserialize(entry).ok())
        .collect())
}
