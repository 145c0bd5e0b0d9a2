//! Deterministic choice of one playable stream from a metadata record.
//!
//! Rules are applied in a fixed preference order and the first rule with a
//! match wins. Within a rule, upstream order decides. Entries without a
//! playback URL never match.

use serde::Serialize;

use crate::metadata::{FormatTag, MediaStream, VideoMetadata};

/// Legacy 360p progressive MP4: always muxed audio+video, plays everywhere.
pub const LEGACY_PROGRESSIVE_TAG: FormatTag = FormatTag(18);

const DASH_MANIFEST_MIME: &str = "application/dash+xml";

/// Collection the chosen stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamKind {
    Combined,
    Adaptive,
    Manifest,
}

/// Preference rules, highest priority first in `PREFERENCE_ORDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    LegacyProgressiveTag,
    CombinedMp4,
    CombinedWebm,
    AdaptiveMp4,
    AdaptiveWebm,
    DashCapable,
}

impl SelectionRule {
    pub const PREFERENCE_ORDER: [SelectionRule; 6] = [
        SelectionRule::LegacyProgressiveTag,
        SelectionRule::CombinedMp4,
        SelectionRule::CombinedWebm,
        SelectionRule::AdaptiveMp4,
        SelectionRule::AdaptiveWebm,
        SelectionRule::DashCapable,
    ];

    fn fallback_mime(self) -> &'static str {
        match self {
            SelectionRule::LegacyProgressiveTag
            | SelectionRule::CombinedMp4
            | SelectionRule::AdaptiveMp4 => "video/mp4",
            SelectionRule::CombinedWebm | SelectionRule::AdaptiveWebm => "video/webm",
            SelectionRule::DashCapable => DASH_MANIFEST_MIME,
        }
    }

    fn matches(self, stream: &MediaStream) -> bool {
        match self {
            SelectionRule::LegacyProgressiveTag => stream.has_format_tag(LEGACY_PROGRESSIVE_TAG),
            SelectionRule::CombinedMp4 | SelectionRule::AdaptiveMp4 => {
                stream.matches_container("mp4")
            }
            SelectionRule::CombinedWebm | SelectionRule::AdaptiveWebm => {
                stream.matches_container("webm")
            }
            SelectionRule::DashCapable => stream.matches_container("dash"),
        }
    }

    fn apply(self, metadata: &VideoMetadata) -> Option<ResolvedStream> {
        let (kind, candidates) = match self {
            SelectionRule::LegacyProgressiveTag
            | SelectionRule::CombinedMp4
            | SelectionRule::CombinedWebm => {
                (StreamKind::Combined, metadata.format_streams.as_slice())
            }
            SelectionRule::AdaptiveMp4 | SelectionRule::AdaptiveWebm => {
                (StreamKind::Adaptive, metadata.adaptive_formats.as_slice())
            }
            SelectionRule::DashCapable => return self.dash_capable(metadata),
        };

        candidates
            .iter()
            .filter(|s| s.playable_url().is_some())
            .find(|s| self.matches(s))
            .map(|s| ResolvedStream::from_stream(s, kind, self))
    }

    fn dash_capable(self, metadata: &VideoMetadata) -> Option<ResolvedStream> {
        if let Some(stream) = metadata
            .adaptive_formats
            .iter()
            .filter(|s| s.playable_url().is_some())
            .find(|s| self.matches(s))
        {
            return Some(ResolvedStream::from_stream(stream, StreamKind::Adaptive, self));
        }

        metadata
            .dash_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|url| ResolvedStream {
                url: url.to_string(),
                mime_type: DASH_MANIFEST_MIME.to_string(),
                kind: StreamKind::Manifest,
                rule: self,
                format_tag: None,
                quality_label: None,
            })
    }
}

/// The single stream chosen for playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStream {
    pub url: String,
    pub mime_type: String,
    pub kind: StreamKind,
    pub rule: SelectionRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_tag: Option<FormatTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_label: Option<String>,
}

impl ResolvedStream {
    fn from_stream(stream: &MediaStream, kind: StreamKind, rule: SelectionRule) -> Self {
        let mime_type = stream
            .mime_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| {
                stream
                    .container
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(|c| format!("video/{}", c.to_ascii_lowercase()))
            })
            .unwrap_or_else(|| rule.fallback_mime().to_string());

        Self {
            url: stream.playable_url().unwrap_or_default().to_string(),
            mime_type,
            kind,
            rule,
            format_tag: stream.format_tag,
            quality_label: stream.quality_label.clone(),
        }
    }

    /// MIME type without codec parameters, e.g. `video/mp4`.
    pub fn essence(&self) -> &str {
        self.mime_type.split(';').next().unwrap_or("").trim()
    }
}

/// Picks the best playable stream, or `None` when nothing matches.
pub fn select_stream(metadata: &VideoMetadata) -> Option<ResolvedStream> {
    SelectionRule::PREFERENCE_ORDER
        .iter()
        .find_map(|rule| rule.apply(metadata))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::*;

    fn stream(url: &str, tag: Option<u32>, mime: &str) -> MediaStream {
        MediaStream {
            url: Some(url.to_string()),
            mime_type: Some(mime.to_string()),
            container: None,
            format_tag: tag.map(FormatTag),
            quality_label: None,
        }
    }

    fn metadata(combined: Vec<MediaStream>, adaptive: Vec<MediaStream>) -> VideoMetadata {
        VideoMetadata {
            video_id: "abc".to_string(),
            title: "t".to_string(),
            format_streams: combined,
            adaptive_formats: adaptive,
            dash_url: None,
        }
    }

    #[test]
    fn test_legacy_tag_beats_earlier_mp4() {
        let meta = metadata(
            vec![
                stream("https://m/22", Some(22), "video/mp4"),
                stream("https://m/18", Some(18), "video/mp4"),
            ],
            vec![stream("https://m/137", Some(137), "video/mp4")],
        );

        let chosen = select_stream(&meta).unwrap();

        assert_eq!(chosen.url, "https://m/18");
        assert_eq!(chosen.rule, SelectionRule::LegacyProgressiveTag);
        assert_eq!(chosen.kind, StreamKind::Combined);
        assert_eq!(chosen.format_tag, Some(FormatTag(18)));
    }

    #[test]
    fn test_string_tag_is_coerced_before_comparison() {
        let meta = VideoMetadata::from_value(&json!({
            "formatStreams": [
                {"url": "https://m/43", "itag": "43", "type": "video/webm"},
                {"url": "https://m/18", "itag": "18", "type": "video/mp4"}
            ]
        }));

        assert_eq!(select_stream(&meta).unwrap().url, "https://m/18");
    }

    #[test]
    fn test_combined_mp4_then_webm_order() {
        let meta = metadata(
            vec![
                stream("https://m/43", Some(43), "video/webm"),
                stream("https://m/22", Some(22), "video/mp4"),
            ],
            Vec::new(),
        );
        assert_eq!(select_stream(&meta).unwrap().rule, SelectionRule::CombinedMp4);

        let meta = metadata(vec![stream("https://m/43", Some(43), "video/webm")], Vec::new());
        let chosen = select_stream(&meta).unwrap();
        assert_eq!(chosen.rule, SelectionRule::CombinedWebm);
        assert_eq!(chosen.essence(), "video/webm");
    }

    #[test]
    fn test_mp4_codec_in_3gpp_entry_is_not_an_mp4_container() {
        let meta = metadata(
            vec![
                stream(
                    "https://m/17",
                    Some(17),
                    "video/3gpp; codecs=\"mp4v.20.3, mp4a.40.2\"",
                ),
                stream("https://m/43", Some(43), "video/webm; codecs=\"vp8.0, vorbis\""),
            ],
            Vec::new(),
        );

        let chosen = select_stream(&meta).unwrap();

        assert_eq!(chosen.url, "https://m/43");
        assert_eq!(chosen.rule, SelectionRule::CombinedWebm);
    }

    #[test]
    fn test_combined_always_beats_adaptive() {
        let meta = metadata(
            vec![stream("https://m/43", Some(43), "video/webm")],
            vec![stream("https://m/137", Some(137), "video/mp4")],
        );
        assert_eq!(select_stream(&meta).unwrap().url, "https://m/43");
    }

    #[test]
    fn test_adaptive_mp4_then_webm_order() {
        let meta = metadata(
            Vec::new(),
            vec![
                stream("https://m/251", Some(251), "audio/webm; codecs=\"opus\""),
                stream("https://m/140", Some(140), "audio/mp4; codecs=\"mp4a.40.2\""),
            ],
        );
        let chosen = select_stream(&meta).unwrap();
        assert_eq!(chosen.url, "https://m/140");
        assert_eq!(chosen.kind, StreamKind::Adaptive);
        assert_eq!(chosen.essence(), "audio/mp4");
    }

    #[test]
    fn test_entries_without_url_never_match() {
        let mut tagged = stream("", Some(18), "video/mp4");
        tagged.url = None;
        let meta = metadata(
            vec![tagged, stream("https://m/43", Some(43), "video/webm")],
            Vec::new(),
        );
        assert_eq!(select_stream(&meta).unwrap().url, "https://m/43");
    }

    #[test]
    fn test_container_field_is_used_when_type_missing() {
        let meta = metadata(
            vec![MediaStream {
                url: Some("https://m/x".to_string()),
                container: Some("MP4".to_string()),
                ..Default::default()
            }],
            Vec::new(),
        );
        let chosen = select_stream(&meta).unwrap();
        assert_eq!(chosen.rule, SelectionRule::CombinedMp4);
        assert_eq!(chosen.mime_type, "video/mp4");
    }

    #[test]
    fn test_dash_entry_and_manifest_fallback() {
        let meta = metadata(
            Vec::new(),
            vec![stream("https://m/dash", None, "application/dash+xml")],
        );
        let chosen = select_stream(&meta).unwrap();
        assert_eq!(chosen.rule, SelectionRule::DashCapable);
        assert_eq!(chosen.kind, StreamKind::Adaptive);

        let mut meta = metadata(Vec::new(), Vec::new());
        meta.dash_url = Some("https://iv.example/api/manifest/dash/id/abc".to_string());
        let chosen = select_stream(&meta).unwrap();
        assert_eq!(chosen.kind, StreamKind::Manifest);
        assert_eq!(chosen.mime_type, "application/dash+xml");
    }

    #[test]
    fn test_empty_or_absent_collections_yield_none() {
        assert_eq!(select_stream(&VideoMetadata::default()), None);
        assert_eq!(
            select_stream(&VideoMetadata::from_value(&json!({"formatStreams": []}))),
            None
        );
        let unknown = metadata(vec![stream("https://m/x", Some(5), "video/3gpp")], Vec::new());
        assert_eq!(select_stream(&unknown), None);
    }

    fn non_legacy_stream() -> impl Strategy<Value = Value> {
        (
            19u32..400,
            prop::sample::select(vec!["video/mp4", "video/webm", "audio/mp4", "video/3gpp", ""]),
            any::<bool>(),
            "[a-z]{1,8}",
        )
            .prop_map(|(tag, mime, tag_as_text, path)| {
                let itag = if tag_as_text {
                    json!(tag.to_string())
                } else {
                    json!(tag)
                };
                json!({"url": format!("https://m/{path}"), "itag": itag, "type": mime})
            })
    }

    proptest! {
        #[test]
        fn prop_legacy_tag_always_wins(
            combined in prop::collection::vec(non_legacy_stream(), 0..6),
            adaptive in prop::collection::vec(non_legacy_stream(), 0..6),
            position in 0usize..7,
            tag_as_text in any::<bool>(),
        ) {
            let mut combined = combined;
            let itag = if tag_as_text { json!("18") } else { json!(18) };
            let legacy = json!({"url": "https://m/legacy-18", "itag": itag, "type": "video/mp4"});
            let index = position.min(combined.len());
            combined.insert(index, legacy);

            let meta = VideoMetadata::from_value(&json!({
                "formatStreams": combined,
                "adaptiveFormats": adaptive,
            }));

            let chosen = select_stream(&meta).unwrap();
            prop_assert_eq!(chosen.url, "https://m/legacy-18");
        }

        #[test]
        fn prop_webm_only_adaptive_is_never_not_found(
            mimes in prop::collection::vec(
                prop::sample::select(vec!["video/webm; codecs=\"vp9\"", "audio/webm; codecs=\"opus\""]),
                1..6,
            ),
        ) {
            let adaptive: Vec<Value> = mimes
                .iter()
                .enumerate()
                .map(|(i, mime)| json!({"url": format!("https://m/{i}"), "itag": 240 + i, "type": mime}))
                .collect();

            let meta = VideoMetadata::from_value(&json!({"adaptiveFormats": adaptive}));

            let chosen = select_stream(&meta).unwrap();
            prop_assert_eq!(chosen.kind, StreamKind::Adaptive);
            prop_assert!(chosen.mime_type.contains("webm"));
            prop_assert_eq!(chosen.url, "https://m/0");
        }

        #[test]
        fn prop_garbage_collections_never_panic(
            combined in prop::sample::select(vec![json!(null), json!(1), json!("x"), json!([]), json!([null, 2, "s"])]),
            adaptive in prop::sample::select(vec![json!(null), json!({}), json!([]), json!([[]])]),
        ) {
            let meta = VideoMetadata::from_value(&json!({
                "formatStreams": combined,
                "adaptiveFormats": adaptive,
            }));
            prop_assert_eq!(select_stream(&meta), None);
        }
    }
}
