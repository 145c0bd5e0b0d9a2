//! Flattening of raw upstream search results.

use serde_json::Value;

use crate::types::SearchResult;

/// Converts an upstream search response into client-facing results.
///
/// Order is preserved. Entries with missing or mistyped fields degrade to
/// empty strings instead of failing the batch; a non-array input yields an
/// empty list.
pub fn normalize_search_results(raw: &Value) -> Vec<SearchResult> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    items.iter().map(normalize_item).collect()
}

fn normalize_item(item: &Value) -> SearchResult {
    SearchResult {
        video_id: string_field(item, "videoId"),
        title: string_field(item, "title"),
        thumbnail: first_thumbnail(item),
    }
}

fn string_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn first_thumbnail(item: &Value) -> String {
    let first = item
        .get("videoThumbnails")
        .and_then(Value::as_array)
        .and_then(|thumbs| thumbs.first());

    match first {
        Some(Value::String(url)) => url.clone(),
        Some(thumb) => string_field(thumb, "url"),
        None => String::new(),
    }
}
