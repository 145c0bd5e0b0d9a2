//! Data types for search results.

use serde::{Deserialize, Serialize};

/// One search hit in the shape served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Upstream video id, copied verbatim
    pub video_id: String,
    /// Display title, copied verbatim
    pub title: String,
    /// URL of the first advertised thumbnail, empty when none
    pub thumbnail: String,
}
