//! Search service backed by the mirror pool.

use std::sync::Arc;

use vidrelay_core::ResilientFetcher;

use crate::errors::SearchError;
use crate::normalize::normalize_search_results;
use crate::types::SearchResult;

/// Runs video searches against the upstream mirrors.
#[derive(Debug, Clone)]
pub struct SearchService {
    fetcher: Arc<ResilientFetcher>,
}

impl SearchService {
    /// Creates a search service sharing the given fetcher.
    pub fn new(fetcher: Arc<ResilientFetcher>) -> Self {
        Self { fetcher }
    }

    /// Upstream search path for an already validated query.
    pub fn search_path(query: &str, page: Option<u32>) -> String {
        let mut path = format!(
            "/api/v1/search?q={}&type=video",
            urlencoding::encode(query)
        );
        if let Some(page) = page {
            path.push_str(&format!("&page={page}"));
        }
        path
    }

    /// Searches for videos matching `query`.
    ///
    /// # Errors
    ///
    /// - `SearchError::EmptyQuery` - Query is empty or whitespace, no request made
    /// - `SearchError::Fetch` - Every mirror failed or the deadline elapsed
    pub async fn search(
        &self,
        query: &str,
        page: Option<u32>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let raw = self
            .fetcher
            .fetch_json(&Self::search_path(query, page))
            .await?;

        if !raw.is_array() {
            tracing::warn!(query, "Upstream search response is not a list");
        }

        let results = normalize_search_results(&raw);
        tracing::debug!(query, count = results.len(), "Search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vidrelay_core::testing::ScriptedTransport;
    use vidrelay_core::{FetchError, MirrorRegistry, NoDelay, RetryPolicy};

    use super::*;

    fn service(transport: Arc<ScriptedTransport>) -> SearchService {
        let registry = Arc::new(MirrorRegistry::new(["https://iv.example"]).unwrap());
        let fetcher = ResilientFetcher::new(registry, transport, RetryPolicy::default())
            .with_delay(Arc::new(NoDelay));
        SearchService::new(Arc::new(fetcher))
    }

    #[test]
    fn test_search_path_encoding() {
        assert_eq!(
            SearchService::search_path("rust & tokio", None),
            "/api/v1/search?q=rust%20%26%20tokio&type=video"
        );
        assert_eq!(
            SearchService::search_path("cats", Some(2)),
            "/api/v1/search?q=cats&type=video&page=2"
        );
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_network_call() {
        let transport = Arc::new(ScriptedTransport::new());
        let service = service(transport.clone());

        assert_eq!(service.search("", None).await, Err(SearchError::EmptyQuery));
        assert_eq!(service.search("  \t", None).await, Err(SearchError::EmptyQuery));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_normalizes_results() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "https://iv.example/api/v1/search?q=cats&type=video",
            vec![ScriptedTransport::ok_json(json!([
                {"type": "video", "videoId": "c1", "title": "Cat one",
                 "videoThumbnails": [{"url": "https://img/c1.jpg"}]},
                {"type": "video", "videoId": "c2", "title": "Cat two"}
            ]))],
        );

        let results = service(transport).search(" cats ", None).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].thumbnail, "https://img/c1.jpg");
        assert_eq!(results[1].video_id, "c2");
    }

    #[tokio::test]
    async fn test_non_array_response_is_empty() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "https://iv.example/api/v1/search?q=cats&type=video",
            vec![ScriptedTransport::ok_json(json!({"error": "busy"}))],
        );

        let results = service(transport).search("cats", None).await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let transport = Arc::new(ScriptedTransport::new());

        let error = service(transport).search("cats", None).await.unwrap_err();

        assert!(matches!(
            error,
            SearchError::Fetch(FetchError::AllSourcesUnavailable { .. })
        ));
    }
}
