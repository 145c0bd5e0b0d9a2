//! Error types for video search.

use thiserror::Error;
use vidrelay_core::FetchError;

/// Errors that can occur during a search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Query was missing or contained only whitespace.
    #[error("Search query must not be empty")]
    EmptyQuery,

    /// No mirror produced a usable search response.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
