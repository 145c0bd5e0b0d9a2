//! Vidrelay Search - Video search through the mirror pool

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
//!
//! Queries the upstream search endpoint through the resilient fetcher and
//! flattens each result into the minimal shape the client page renders.

pub mod errors;
pub mod normalize;
pub mod service;
pub mod types;

// Re-export main types
pub use errors::SearchError;
pub use normalize::normalize_search_results;
pub use service::SearchService;
pub use types::SearchResult;

/// Convenience type alias for Results with SearchError.
pub type Result<T> = std::result::Result<T, SearchError>;
