//! HTTP request handlers organized by functionality

pub mod api;
pub mod error;
pub mod proxy;

// Re-export handler functions
pub use api::{
    HealthResponse, SearchParams, SearchResponse, VideoIdQuery, VideoResponse, api_search,
    api_video, health, legacy_video,
};
pub use error::ApiError;
pub use proxy::{ProxyQuery, proxy_video};
