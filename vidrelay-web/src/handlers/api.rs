//! JSON API handlers for stream resolution, search and health

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use vidrelay_search::SearchResult;

use crate::handlers::error::ApiError;
use crate::server::AppState;

/// Successful answer of `GET /api/video/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    /// Direct URL of the selected stream
    pub video_url: String,
    /// MIME type of the selected stream, codecs included
    pub mime_type: String,
    /// Video title, empty when upstream omits it
    pub title: String,
}

/// `?id=` parameter of the legacy endpoints.
#[derive(Debug, Deserialize)]
pub struct VideoIdQuery {
    /// Video id; missing or blank is a bad request
    pub id: Option<String>,
}

/// Query parameters of `GET /api/search`.
///
/// `page` stays raw text so a malformed value gets a JSON error instead of
/// the extractor's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Search terms
    pub q: Option<String>,
    /// 1-based result page
    pub page: Option<String>,
}

impl SearchParams {
    /// Parses `page`; absent or blank means the first page.
    ///
    /// # Errors
    ///
    /// - `ApiError::BadRequest` - `page` is not a non-negative integer
    pub fn page_number(&self) -> Result<Option<u32>, ApiError> {
        match self.page.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| ApiError::bad_request("Invalid page number")),
        }
    }
}

/// Successful answer of `GET /api/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Normalized results in upstream order
    pub results: Vec<SearchResult>,
}

/// Answer of `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests
    pub status: &'static str,
    /// Mirror base URLs in preference order
    pub mirrors: Vec<String>,
    /// Server start time, RFC 3339
    pub started_at: String,
}

/// Resolves a video id into its preferred playable stream.
///
/// # Errors
///
/// - `ApiError::BadRequest` - Invalid video id
/// - `ApiError::StreamNotFound` - No stream matched any preference rule
/// - `ApiError::Upstream` - All mirrors failed or the deadline elapsed
pub async fn api_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoResponse>, ApiError> {
    let resolution = state.resolver.resolve(&video_id).await?;
    let (title, stream) = ApiError::require_found(resolution)?;
    Ok(Json(VideoResponse {
        video_url: stream.url,
        mime_type: stream.mime_type,
        title,
    }))
}

/// Legacy `GET /video?id=` returning only the stream URL.
///
/// # Errors
///
/// Same as [`api_video`], plus `ApiError::BadRequest` when `id` is missing.
pub async fn legacy_video(
    State(state): State<AppState>,
    Query(query): Query<VideoIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let video_id = required_id(query.id)?;
    let resolution = state.resolver.resolve(&video_id).await?;
    let (_, stream) = ApiError::require_found(resolution)?;
    Ok(Json(json!({ "url": stream.url })))
}

/// Searches for videos and returns the normalized result list.
///
/// # Errors
///
/// - `ApiError::BadRequest` - Missing or blank `q` or a malformed `page`,
///   no upstream contacted
/// - `ApiError::Upstream` - All mirrors failed or the deadline elapsed
pub async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let page = params.page_number()?;
    let query = params.q.unwrap_or_default();
    let results = state.search.search(&query, page).await?;
    Ok(Json(SearchResponse { results }))
}

/// Liveness check listing the configured mirror order.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mirrors: state
            .fetcher
            .registry()
            .iter()
            .map(|m| m.base_url().to_string())
            .collect(),
        started_at: state.started_at.to_rfc3339(),
    })
}

pub(crate) fn required_id(id: Option<String>) -> Result<String, ApiError> {
    id.filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Video ID is required"))
}
