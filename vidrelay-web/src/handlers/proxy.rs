//! Media proxy handler

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use vidrelay_core::RelayStream;

use crate::handlers::api::required_id;
use crate::handlers::error::ApiError;
use crate::server::AppState;

/// Query parameters of `GET /proxy-video`.
///
/// `url` relays a media URL directly; `id` resolves a video first.
#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    /// Absolute http(s) media URL; wins over `id` when non-blank
    pub url: Option<String>,
    /// Video id to resolve when no `url` is given
    pub id: Option<String>,
}

/// Streams upstream media bytes to the client.
///
/// The caller's `Range` header is forwarded so players can seek. Upstream
/// failures are reported before the first body byte is written.
///
/// # Errors
///
/// - `ApiError::BadRequest` - Neither a valid `url` nor an `id` was given,
///   or the media host is not publicly routable
/// - `ApiError::StreamNotFound` - `id` resolved to nothing playable
/// - `ApiError::Upstream` - Metadata fetch or media request failed
pub async fn proxy_video(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let media_url = match (query.url.filter(|u| !u.trim().is_empty()), query.id) {
        (Some(url), _) => url,
        (None, id) => {
            let video_id = required_id(id)
                .map_err(|_| ApiError::bad_request("A media url or video id is required"))?;
            let resolution = state.resolver.resolve(&video_id).await?;
            let (_, stream) = ApiError::require_found(resolution)?;
            stream.url
        }
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let stream = state.relay.open(&media_url, range).await?;
    tracing::debug!(
        status = stream.status,
        content_type = %stream.content_type,
        length = stream.content_length,
        "Relaying media"
    );
    Ok(relay_response(stream))
}

fn relay_response(stream: RelayStream) -> Response {
    let status = StatusCode::from_u16(stream.status).unwrap_or(StatusCode::OK);

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&stream.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(length) = stream.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    if let Some(value) = stream
        .content_range
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(header::CONTENT_RANGE, value);
    }
    if let Some(value) = stream
        .accept_ranges
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(header::ACCEPT_RANGES, value);
    }

    (status, headers, Body::from_stream(stream.body)).into_response()
}
