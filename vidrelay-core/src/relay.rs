//! Streaming media relay.
//!
//! Opens the upstream media URL and hands back a byte stream plus the headers
//! worth forwarding. Nothing is buffered beyond the current chunk, and the
//! upstream connection is closed as soon as the returned stream is dropped.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderName, RANGE,
};
use url::{Host, Url};

use crate::config::UpstreamConfig;

/// Content type used when neither upstream nor the URL says anything useful.
pub const DEFAULT_MEDIA_TYPE: &str = "video/mp4";

/// Errors raised while relaying media bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid media URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Upstream request to {url} failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("Upstream {url} answered with status {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("Stream from {url} interrupted: {reason}")]
    Interrupted { url: String, reason: String },
}

/// An open upstream media response ready to be forwarded.
pub struct RelayStream {
    /// Upstream status, 200 or 206
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub accept_ranges: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, RelayError>>,
}

impl fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStream")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("accept_ranges", &self.accept_ranges)
            .finish_non_exhaustive()
    }
}

/// Bound on waiting for upstream response headers when no config is given.
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(10);

/// Relays media bytes from an upstream host to the caller.
#[derive(Debug, Clone)]
pub struct MediaRelay {
    client: reqwest::Client,
    header_timeout: Duration,
    allow_private_hosts: bool,
}

impl MediaRelay {
    /// Builds a relay with its own HTTP client.
    ///
    /// Connecting, waiting for response headers and every body read are
    /// bounded by the attempt timeout. There is no whole-request timeout so a
    /// long video is never cut off while bytes keep flowing.
    ///
    /// # Errors
    ///
    /// - `reqwest::Error` - TLS backend or client initialization failed
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.attempt_timeout)
            .read_timeout(config.attempt_timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self {
            client,
            header_timeout: config.attempt_timeout,
            allow_private_hosts: config.relay_allow_private_hosts,
        })
    }

    /// Wraps an existing client. Private destinations are refused.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            header_timeout: DEFAULT_HEADER_TIMEOUT,
            allow_private_hosts: false,
        }
    }

    /// Overrides how long `open` waits for upstream response headers.
    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    /// Lets the relay reach loopback and private addresses.
    pub fn with_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Parses `raw` and requires an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// - `RelayError::InvalidUrl` - Empty, unparsable or non-HTTP URL
    pub fn validate_url(raw: &str) -> Result<Url, RelayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RelayError::InvalidUrl {
                url: raw.to_string(),
                reason: "URL is empty".to_string(),
            });
        }

        let url = Url::parse(trimmed).map_err(|e| RelayError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            scheme => Err(RelayError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{scheme}'"),
            }),
        }
    }

    /// Refuses loopback, private, link-local and unspecified destinations
    /// unless the relay was configured to allow them.
    ///
    /// Only literal addresses and `localhost` names are recognised; names are
    /// not resolved here.
    ///
    /// # Errors
    ///
    /// - `RelayError::InvalidUrl` - Destination is not publicly routable
    pub fn check_destination(&self, url: &Url) -> Result<(), RelayError> {
        if self.allow_private_hosts {
            return Ok(());
        }

        let private = match url.host() {
            Some(Host::Ipv4(ip)) => is_private_v4(ip),
            Some(Host::Ipv6(ip)) => ip
                .to_ipv4_mapped()
                .map_or_else(|| is_private_v6(ip), is_private_v4),
            Some(Host::Domain(name)) => {
                let name = name.trim_end_matches('.').to_ascii_lowercase();
                name == "localhost" || name.ends_with(".localhost")
            }
            None => true,
        };

        if private {
            tracing::warn!(url = %url, "Refusing to relay to a private destination");
            return Err(RelayError::InvalidUrl {
                url: url.to_string(),
                reason: "destination host is not publicly routable".to_string(),
            });
        }
        Ok(())
    }

    /// Opens `media_url`, forwarding `range` when present.
    ///
    /// The upstream status is checked before any body byte is read, so a
    /// failing upstream never produces a partial response.
    ///
    /// # Errors
    ///
    /// - `RelayError::InvalidUrl` - URL or destination rejected, no request made
    /// - `RelayError::Upstream` - Connection failure or no headers in time
    /// - `RelayError::UpstreamStatus` - Upstream answered with a non-2xx status
    pub async fn open(
        &self,
        media_url: &str,
        range: Option<&str>,
    ) -> Result<RelayStream, RelayError> {
        let url = Self::validate_url(media_url)?;
        self.check_destination(&url)?;
        let url_string = url.to_string();

        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }

        tracing::debug!(url = %url_string, range, "Opening upstream media");
        let response = tokio::time::timeout(self.header_timeout, request.send())
            .await
            .map_err(|_| {
                tracing::warn!(
                    url = %url_string,
                    timeout = ?self.header_timeout,
                    "Upstream media sent no headers"
                );
                RelayError::Upstream {
                    url: url_string.clone(),
                    reason: format!("no response headers within {:?}", self.header_timeout),
                }
            })?
            .map_err(|e| RelayError::Upstream {
                url: url_string.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url_string, status = status.as_u16(), "Upstream media refused");
            return Err(RelayError::UpstreamStatus {
                url: url_string,
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        let header_text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = resolve_content_type(header_text(CONTENT_TYPE).as_deref(), &url);
        let content_length = header_text(CONTENT_LENGTH).and_then(|v| v.parse().ok());
        let content_range = header_text(CONTENT_RANGE);
        let accept_ranges = header_text(ACCEPT_RANGES);

        let stream_url = url_string.clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    tracing::error!(url = %stream_url, error = %e, "Media stream interrupted");
                    RelayError::Interrupted {
                        url: stream_url.clone(),
                        reason: e.to_string(),
                    }
                })
            })
            .boxed();

        Ok(RelayStream {
            status: status.as_u16(),
            content_type,
            content_length,
            content_range,
            accept_ranges,
            body,
        })
    }
}

/// Picks the content type advertised to the client.
///
/// Order: upstream `video/*` or `audio/*`, the `mime` query parameter carried
/// by media URLs, a guess from the path extension, then `video/mp4`.
pub fn resolve_content_type(upstream: Option<&str>, url: &Url) -> String {
    if let Some(upstream) = upstream.filter(|ct| is_media_type(ct)) {
        return upstream.to_string();
    }

    let query_mime = url
        .query_pairs()
        .find(|(key, value)| key == "mime" && is_media_type(value));
    if let Some((_, mime)) = query_mime {
        return mime.into_owned();
    }

    mime_guess::from_path(url.path())
        .iter()
        .map(|m| m.essence_str().to_string())
        .find(|m| is_media_type(m))
        .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string())
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // carrier-grade NAT, 100.64.0.0/10
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified() || ip.is_unique_local() || ip.is_unicast_link_local()
}

fn is_media_type(content_type: &str) -> bool {
    let lower = content_type.trim().to_ascii_lowercase();
    lower.starts_with("video/") || lower.starts_with("audio/")
}
