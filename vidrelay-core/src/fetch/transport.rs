//! HTTP transport abstraction used by the fetcher

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::config::UpstreamConfig;

/// Transport-level failures: the mirror never produced a complete response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("reading body from {url} failed: {reason}")]
    Body { url: String, reason: String },
}

/// Fully buffered upstream response.
///
/// Metadata documents are small, so the fetcher reads them whole before
/// validating.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Creates a response with a JSON content type.
    pub fn json(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the declared content type is a JSON media type.
    pub fn declares_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
    }
}

/// Performs a single GET against an upstream URL.
///
/// Implementations must not retry; retry policy belongs to the fetcher.
#[async_trait]
pub trait UpstreamTransport: Send + Sync + std::fmt::Debug {
    /// Fetches `url` and buffers the body.
    ///
    /// # Errors
    /// - `TransportError::Timeout` - The attempt exceeded its timeout
    /// - `TransportError::Connection` - DNS, TCP, TLS or protocol failure
    /// - `TransportError::Body` - The body could not be read completely
    async fn get(&self, url: &str) -> Result<UpstreamResponse, TransportError>;
}

/// reqwest-backed transport used in production.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport honoring the per-attempt timeout and user agent.
    ///
    /// # Errors
    ///
    /// - `reqwest::Error` - TLS backend or client initialization failed
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.attempt_timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify(url: &str, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::Connection {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Self::classify(url, &e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                }
            } else {
                TransportError::Body {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_content_type(content_type: Option<&str>) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            content_type: content_type.map(str::to_string),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_declares_json_accepts_parameters_and_suffixes() {
        assert!(with_content_type(Some("application/json")).declares_json());
        assert!(with_content_type(Some("application/json; charset=utf-8")).declares_json());
        assert!(with_content_type(Some("Application/JSON")).declares_json());
        assert!(with_content_type(Some("application/problem+json")).declares_json());
    }

    #[test]
    fn test_declares_json_rejects_other_types() {
        assert!(!with_content_type(Some("text/html; charset=utf-8")).declares_json());
        assert!(!with_content_type(Some("text/plain")).declares_json());
        assert!(!with_content_type(None).declares_json());
    }

    #[test]
    fn test_success_range() {
        assert!(UpstreamResponse::json(200, "{}").is_success());
        assert!(UpstreamResponse::json(204, "").is_success());
        assert!(!UpstreamResponse::json(302, "").is_success());
        assert!(!UpstreamResponse::json(503, "").is_success());
    }
}
