//! Ordered registry of upstream metadata mirrors

use std::fmt;

use url::Url;

use crate::config::ConfigError;

/// A single upstream mirror, identified by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    base_url: String,
}

impl Mirror {
    /// Parses and normalizes a mirror base URL.
    ///
    /// Trailing slashes are stripped so joining with an absolute path never
    /// produces a doubled separator.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidMirrorUrl` - Not an absolute http(s) URL
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidMirrorUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidMirrorUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a path relative to this mirror.
    pub fn url_for(&self, relative_path: &str) -> String {
        if relative_path.starts_with('/') {
            format!("{}{}", self.base_url, relative_path)
        } else {
            format!("{}/{}", self.base_url, relative_path)
        }
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)
    }
}

/// Immutable, non-empty, preference-ordered list of mirrors.
///
/// Built once at startup and shared by reference; nothing mutates it while
/// requests are in flight.
#[derive(Debug, Clone)]
pub struct MirrorRegistry {
    mirrors: Vec<Mirror>,
}

impl MirrorRegistry {
    /// Creates a registry preserving the given order.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoMirrors` - No URL was given
    /// - `ConfigError::InvalidMirrorUrl` - One of the URLs is invalid
    pub fn new<'a, I>(urls: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mirrors = urls
            .into_iter()
            .map(Mirror::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if mirrors.is_empty() {
            return Err(ConfigError::NoMirrors);
        }

        Ok(Self { mirrors })
    }

    /// Iterates mirrors in preference order.
    pub fn iter(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.iter()
    }

    /// Number of configured mirrors. Never zero.
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Most preferred mirror.
    pub fn primary(&self) -> &Mirror {
        &self.mirrors[0]
    }
}

impl<'a> IntoIterator for &'a MirrorRegistry {
    type Item = &'a Mirror;
    type IntoIter = std::slice::Iter<'a, Mirror>;

    fn into_iter(self) -> Self::IntoIter {
        self.mirrors.iter()
    }
}
