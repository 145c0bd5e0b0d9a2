//! Centralized configuration for Vidrelay.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::RetryPolicy;
use crate::mirrors::MirrorRegistry;

/// Mirrors used when no override is configured, in preference order.
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://iv.melmac.space",
    "https://inv.nadeko.net",
    "https://invidious.nerdvpn.de",
    "https://yewtu.be",
];

/// Errors raised while building configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Mirror registry must contain at least one mirror")]
    NoMirrors,

    #[error("Invalid mirror URL '{url}': {reason}")]
    InvalidMirrorUrl { url: String, reason: String },
}

/// Central configuration for all Vidrelay components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
}

/// Upstream mirror access configuration.
///
/// Controls which mirrors are contacted and how hard the fetcher tries
/// before giving up on a mirror or on the whole request.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Mirror base URLs in preference order
    pub mirrors: Vec<String>,
    /// Attempts against one mirror before failing over
    pub max_attempts_per_mirror: u32,
    /// Fixed wait between two attempts on the same mirror
    pub retry_backoff: Duration,
    /// Timeout applied to every single HTTP attempt
    pub attempt_timeout: Duration,
    /// Upper bound for the whole mirror chain of one request (None = unbounded)
    pub request_deadline: Option<Duration>,
    /// User agent for upstream HTTP requests
    pub user_agent: &'static str,
    /// Let the media relay reach loopback, private and link-local addresses
    pub relay_allow_private_hosts: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            max_attempts_per_mirror: 3,
            retry_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(10),
            request_deadline: Some(Duration::from_secs(30)),
            user_agent: "vidrelay/0.1.0",
            relay_allow_private_hosts: false,
        }
    }
}

impl UpstreamConfig {
    /// Builds the immutable mirror registry from the configured URLs.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoMirrors` - The mirror list is empty
    /// - `ConfigError::InvalidMirrorUrl` - A mirror is not an absolute http(s) URL
    pub fn registry(&self) -> Result<MirrorRegistry, ConfigError> {
        MirrorRegistry::new(self.mirrors.iter().map(String::as_str))
    }

    /// Retry policy derived from the attempt, backoff and deadline settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts_per_mirror: self.max_attempts_per_mirror.max(1),
            backoff: self.retry_backoff,
            deadline: self.request_deadline,
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Directory with the client page, served for unmatched paths
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Socket address string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RelayConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Upstream configuration overrides
        if let Some(instance) = lookup("INVIDIOUS_INSTANCE") {
            let instance = instance.trim();
            if !instance.is_empty() {
                config.upstream.mirrors = vec![instance.to_string()];
            }
        }

        if let Some(attempts) = lookup("VIDRELAY_MAX_ATTEMPTS") {
            if let Ok(count) = attempts.trim().parse::<u32>() {
                if count > 0 {
                    config.upstream.max_attempts_per_mirror = count;
                }
            }
        }

        if let Some(backoff) = lookup("VIDRELAY_RETRY_BACKOFF_MS") {
            if let Ok(millis) = backoff.trim().parse::<u64>() {
                config.upstream.retry_backoff = Duration::from_millis(millis);
            }
        }

        if let Some(timeout) = lookup("VIDRELAY_ATTEMPT_TIMEOUT_SECS") {
            if let Ok(seconds) = timeout.trim().parse::<u64>() {
                if seconds > 0 {
                    config.upstream.attempt_timeout = Duration::from_secs(seconds);
                }
            }
        }

        if let Some(deadline) = lookup("VIDRELAY_REQUEST_DEADLINE_SECS") {
            if let Ok(seconds) = deadline.trim().parse::<u64>() {
                config.upstream.request_deadline = match seconds {
                    0 => None,
                    n => Some(Duration::from_secs(n)),
                };
            }
        }

        if let Some(allow) = lookup("VIDRELAY_RELAY_ALLOW_PRIVATE_HOSTS") {
            match allow.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.upstream.relay_allow_private_hosts = true,
                "0" | "false" | "no" => config.upstream.relay_allow_private_hosts = false,
                _ => {}
            }
        }

        // Server configuration overrides
        if let Some(port) = lookup("PORT") {
            if let Ok(port) = port.trim().parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Some(host) = lookup("VIDRELAY_HOST") {
            let host = host.trim();
            if !host.is_empty() {
                config.server.host = host.to_string();
            }
        }

        if let Some(dir) = lookup("VIDRELAY_STATIC_DIR") {
            if !dir.trim().is_empty() {
                config.server.static_dir = Some(PathBuf::from(dir.trim()));
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Single attempt per mirror, no backoff and no deadline so tests never
    /// wait on wall-clock time. The relay may reach localhost fake hosts.
    pub fn for_testing(mirrors: Vec<String>) -> Self {
        Self {
            upstream: UpstreamConfig {
                mirrors,
                max_attempts_per_mirror: 1,
                retry_backoff: Duration::ZERO,
                attempt_timeout: Duration::from_secs(5),
                request_deadline: None,
                relay_allow_private_hosts: true,
                ..Default::default()
            },
            server: ServerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_values() {
        let config = RelayConfig::default();

        assert_eq!(config.upstream.mirrors.len(), DEFAULT_MIRRORS.len());
        assert_eq!(config.upstream.mirrors[0], "https://iv.melmac.space");
        assert_eq!(config.upstream.max_attempts_per_mirror, 3);
        assert_eq!(config.upstream.retry_backoff, Duration::from_secs(1));
        assert_eq!(
            config.upstream.request_deadline,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address(), "127.0.0.1:3000");
        assert!(config.server.static_dir.is_none());
        assert!(!config.upstream.relay_allow_private_hosts);
    }

    #[test]
    fn test_instance_override_replaces_default_list() {
        let config = RelayConfig::from_lookup(lookup_from(&[(
            "INVIDIOUS_INSTANCE",
            "https://invidious.example.org",
        )]));

        assert_eq!(
            config.upstream.mirrors,
            vec!["https://invidious.example.org".to_string()]
        );
    }

    #[test]
    fn test_blank_instance_keeps_defaults() {
        let config = RelayConfig::from_lookup(lookup_from(&[("INVIDIOUS_INSTANCE", "   ")]));
        assert_eq!(config.upstream.mirrors.len(), DEFAULT_MIRRORS.len());
    }

    #[test]
    fn test_env_override() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("VIDRELAY_HOST", "0.0.0.0"),
            ("VIDRELAY_MAX_ATTEMPTS", "5"),
            ("VIDRELAY_RETRY_BACKOFF_MS", "250"),
            ("VIDRELAY_ATTEMPT_TIMEOUT_SECS", "4"),
            ("VIDRELAY_REQUEST_DEADLINE_SECS", "0"),
            ("VIDRELAY_STATIC_DIR", "./public"),
        ]));

        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.upstream.max_attempts_per_mirror, 5);
        assert_eq!(config.upstream.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.upstream.attempt_timeout, Duration::from_secs(4));
        assert_eq!(config.upstream.request_deadline, None);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("./public")));
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("VIDRELAY_MAX_ATTEMPTS", "0"),
            ("VIDRELAY_RETRY_BACKOFF_MS", "-1"),
        ]));

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.max_attempts_per_mirror, 3);
        assert_eq!(config.upstream.retry_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_private_relay_hosts_opt_in() {
        let enabled =
            RelayConfig::from_lookup(lookup_from(&[("VIDRELAY_RELAY_ALLOW_PRIVATE_HOSTS", "true")]));
        assert!(enabled.upstream.relay_allow_private_hosts);

        let garbage =
            RelayConfig::from_lookup(lookup_from(&[("VIDRELAY_RELAY_ALLOW_PRIVATE_HOSTS", "maybe")]));
        assert!(!garbage.upstream.relay_allow_private_hosts);

        assert!(RelayConfig::for_testing(vec![]).upstream.relay_allow_private_hosts);
    }

    #[test]
    fn test_retry_policy_never_allows_zero_attempts() {
        let upstream = UpstreamConfig {
            max_attempts_per_mirror: 0,
            ..Default::default()
        };
        assert_eq!(upstream.retry_policy().max_attempts_per_mirror, 1);
    }

    #[test]
    fn test_registry_rejects_empty_mirror_list() {
        let upstream = UpstreamConfig {
            mirrors: Vec::new(),
            ..Default::default()
        };
        assert_eq!(upstream.registry().unwrap_err(), ConfigError::NoMirrors);
    }
}
