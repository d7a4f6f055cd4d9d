//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use fido_broker_core::BrokerConfig;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 128)
    pub body_limit_kb: usize,
    /// HTTP request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Ceremony timeout applied when the options carry none (default: 120)
    pub default_ceremony_timeout_secs: u64,
    /// Upper bound for requested ceremony timeouts (default: 600)
    pub max_ceremony_timeout_secs: u64,
    /// Expiry sweep period in seconds (default: 5)
    pub sweep_interval_secs: u64,
    /// How long finished results stay collectable (default: 30)
    pub result_retention_secs: u64,
    /// Reported platform capability level (default: 34)
    pub platform_level: u32,
    /// Whether the device has a secure unlock configured (default: true)
    pub device_secure: bool,
    /// Push hand-offs to this URL instead of queueing them for polling
    pub ui_callback_url: Option<String>,
    /// Capacity of the in-process hand-off queue (default: 64)
    pub handoff_queue_capacity: usize,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 128,
            timeout_secs: 30,
            default_ceremony_timeout_secs: 120,
            max_ceremony_timeout_secs: 600,
            sweep_interval_secs: 5,
            result_retention_secs: 30,
            platform_level: 34,
            device_secure: true,
            ui_callback_url: None,
            handoff_queue_capacity: 64,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let device_secure = std::env::var("DEVICE_SECURE")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(defaults.device_secure);

        let ui_callback_url = std::env::var("UI_CALLBACK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            host,
            allowed_origins,
            body_limit_kb: env_parse("BODY_LIMIT_KB").unwrap_or(defaults.body_limit_kb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            default_ceremony_timeout_secs: env_parse("DEFAULT_CEREMONY_TIMEOUT_SECS")
                .unwrap_or(defaults.default_ceremony_timeout_secs),
            max_ceremony_timeout_secs: env_parse("MAX_CEREMONY_TIMEOUT_SECS")
                .unwrap_or(defaults.max_ceremony_timeout_secs),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval_secs),
            result_retention_secs: env_parse("RESULT_RETENTION_SECS")
                .unwrap_or(defaults.result_retention_secs),
            platform_level: env_parse("PLATFORM_LEVEL").unwrap_or(defaults.platform_level),
            device_secure,
            ui_callback_url,
            handoff_queue_capacity: env_parse("HANDOFF_QUEUE_CAPACITY")
                .unwrap_or(defaults.handoff_queue_capacity),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn result_retention(&self) -> Duration {
        Duration::from_secs(self.result_retention_secs)
    }

    /// Broker settings derived from this configuration
    pub fn broker_config(&self) -> BrokerConfig {
        let sweep_interval = Duration::from_secs(self.sweep_interval_secs.max(1));
        BrokerConfig {
            default_timeout: Duration::from_secs(self.default_ceremony_timeout_secs.max(1)),
            max_timeout: Duration::from_secs(self.max_ceremony_timeout_secs.max(1)),
            sweep_interval,
            terminal_retention: self.result_retention(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.ui_callback_url.is_none());
        assert!(!config.rate_limit_enabled);
        assert!(config.body_limit_kb * 1024 > fido_broker_core::MAX_OPTIONS_SIZE);
    }

    #[test]
    fn test_broker_config_never_zero() {
        let config = Config {
            default_ceremony_timeout_secs: 0,
            sweep_interval_secs: 0,
            ..Default::default()
        };
        let broker = config.broker_config();
        assert_eq!(broker.default_timeout, Duration::from_secs(1));
        assert_eq!(broker.sweep_interval, Duration::from_secs(1));
    }
}
