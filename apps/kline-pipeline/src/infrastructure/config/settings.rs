//! Pipeline Configuration Settings
//!
//! Configuration types for both binaries, loaded from environment variables.
//! Unset or unparseable optional values fall back to defaults; values that
//! parse but make no sense (zero capacities, zero EMA period) are rejected.

use crate::application::services::IndicatorSettings;

/// Default exchange WebSocket endpoint.
const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/ws/bnbbtc@trade";

/// Default kline stream subscribed to after connecting.
const DEFAULT_FEED_STREAM: &str = "bnbbtc@kline_1m";

/// Deployment stage. Selects the default gRPC host for the indicator service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Local development.
    #[default]
    Development,
    /// Containerised deployment.
    Production,
}

impl Stage {
    /// Parse stage from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Get the stage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Default kline gRPC endpoint for this stage.
    #[must_use]
    pub const fn default_grpc_endpoint(&self) -> &'static str {
        match self {
            Self::Development => "http://localhost:50051",
            Self::Production => "http://host.docker.internal:50051",
        }
    }
}

/// Upstream exchange feed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// WebSocket URL to dial.
    pub url: String,
    /// Stream name sent in the subscribe control message.
    pub stream: String,
    /// Request id sent in the subscribe control message.
    pub subscribe_id: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            stream: DEFAULT_FEED_STREAM.to_string(),
            subscribe_id: 1,
        }
    }
}

/// Internal channel capacities for the ingest process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Capacity of the raw frame channel feeding the broadcast hub.
    pub raw_capacity: usize,
    /// Capacity of the bar channel feeding the gRPC bridge.
    pub bar_capacity: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            raw_capacity: 100,
            bar_capacity: 100,
        }
    }
}

/// Configuration for the `kline-ingest` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Upstream feed.
    pub feed: FeedSettings,
    /// Internal channel capacities.
    pub channels: ChannelSettings,
    /// gRPC server port.
    pub grpc_port: u16,
    /// HTTP port serving the raw WebSocket endpoint and health routes.
    pub http_port: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            feed: FeedSettings::default(),
            channels: ChannelSettings::default(),
            grpc_port: 50051,
            http_port: 8080,
        }
    }
}

impl IngestConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let feed = FeedSettings {
            url: parse_env_string("FEED_URL", &defaults.feed.url),
            stream: parse_env_string("FEED_STREAM", &defaults.feed.stream),
            subscribe_id: parse_env_u64("FEED_SUBSCRIBE_ID", defaults.feed.subscribe_id),
        };

        if feed.url.is_empty() {
            return Err(ConfigError::EmptyValue("FEED_URL".to_string()));
        }
        if feed.stream.is_empty() {
            return Err(ConfigError::EmptyValue("FEED_STREAM".to_string()));
        }

        let channels = ChannelSettings {
            raw_capacity: parse_env_nonzero_usize(
                "RAW_CHANNEL_CAPACITY",
                defaults.channels.raw_capacity,
            )?,
            bar_capacity: parse_env_nonzero_usize(
                "BAR_CHANNEL_CAPACITY",
                defaults.channels.bar_capacity,
            )?,
        };

        Ok(Self {
            feed,
            channels,
            grpc_port: parse_env_u16("INGEST_GRPC_PORT", defaults.grpc_port),
            http_port: parse_env_u16("INGEST_HTTP_PORT", defaults.http_port),
        })
    }
}

/// Configuration for the `indicator-service` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorConfig {
    /// Deployment stage.
    pub stage: Stage,
    /// Kline gRPC endpoint to dial.
    pub grpc_endpoint: String,
    /// HTTP port serving the indicator WebSocket endpoints and health routes.
    pub http_port: u16,
    /// Indicator computation settings.
    pub indicators: IndicatorSettings,
    /// Capacity of the relay channel between publisher and fan-out.
    pub relay_capacity: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        let stage = Stage::default();
        Self {
            stage,
            grpc_endpoint: stage.default_grpc_endpoint().to_string(),
            http_port: 8090,
            indicators: IndicatorSettings::default(),
            relay_capacity: 10,
        }
    }
}

impl IndicatorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let stage = std::env::var("STAGE")
            .map(|s| Stage::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let grpc_endpoint =
            parse_env_string("KLINE_GRPC_ENDPOINT", stage.default_grpc_endpoint());

        let indicators = IndicatorSettings {
            ema_period: parse_env_nonzero_usize(
                "INDICATOR_EMA_PERIOD",
                defaults.indicators.ema_period,
            )?,
            vwap_enabled: parse_env_bool(
                "INDICATOR_VWAP_ENABLED",
                defaults.indicators.vwap_enabled,
            ),
        };

        Ok(Self {
            stage,
            grpc_endpoint,
            http_port: parse_env_u16("INDICATOR_HTTP_PORT", defaults.http_port),
            indicators,
            relay_capacity: parse_env_nonzero_usize(
                "RELAY_CHANNEL_CAPACITY",
                defaults.relay_capacity,
            )?,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has a value outside its valid range.
    #[error("environment variable {key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Load a `.env` file from the current directory or any ancestor directory.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

fn parse_env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env_nonzero_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    parse_nonzero_usize(key, &raw, default)
}

fn parse_nonzero_usize(key: &str, raw: &str, default: usize) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "must be at least 1",
        }),
        Ok(value) => Ok(value),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("production", Stage::Production ; "lowercase production")]
    #[test_case("PRODUCTION", Stage::Production ; "uppercase production")]
    #[test_case("dev", Stage::Development ; "other value")]
    #[test_case("", Stage::Development ; "empty")]
    fn stage_parsing(input: &str, expected: Stage) {
        assert_eq!(Stage::from_str_case_insensitive(input), expected);
    }

    #[test]
    fn stage_selects_grpc_host() {
        assert!(
            Stage::Development
                .default_grpc_endpoint()
                .contains("localhost")
        );
        assert!(
            Stage::Production
                .default_grpc_endpoint()
                .contains("host.docker.internal")
        );
    }

    #[test_case("true", Some(true))]
    #[test_case("ON", Some(true))]
    #[test_case("0", Some(false))]
    #[test_case("no", Some(false))]
    #[test_case("maybe", None)]
    fn bool_parsing(input: &str, expected: Option<bool>) {
        assert_eq!(parse_bool(input), expected);
    }

    #[test]
    fn nonzero_usize_rejects_zero() {
        let err = parse_nonzero_usize("RELAY_CHANNEL_CAPACITY", "0", 10).unwrap_err();
        assert!(err.to_string().contains("RELAY_CHANNEL_CAPACITY"));
    }

    #[test]
    fn nonzero_usize_falls_back_on_garbage() {
        assert_eq!(parse_nonzero_usize("X", "abc", 10).unwrap(), 10);
        assert_eq!(parse_nonzero_usize("X", " 42 ", 10).unwrap(), 42);
    }

    #[test]
    fn ingest_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.grpc_port, 50051);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.feed.stream, "bnbbtc@kline_1m");
        assert!(config.feed.url.starts_with("wss://stream.binance.com"));
        assert_eq!(config.channels.raw_capacity, 100);
    }

    #[test]
    fn indicator_defaults() {
        let config = IndicatorConfig::default();
        assert_eq!(config.http_port, 8090);
        assert_eq!(config.relay_capacity, 10);
        assert_eq!(config.indicators.ema_period, 9);
        assert!(!config.indicators.vwap_enabled);
        assert_eq!(config.grpc_endpoint, "http://localhost:50051");
    }
}
