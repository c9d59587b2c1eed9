//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use checkout::CheckoutConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `RESERVATION_TTL_SECS`: stock reservation lifetime (default `900`)
/// - `DRAFT_TTL_SECS`: how long a session may sit in Draft (default `1800`)
/// - `SWEEP_INTERVAL_SECS`: expiry sweep period (default `30`)
/// - `TAX_JURISDICTION`: jurisdiction passed to the tax collaborator (default `default`)
/// - `SEED_PATH`: optional JSON file loaded into the in-memory collaborators
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub reservation_ttl_secs: u64,
    pub draft_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub tax_jurisdiction: String,
    pub seed_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parsed("LOG_FORMAT", defaults.log_format),
            reservation_ttl_secs: parsed("RESERVATION_TTL_SECS", defaults.reservation_ttl_secs),
            draft_ttl_secs: parsed("DRAFT_TTL_SECS", defaults.draft_ttl_secs),
            sweep_interval_secs: parsed("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            tax_jurisdiction: std::env::var("TAX_JURISDICTION")
                .unwrap_or(defaults.tax_jurisdiction),
            seed_path: std::env::var_os("SEED_PATH").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The checkout settings this configuration describes.
    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig::default()
            .with_reservation_ttl(seconds(self.reservation_ttl_secs))
            .with_draft_ttl(seconds(self.draft_ttl_secs))
            .with_jurisdiction(self.tax_jurisdiction.clone())
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs.max(1)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            reservation_ttl_secs: 900,
            draft_ttl_secs: 1800,
            sweep_interval_secs: 30,
            tax_jurisdiction: "default".to_string(),
            seed_path: None,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Longest accepted TTL, about a century.
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.tax_jurisdiction, "default");
        assert!(config.seed_path.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_checkout_config_carries_ttls() {
        let config = Config {
            reservation_ttl_secs: 300,
            draft_ttl_secs: 600,
            sweep_interval_secs: 5,
            tax_jurisdiction: "us-ca".to_string(),
            ..Config::default()
        };
        let checkout = config.checkout();
        assert_eq!(checkout.reservation_ttl, chrono::Duration::minutes(5));
        assert_eq!(checkout.draft_ttl, chrono::Duration::minutes(10));
        assert_eq!(checkout.sweep_interval, Duration::from_secs(5));
        assert_eq!(checkout.jurisdiction, "us-ca");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
