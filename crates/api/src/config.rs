//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` (default: `"0.0.0.0"`)
/// - `PORT` (default: `3000`)
/// - `RUST_LOG` (default: `"info"`)
/// - `RESERVATION_TTL_SECS` (default: `600`)
/// - `SWEEP_INTERVAL_SECS` (default: `30`)
/// - `CALL_TIMEOUT_MS` (default: `5000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// How long an inventory hold stays live before the sweep reclaims it.
    pub reservation_ttl: Duration,
    /// Interval between sweep passes.
    pub sweep_interval: Duration,
    /// Upper bound on any single downstream call in the orchestrator.
    pub call_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            reservation_ttl: env_secs("RESERVATION_TTL_SECS", 600),
            sweep_interval: env_secs("SWEEP_INTERVAL_SECS", 30),
            call_timeout: Duration::from_millis(
                std::env::var("CALL_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            reservation_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
            call_timeout: Duration::from_secs(5),
        }
    }
}
