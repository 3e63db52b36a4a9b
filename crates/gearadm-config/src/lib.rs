//! Shared configuration for the gearadm toolchain.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file (`--config-path` or `GEARADM_CONFIG_PATH`), then
//! `GEARADM_*` environment variables, then command-line flags.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_LOG_FILTER,
    DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_RETRY_DELAY_MS, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration consumed by the `gearadm` binary.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "GEARADM")]
pub struct Config {
    /// Job servers queried by administrative commands, as `host:port`.
    #[ortho_config(default = Vec::new())]
    pub servers: Vec<String>,
    /// Connection attempts made per job server before giving up.
    #[ortho_config(default = DEFAULT_CONNECT_ATTEMPTS)]
    pub connect_attempts: u32,
    /// Upper bound for one connection attempt, in milliseconds.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Upper bound for receiving a complete reply, in milliseconds.
    #[ortho_config(default = DEFAULT_RESPONSE_TIMEOUT_MS)]
    pub response_timeout_ms: u64,
    /// Pause between failed connection attempts, in milliseconds.
    #[ortho_config(default = DEFAULT_RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,
    /// Tracing filter expression applied to diagnostics.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for diagnostics.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Job servers in the order they were configured.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Connection attempts made per job server.
    #[must_use]
    pub const fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Upper bound for one connection attempt.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Upper bound for receiving a complete reply.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Pause between failed connection attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Diagnostics output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_published_defaults() {
        let config = Config::default();
        assert!(config.servers().is_empty());
        assert_eq!(config.connect_attempts(), 3);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.response_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::ZERO);
        assert_eq!(config.log_filter(), default_log_filter());
        assert_eq!(config.log_format(), LogFormat::Compact);
    }
}
