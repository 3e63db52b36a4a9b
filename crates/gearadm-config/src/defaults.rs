use crate::logging::LogFormat;

/// Number of connection attempts made per job server.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Upper bound for a single connection attempt, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Upper bound for receiving a complete administrative reply, in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

/// Pause between failed connection attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 0;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
