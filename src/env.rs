/// Environment variable names used by this crate for convenient
/// configuration of the recorder from services.
///
/// These are purely helpers; [`RecorderConfig`](crate::config::RecorderConfig)
/// itself stays decoupled from environment access unless
/// [`RecorderConfig::from_env`](crate::config::RecorderConfig::from_env) is called.

/// Identity written to the `from` field of every record.
pub const LOG_RECORDER_FROM_ENV: &str = "LOG_RECORDER_FROM";

/// Sink target, e.g. `stdout`, `stderr` or `file:///var/log/requests.log`.
pub const LOG_RECORDER_SINK_ENV: &str = "LOG_RECORDER_SINK";

/// `true` to route records through the formatter.
pub const LOG_RECORDER_PRETTY_ENV: &str = "LOG_RECORDER_PRETTY";

/// `true` to hand handler failures back to the caller after logging.
pub const LOG_RECORDER_RERAISE_ENV: &str = "LOG_RECORDER_RERAISE";

/// `false` to skip flushing the sink after every record.
pub const LOG_RECORDER_AUTO_FLUSH_ENV: &str = "LOG_RECORDER_AUTO_FLUSH";

/// Host name fallback for the `from` field.
pub const HOSTNAME_ENV: &str = "HOSTNAME";

/// Read an environment variable or fall back to a provided default.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Host identity for the `from` field: `LOG_RECORDER_FROM`, then
/// `HOSTNAME`, then `localhost`.
pub fn host_identity() -> String {
    std::env::var(LOG_RECORDER_FROM_ENV).unwrap_or_else(|_| env_or(HOSTNAME_ENV, "localhost"))
}

/// Parse a boolean flag value (`1/0`, `true/false`, `yes/no`, `on/off`).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
