use crate::env::{
    host_identity, parse_flag, LOG_RECORDER_AUTO_FLUSH_ENV, LOG_RECORDER_FROM_ENV, LOG_RECORDER_PRETTY_ENV,
    LOG_RECORDER_RERAISE_ENV, LOG_RECORDER_SINK_ENV,
};
use crate::formatter::FormatterOptions;
use crate::sink::{SinkTarget, SinkTargetError};

/// Configuration of a [`RequestInterceptor`](crate::interceptor::RequestInterceptor).
///
/// **Fields**
/// - `reraise_failures`: if `true`, a handler failure is returned to the
///   caller (panics are resumed) once its record has been written. By
///   default the caller gets the synthesized 500 response instead.
/// - `from`: deployment identity written to every record.
/// - `pretty_print`: route records through the formatter instead of
///   writing one JSON line each.
/// - `formatter_options`: passed untouched to the formatter.
/// - `sink`: where records go.
/// - `auto_flush`: flush the sink after every record.
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub reraise_failures: bool,
    pub from: String,
    pub pretty_print: bool,
    pub formatter_options: FormatterOptions,
    pub sink: SinkTarget,
    pub auto_flush: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            reraise_failures: false,
            from: host_identity(),
            pretty_print: false,
            formatter_options: FormatterOptions::default(),
            sink: SinkTarget::Stdout,
            auto_flush: true,
        }
    }
}

impl RecorderConfig {
    /// Defaults overridden by the `LOG_RECORDER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let flag = |key: &'static str| -> Result<Option<bool>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => parse_flag(&raw)
                    .map(Some)
                    .ok_or(ConfigError::InvalidFlag { key, value: raw }),
            }
        };

        let mut config = Self::default();
        if let Some(from) = lookup(LOG_RECORDER_FROM_ENV) {
            config.from = from;
        }
        if let Some(sink) = lookup(LOG_RECORDER_SINK_ENV) {
            config.sink = sink.parse()?;
        }
        if let Some(pretty) = flag(LOG_RECORDER_PRETTY_ENV)? {
            config.pretty_print = pretty;
        }
        if let Some(reraise) = flag(LOG_RECORDER_RERAISE_ENV)? {
            config.reraise_failures = reraise;
        }
        if let Some(auto_flush) = flag(LOG_RECORDER_AUTO_FLUSH_ENV)? {
            config.auto_flush = auto_flush;
        }
        Ok(config)
    }
}

/// Error type returned when reading configuration from the environment.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid boolean for {key}: {value:?}")]
    InvalidFlag { key: &'static str, value: String },

    #[error("invalid sink target: {0}")]
    Sink(#[from] SinkTargetError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = RecorderConfig::default();
        assert!(!config.reraise_failures);
        assert!(!config.pretty_print);
        assert!(config.auto_flush);
        assert!(matches!(config.sink, SinkTarget::Stdout));
        assert_eq!(config.formatter_options.flag("trace"), Some(true));
        assert!(!config.from.is_empty());
    }

    #[test]
    fn environment_overrides() {
        let config = RecorderConfig::from_lookup(lookup(&[
            ("LOG_RECORDER_FROM", "api-7"),
            ("LOG_RECORDER_SINK", "stderr"),
            ("LOG_RECORDER_PRETTY", "yes"),
            ("LOG_RECORDER_RERAISE", "1"),
            ("LOG_RECORDER_AUTO_FLUSH", "false"),
        ]))
        .unwrap();
        assert_eq!(config.from, "api-7");
        assert!(matches!(config.sink, SinkTarget::Stderr));
        assert!(config.pretty_print);
        assert!(config.reraise_failures);
        assert!(!config.auto_flush);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = RecorderConfig::from_lookup(lookup(&[("LOG_RECORDER_PRETTY", "sometimes")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidFlag {
                key: "LOG_RECORDER_PRETTY",
                value: "sometimes".into()
            }
        );

        let err = RecorderConfig::from_lookup(lookup(&[("LOG_RECORDER_SINK", "")])).unwrap_err();
        assert_eq!(err, ConfigError::Sink(SinkTargetError::Empty));
    }
}
