use crate::layer::TimelineLayer;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global `tracing` subscriber installed by
/// [`init_tracing_with_config`].
///
/// **Fields**
/// - `timeline_level`: most verbose level copied onto request timelines.
/// - `enable_stderr`: if `true`, a `tracing_subscriber::fmt::Layer` writing
///   to stderr is added next to [`TimelineLayer`], so the recorder's own
///   diagnostics (sink failures and so on) are visible.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub timeline_level: Level,
    pub enable_stderr: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            timeline_level: Level::INFO,
            enable_stderr: true,
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`TimelineLayer`] as the
/// global default subscriber, so `tracing` events emitted by handlers show
/// up in their request's record.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already set.
pub fn init_tracing_with_config(config: TracingConfig) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let layer = TimelineLayer::new(config.timeline_level);

    // The two variants have different subscriber types.
    if config.enable_stderr {
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Initialize tracing with [`TracingConfig::default`].
pub fn init_tracing() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    init_tracing_with_config(TracingConfig::default())
}
