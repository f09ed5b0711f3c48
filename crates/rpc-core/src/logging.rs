//! Structured logging setup (§10.2). Mirrors `dao.common.log.setup`:
//! one-time initialization driven by configuration, using `tracing`
//! instead of `logging.config.fileConfig`.

use crate::config::CommonSettings;

/// Initialize the global `tracing` subscriber. `common.debug` selects
/// the default verbosity; `common.log_config`, if set, is used verbatim
/// as an `EnvFilter` directive string, overriding the debug-derived
/// default.
///
/// Safe to call once per process; a second call is a no-op (the
/// underlying `tracing_subscriber::fmt().try_init()` simply fails
/// quietly rather than panicking).
pub fn setup(settings: &CommonSettings) {
    let default_directive = if settings.debug { "debug" } else { "info" };
    let filter = settings
        .log_config
        .clone()
        .unwrap_or_else(|| default_directive.to_string());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
