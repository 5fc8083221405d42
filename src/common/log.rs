//! Logging setup emitting JSON lines (or human readable output) through `tracing`.

use tracing_subscriber::{fmt, EnvFilter};

use super::config::{AppCfg, LogFormat};

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(cfg: &AppCfg) {
    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match cfg.log_format {
        LogFormat::Json => fmt()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
