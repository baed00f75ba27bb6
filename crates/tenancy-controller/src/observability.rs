//! Process-wide tracing subscriber whose level follows [`LoggingConfig`].
//!
//! The filter sits behind a reload layer so a re-read configuration can
//! change verbosity without reinstalling the subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// `RUST_LOG` takes precedence over the configured level at startup.
fn startup_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the subscriber. Returns `false` if one was already installed by
/// an earlier call.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let (filter, handle) = reload::Layer::new(startup_filter(config));
    if FILTER_HANDLE.set(handle).is_err() {
        return false;
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
    true
}

/// Swaps in the level from `config`. Returns `false` when no subscriber has
/// been installed through [`init_tracing`].
pub fn apply_logging_config(config: &LoggingConfig) -> bool {
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    match handle.reload(EnvFilter::new(&config.level)) {
        Ok(()) => {
            tracing::debug!(level = %config.level, "log level applied");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "log level could not be applied");
            false
        }
    }
}
