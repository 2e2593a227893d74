//! Log output for the blob cache services.
//!
//! The filter sits behind a reload layer so the level can be raised while a
//! service runs, e.g. to `erx_hsm=debug` while chasing cache misses.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::settings::LoggingConfig;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER: OnceLock<FilterHandle> = OnceLock::new();

/// `RUST_LOG` if it is set and parses, otherwise `level`.
fn initial_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs the global subscriber. Returns `false` if one was already set,
/// in which case only the reload handle of the first call is kept.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    let (filter, handle) = reload::Layer::new(initial_filter(&logging.level));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER.set(handle);
        tracing::debug!(level = %logging.level, "logging initialized");
    }
    installed
}

/// Replaces the active filter. Returns `false` before [`init_tracing`] or if
/// `level` does not parse.
pub fn apply_logging_level(level: &str) -> bool {
    let Some(handle) = FILTER.get() else {
        return false;
    };
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            let changed = handle.reload(filter).is_ok();
            if changed {
                tracing::info!(level, "log level changed");
            }
            changed
        }
        Err(e) => {
            tracing::warn!(level, error = %e, "rejected log level");
            false
        }
    }
}
