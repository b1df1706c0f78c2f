//! Log subscriber setup. The filter sits behind a reload layer so the level
//! from the config file can be applied after the subscriber is installed.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER: OnceLock<FilterHandle> = OnceLock::new();

const RUST_LOG: &str = "RUST_LOG";

fn rust_log_is_set() -> bool {
    std::env::var_os(RUST_LOG).is_some()
}

/// Install the global subscriber at `info`, or at `RUST_LOG` when set.
/// Later calls are no-ops.
pub fn init_tracing() {
    let filter = if rust_log_is_set() {
        EnvFilter::try_from_env(RUST_LOG).unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("info")
    };
    let (layer, handle) = reload::Layer::new(filter);
    if tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
    {
        let _ = FILTER.set(handle);
    }
}

/// Switch to the configured `logging.level`. `RUST_LOG` keeps precedence.
pub fn apply_logging_level(level: &str) {
    if rust_log_is_set() {
        return;
    }
    let Some(handle) = FILTER.get() else {
        return;
    };
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        tracing::warn!(error = %e, level, "could not change log level");
    }
}
