//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Builds the filter from `RUST_LOG`, falling back to `default_level`.
fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global subscriber. Panics if one is already set.
pub fn init_tracing(default_level: &str) {
    fmt().with_env_filter(filter(default_level)).with_target(false).init();
}

/// Installs the global subscriber unless one is already set.
///
/// Returns `false` when another subscriber was installed first.
pub fn try_init_tracing(default_level: &str) -> bool {
    fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}
