//! Tracing setup for binaries and tests embedding the feeder

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Calling it more than once is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
