//! Tracing subscriber setup for native hosts and tests

use tracing_subscriber::EnvFilter;

use crate::error::{ReaderError, Result};

pub const DEFAULT_FILTER: &str = "marginalia=info";

/// Install a global fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ReaderError::Logging(e.to_string()))
}
