//! Log subscriber installation.

use tracing_subscriber::EnvFilter;
use treasury_types::constants::{SERVICE_NAME, VERSION};
use treasury_types::{LoggingConfig, Result, TreasuryError};

/// Build the filter: `RUST_LOG` when set, the configured directive otherwise.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| TreasuryError::Configuration(format!("log filter: {e}")))
}

/// Install the global `fmt` subscriber, plain or JSON.
///
/// # Errors
/// [`TreasuryError::Configuration`] for an unparsable filter or when a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TreasuryError::Configuration(format!("tracing init: {e}")))?;

    tracing::info!(service = SERVICE_NAME, version = VERSION, json = config.json, "tracing initialized");
    Ok(())
}
