//! Configuration types for the treasury service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Result, TreasuryError, constants};

/// Top-level treasury configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasuryConfig {
    /// Settlement chain and contract.
    pub chain: ChainConfig,
    /// Netting parameters.
    pub clearing: ClearingConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl TreasuryConfig {
    /// Parse a JSON document; absent sections fall back to defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|e| TreasuryError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.clearing.token_decimals > constants::MAX_TOKEN_DECIMALS {
            return Err(TreasuryError::Configuration(format!(
                "token_decimals {} exceeds maximum {}",
                self.clearing.token_decimals,
                constants::MAX_TOKEN_DECIMALS
            )));
        }
        if self.clearing.min_transfer < Decimal::ZERO {
            return Err(TreasuryError::Configuration(
                "min_transfer must not be negative".into(),
            ));
        }
        if self.chain.treasury_contract == Address::ZERO {
            return Err(TreasuryError::Configuration(
                "treasury_contract must be set".into(),
            ));
        }
        Ok(())
    }
}

/// Settlement chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain id stamped on every descriptor.
    pub chain_id: u64,
    /// The treasury token contract every descriptor targets.
    pub treasury_contract: Address,
    /// Account that sends treasury-initiated calls (exchange in).
    pub operator_address: Address,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: constants::DEFAULT_CHAIN_ID,
            treasury_contract: Address([0x77; 20]),
            operator_address: Address([0x01; 20]),
        }
    }
}

/// Netting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearingConfig {
    /// Decimal places a net transfer is truncated to before encoding.
    pub token_decimals: u32,
    /// Net transfers below this amount are carried forward instead of emitted.
    pub min_transfer: Decimal,
}

impl Default for ClearingConfig {
    fn default() -> Self {
        Self {
            token_decimals: constants::DEFAULT_TOKEN_DECIMALS,
            min_transfer: Decimal::ZERO,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: constants::DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}
