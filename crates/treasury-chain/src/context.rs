//! Chain-context sourcing.
//!
//! The builder never talks to a node. Nonces and gas come from an injected
//! [`ChainContextProvider`]; a JSON-RPC client, a wallet service or the
//! in-process [`StaticChainContext`] can sit behind it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use treasury_types::constants::{DEFAULT_CHAIN_ID, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use treasury_types::{Address, ChainContext, GasEstimate, Result, TreasuryError};

/// Source of chain state for transaction descriptors.
#[async_trait]
pub trait ChainContextProvider: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Next unused nonce for `address`.
    async fn current_nonce(&self, address: &Address) -> Result<u64>;

    async fn gas_estimate(&self) -> Result<GasEstimate>;

    /// Fetch everything one descriptor from `address` needs.
    async fn context_for(&self, address: &Address) -> Result<ChainContext> {
        let nonce = self.current_nonce(address).await?;
        let gas = self.gas_estimate().await?;
        Ok(ChainContext {
            chain_id: self.chain_id(),
            nonce,
            gas,
        })
    }
}

/// In-process provider with fixed gas and a settable nonce table.
///
/// Nonces are only read here, never advanced: the external signer owns
/// nonce consumption.
pub struct StaticChainContext {
    chain_id: u64,
    gas: GasEstimate,
    nonces: Mutex<HashMap<Address, u64>>,
    unavailable: AtomicBool,
}

impl StaticChainContext {
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas: GasEstimate {
                gas_limit: DEFAULT_GAS_LIMIT,
                gas_price: DEFAULT_GAS_PRICE,
            },
            nonces: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_gas(mut self, gas: GasEstimate) -> Self {
        self.gas = gas;
        self
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.lock().insert(address, nonce);
    }

    /// Simulate a node outage: every call fails with
    /// [`TreasuryError::ChainContext`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TreasuryError::ChainContext("provider unavailable".into()));
        }
        Ok(())
    }
}

impl Default for StaticChainContext {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID)
    }
}

#[async_trait]
impl ChainContextProvider for StaticChainContext {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn current_nonce(&self, address: &Address) -> Result<u64> {
        self.check_available()?;
        Ok(self.nonces.lock().get(address).copied().unwrap_or(0))
    }

    async fn gas_estimate(&self) -> Result<GasEstimate> {
        self.check_available()?;
        Ok(self.gas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_address_starts_at_zero() {
        let provider = StaticChainContext::default();
        let ctx = provider.context_for(&Address([9; 20])).await.unwrap();
        assert_eq!(ctx.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(ctx.nonce, 0);
        assert_eq!(ctx.gas.gas_limit, DEFAULT_GAS_LIMIT);
    }

    #[tokio::test]
    async fn nonce_table_is_per_address() {
        let provider = StaticChainContext::new(5);
        let a = Address([1; 20]);
        provider.set_nonce(a, 41);
        assert_eq!(provider.current_nonce(&a).await.unwrap(), 41);
        assert_eq!(provider.current_nonce(&Address([2; 20])).await.unwrap(), 0);
        // Reading does not consume.
        assert_eq!(provider.current_nonce(&a).await.unwrap(), 41);
    }

    #[tokio::test]
    async fn outage_fails_with_chain_context_error() {
        let provider = StaticChainContext::default();
        provider.set_unavailable(true);
        let err = provider.context_for(&Address::ZERO).await.unwrap_err();
        assert!(matches!(err, TreasuryError::ChainContext(_)));
        assert!(err.is_retryable());

        provider.set_unavailable(false);
        assert!(provider.context_for(&Address::ZERO).await.is_ok());
    }
}
