//! Unsigned transaction descriptors handed to the external signer.
//!
//! The treasury never signs or broadcasts. It produces a
//! [`TransactionObject`] that an external wallet service signs and submits.

use serde::{Deserialize, Serialize};

use crate::Address;

/// Gas parameters supplied by the chain-context provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub gas_limit: u64,
    /// Gas price in wei.
    pub gas_price: u64,
}

/// Everything about chain state a single descriptor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainContext {
    pub chain_id: u64,
    /// Next nonce for the sending account.
    pub nonce: u64,
    pub gas: GasEstimate,
}

impl ChainContext {
    /// The same context with the nonce advanced by `offset`.
    ///
    /// Used when one sender needs several descriptors in the same batch.
    #[must_use]
    pub fn with_nonce_offset(self, offset: u64) -> Self {
        Self {
            nonce: self.nonce + offset,
            ..self
        }
    }
}

/// An unsigned, chain-ready transaction descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionObject {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    /// Target contract.
    pub to: Address,
    /// Sending account.
    pub from: Address,
    /// `0x`-prefixed hex calldata: selector followed by ABI-encoded arguments.
    pub data: String,
}

impl TransactionObject {
    /// The 4-byte function selector as `0x`-prefixed hex, if present.
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        self.data.get(..10)
    }
}
