//! # treasury-chain
//!
//! **Chain Plane**: turns an intended ledger operation into an unsigned,
//! chain-ready [`TransactionObject`](treasury_types::TransactionObject).
//!
//! - [`contract`]: the `ITreasury` call interface declared with `sol!`, plus
//!   ledger-to-EVM value conversions
//! - [`context`]: the injected [`ChainContextProvider`] capability plus a
//!   static in-process provider
//! - [`builder`]: [`TransactionBuilder`], a pure function of
//!   (intent, chain context) → descriptor
//!
//! Nothing here signs, broadcasts or remembers nonces between calls.

pub mod builder;
pub mod context;
pub mod contract;

pub use builder::{TransactionBuilder, TxIntent};
pub use context::{ChainContextProvider, StaticChainContext};
