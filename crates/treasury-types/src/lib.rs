//! # treasury-types
//!
//! Shared types, errors, and configuration for the **treasury** operation
//! ledger and clearing engine.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TransferId`], [`PassId`], [`Address`]
//! - **Operation model**: [`Operation`], [`OperationType`], [`OperationStatus`], [`Transition`]
//! - **Transaction model**: [`TransactionObject`], [`ChainContext`], [`GasEstimate`]
//! - **Configuration**: [`TreasuryConfig`], [`ChainConfig`], [`ClearingConfig`], [`LoggingConfig`]
//! - **Errors**: [`TreasuryError`] with `TR_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod operation;
pub mod transaction;

// Re-export all primary types at crate root for ergonomic imports:
//   use treasury_types::{Operation, OperationStatus, TransferId, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use operation::*;
pub use transaction::*;

// Constants are accessed via `treasury_types::constants::FOO`
// (not re-exported to avoid name collisions).
