//! # treasury-clearing
//!
//! **Clearing Plane**: collapses every open inter-marketplace obligation
//! into the minimal set of net transfers and materializes them.
//!
//! - [`netting`]: pure multilateral netting (positions, greedy matching,
//!   rounding remainders)
//! - [`digest`]: SHA-256 digest of a pass for audit comparison
//! - [`engine`]: [`ClearingEngine`], which reads the ledger, nets, builds
//!   descriptors and commits one atomic [`LedgerBatch`](treasury_ledger::LedgerBatch)

pub mod digest;
pub mod engine;
pub mod netting;

pub use digest::compute_pass_digest;
pub use engine::{ClearedTransfer, ClearingEngine, ClearingPass};
pub use netting::{NetTransfer, NettingResult, net_positions, settle};
