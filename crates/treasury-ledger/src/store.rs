//! The Operation Store contract.
//!
//! Any persistence backend (SQL, document store, in-memory) can back the
//! ledger as long as it honours these rules:
//!
//! - `put` is read-after-write consistent and rejects duplicate ids with
//!   [`TreasuryError::DuplicateId`] instead of overwriting
//! - `transition` is a compare-and-swap on the status column
//! - `apply` commits a whole [`LedgerBatch`] or nothing
//! - `scan` returns operations ordered by `(date, transfer_id)` ascending

use async_trait::async_trait;
use treasury_types::{
    Operation, OperationStatus, PassId, Result, TransferId, Transition, TreasuryError,
};

use crate::query::{Selection, Window};

/// Durable keyed storage of operations. No business logic beyond the
/// uniqueness and compare-and-swap guarantees.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert a new operation.
    ///
    /// # Errors
    /// [`TreasuryError::DuplicateId`] if the transfer id is already stored.
    async fn put(&self, operation: Operation) -> Result<()>;

    /// Fetch a single operation.
    ///
    /// # Errors
    /// [`TreasuryError::NotFound`] if no operation has this id.
    async fn get(&self, id: TransferId) -> Result<Operation>;

    /// Ordered scan of the operations matching `selection`, restricted to `window`.
    async fn scan(&self, selection: &Selection, window: Window) -> Result<Vec<Operation>>;

    /// Apply `transition` only if the stored status still equals `expected`.
    ///
    /// Returns the updated operation.
    ///
    /// # Errors
    /// - [`TreasuryError::NotFound`] if no operation has this id
    /// - [`TreasuryError::AlreadyClosed`] if the stored operation is closed
    /// - [`TreasuryError::StatusConflict`] if the stored status differs from `expected`
    async fn transition(
        &self,
        id: TransferId,
        expected: OperationStatus,
        transition: Transition,
    ) -> Result<Operation>;

    /// Atomically claim every listed obligation and insert every new operation.
    ///
    /// # Errors
    /// - [`TreasuryError::ClearingConflict`] if a claimed operation is no longer open
    /// - [`TreasuryError::NotFound`] if a claimed operation does not exist
    /// - [`TreasuryError::DuplicateId`] if an inserted id already exists
    ///
    /// On any error nothing is written.
    async fn apply(&self, batch: LedgerBatch) -> Result<()>;
}

/// A set of ledger mutations that must land together.
///
/// Produced by a clearing pass: the obligations it nets are claimed
/// (`open → in_progress`) and the clearing and remainder operations it emits
/// are inserted, in one step.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    /// Open obligations to claim, each tagged with the claiming pass.
    pub claims: Vec<(TransferId, PassId)>,
    /// New operations to insert.
    pub inserts: Vec<Operation>,
}

impl LedgerBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, id: TransferId, pass: PassId) -> &mut Self {
        self.claims.push((id, pass));
        self
    }

    pub fn insert(&mut self, operation: Operation) -> &mut Self {
        self.inserts.push(operation);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.inserts.is_empty()
    }

    /// Reject batches that insert the same id twice.
    pub fn check_unique_inserts(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.inserts.len());
        for op in &self.inserts {
            if !seen.insert(op.transfer_id) {
                return Err(TreasuryError::DuplicateId(op.transfer_id));
            }
        }
        Ok(())
    }
}
