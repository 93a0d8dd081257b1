//! In-memory [`OperationStore`] backend.
//!
//! All state sits behind one `parking_lot::RwLock`. Critical sections are
//! short and synchronous; the lock is never held across an `.await`.
//!
//! A secondary `(date, transfer_id)` index keeps scans in ledger order
//! without sorting on every query. Dates are immutable, so the index never
//! needs updating after insert.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use treasury_types::{
    Operation, OperationStatus, Result, TransferId, Transition, TreasuryError,
};

use crate::query::{Selection, Window};
use crate::store::{LedgerBatch, OperationStore};

#[derive(Default)]
struct Inner {
    by_id: HashMap<TransferId, Operation>,
    by_date: BTreeSet<(DateTime<Utc>, TransferId)>,
}

impl Inner {
    fn insert(&mut self, op: Operation) {
        self.by_date.insert((op.date, op.transfer_id));
        self.by_id.insert(op.transfer_id, op);
    }
}

/// Thread-safe in-memory operation store.
#[derive(Default)]
pub struct InMemoryOperationStore {
    inner: RwLock<Inner>,
}

impl InMemoryOperationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn put(&self, operation: Operation) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&operation.transfer_id) {
            tracing::warn!(transfer_id = %operation.transfer_id, "duplicate transfer id rejected");
            return Err(TreasuryError::DuplicateId(operation.transfer_id));
        }
        inner.insert(operation);
        Ok(())
    }

    async fn get(&self, id: TransferId) -> Result<Operation> {
        self.inner
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(TreasuryError::NotFound(id))
    }

    async fn scan(&self, selection: &Selection, window: Window) -> Result<Vec<Operation>> {
        let inner = self.inner.read();
        let matching = inner
            .by_date
            .iter()
            .filter_map(|(_, id)| inner.by_id.get(id))
            .filter(|op| selection.matches(op))
            .skip(window.offset);
        let operations = match window.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(operations)
    }

    async fn transition(
        &self,
        id: TransferId,
        expected: OperationStatus,
        transition: Transition,
    ) -> Result<Operation> {
        let mut inner = self.inner.write();
        let op = inner.by_id.get_mut(&id).ok_or(TreasuryError::NotFound(id))?;
        if op.is_closed() {
            return Err(TreasuryError::AlreadyClosed(id));
        }
        if op.status != expected {
            return Err(TreasuryError::StatusConflict {
                id,
                expected,
                actual: op.status,
            });
        }
        // Apply to a copy so a rejected transition leaves the record untouched.
        let mut updated = op.clone();
        updated.apply(&transition)?;
        *op = updated.clone();
        Ok(updated)
    }

    async fn apply(&self, batch: LedgerBatch) -> Result<()> {
        batch.check_unique_inserts()?;
        let mut inner = self.inner.write();

        // Validate everything before the first write.
        let mut claimed = Vec::with_capacity(batch.claims.len());
        for (id, pass) in &batch.claims {
            let op = inner.by_id.get(id).ok_or(TreasuryError::NotFound(*id))?;
            if op.status != OperationStatus::Open {
                return Err(TreasuryError::ClearingConflict(*id));
            }
            let mut updated = op.clone();
            updated.apply(&Transition::Claim { pass: *pass })?;
            claimed.push(updated);
        }
        if let Some(dup) = batch
            .inserts
            .iter()
            .find(|op| inner.by_id.contains_key(&op.transfer_id))
        {
            return Err(TreasuryError::DuplicateId(dup.transfer_id));
        }

        for op in claimed {
            inner.by_id.insert(op.transfer_id, op);
        }
        for op in batch.inserts {
            inner.insert(op);
        }
        Ok(())
    }
}
