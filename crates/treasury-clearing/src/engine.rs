//! The clearing engine.
//!
//! ## Pass Lifecycle
//!
//! ```text
//! scan open obligations ──► net ──► build descriptors ──► apply batch
//!                                    (per-debtor nonces)   (claims + inserts)
//! ```
//!
//! Nothing is written until every descriptor has been built. The batch
//! claims each netted obligation with a compare-and-swap on `open`, so two
//! concurrent passes can never net the same balance: the loser gets
//! [`TreasuryError::ClearingConflict`] and leaves no trace.
//!
//! When every clearing operation of a pass is closed,
//! [`ClearingEngine::close_settled_pass`] closes the obligations it claimed.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use treasury_chain::{ChainContextProvider, TransactionBuilder, TxIntent};
use treasury_ledger::{LedgerBatch, OperationStore, Selection, Window};
use treasury_types::{
    Address, ChainContext, ClearingConfig, Operation, OperationStatus, OperationType, PassId,
    Result, TransactionObject, TransferId, Transition, TreasuryError,
};

use crate::digest::compute_pass_digest;
use crate::netting::{NetTransfer, net_positions, settle};

/// One materialized net transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedTransfer {
    pub transfer_id: TransferId,
    pub transaction_object: TransactionObject,
    pub operation: Operation,
}

/// Outcome of one clearing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearingPass {
    pub pass_id: PassId,
    /// Hex SHA-256 over the ordered net transfers.
    pub digest: String,
    pub transfers: Vec<ClearedTransfer>,
    /// New open obligations holding amounts this pass could not emit.
    pub carried_forward: Vec<Operation>,
    /// Obligations claimed by this pass.
    #[serde(skip)]
    pub claimed: Vec<TransferId>,
}

impl ClearingPass {
    fn empty(pass_id: PassId) -> Self {
        Self {
            pass_id,
            digest: hex::encode(compute_pass_digest(&[])),
            transfers: Vec::new(),
            carried_forward: Vec::new(),
            claimed: Vec::new(),
        }
    }

    /// A pass that found nothing to settle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Nets open obligations into clearing operations.
pub struct ClearingEngine {
    store: Arc<dyn OperationStore>,
    provider: Arc<dyn ChainContextProvider>,
    builder: TransactionBuilder,
    min_transfer: Decimal,
}

impl ClearingEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn OperationStore>,
        provider: Arc<dyn ChainContextProvider>,
        builder: TransactionBuilder,
        config: &ClearingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            builder,
            min_transfer: config.min_transfer,
        }
    }

    /// Run one clearing pass over every currently open obligation.
    ///
    /// Obligations that cancel out completely are claimed and closed with
    /// no transfer. Otherwise a pass with no positive transfer (only dust or
    /// balances below the minimum) returns an empty [`ClearingPass`] and
    /// writes nothing.
    ///
    /// # Errors
    /// - [`TreasuryError::Encoding`] if a net position overflows, or
    ///   [`TreasuryError::ChainContext`] / [`TreasuryError::Encoding`] while
    ///   building descriptors; nothing is written
    /// - [`TreasuryError::ClearingConflict`] if a concurrent pass claimed one
    ///   of the obligations first; nothing is written
    pub async fn run_pass(&self) -> Result<ClearingPass> {
        let pass_id = PassId::new();
        let obligations = self
            .store
            .scan(&Selection::OpenObligations, Window::all())
            .await?;

        let positions = net_positions(obligations.iter().filter_map(Operation::obligation))?;
        if positions.is_empty() && !obligations.is_empty() {
            return self.close_cancelled(pass_id, &obligations).await;
        }
        let netting = settle(&positions, self.builder.token_decimals(), self.min_transfer);
        if netting.is_empty() {
            tracing::debug!(
                %pass_id,
                open = obligations.len(),
                "clearing pass found nothing to settle"
            );
            return Ok(ClearingPass::empty(pass_id));
        }

        let transfers = self.materialize(pass_id, &netting.transfers).await?;
        let carried_forward: Vec<Operation> = netting
            .remainders
            .iter()
            .map(|r| Operation::carried_remainder(pass_id, r.debtor, r.creditor, r.amount))
            .collect();

        let mut batch = LedgerBatch::new();
        for op in &obligations {
            batch.claim(op.transfer_id, pass_id);
        }
        for t in &transfers {
            batch.insert(t.operation.clone());
        }
        for op in &carried_forward {
            batch.insert(op.clone());
        }

        if let Err(err) = self.store.apply(batch).await {
            tracing::warn!(%pass_id, error = %err, "clearing pass aborted");
            return Err(err);
        }

        for r in &netting.remainders {
            let remainder = TreasuryError::SettlementRemainder {
                debtor: r.debtor,
                creditor: r.creditor,
                amount: r.amount,
            };
            tracing::warn!(%pass_id, "{remainder}");
        }

        let digest = hex::encode(compute_pass_digest(&netting.transfers));
        tracing::info!(
            %pass_id,
            claimed = obligations.len(),
            transfers = transfers.len(),
            carried = carried_forward.len(),
            volume = ?netting.settled_volume(),
            %digest,
            "clearing pass committed"
        );

        Ok(ClearingPass {
            pass_id,
            digest,
            transfers,
            carried_forward,
            claimed: obligations.iter().map(|op| op.transfer_id).collect(),
        })
    }

    /// Claim obligations whose positions all net to zero and close them.
    ///
    /// If closing stops partway, the claimed remainder stays in progress
    /// under `pass_id` and a later [`Self::close_settled_pass`] finishes it.
    async fn close_cancelled(
        &self,
        pass_id: PassId,
        obligations: &[Operation],
    ) -> Result<ClearingPass> {
        let mut batch = LedgerBatch::new();
        for op in obligations {
            batch.claim(op.transfer_id, pass_id);
        }
        if let Err(err) = self.store.apply(batch).await {
            tracing::warn!(%pass_id, error = %err, "clearing pass aborted");
            return Err(err);
        }

        let closed = self.close_settled_pass(pass_id).await?;
        tracing::info!(%pass_id, closed = closed.len(), "obligations cancelled out");

        Ok(ClearingPass {
            claimed: obligations.iter().map(|op| op.transfer_id).collect(),
            ..ClearingPass::empty(pass_id)
        })
    }

    /// Build one clearing operation and descriptor per net transfer.
    ///
    /// Chain context is fetched once per debtor; a debtor paying several
    /// creditors gets consecutive nonces in transfer order.
    async fn materialize(
        &self,
        pass_id: PassId,
        transfers: &[NetTransfer],
    ) -> Result<Vec<ClearedTransfer>> {
        let mut contexts: BTreeMap<Address, (ChainContext, u64)> = BTreeMap::new();
        let mut out = Vec::with_capacity(transfers.len());

        for t in transfers {
            if !contexts.contains_key(&t.debtor) {
                let ctx = self.provider.context_for(&t.debtor).await?;
                contexts.insert(t.debtor, (ctx, 0));
            }
            let Some((ctx, used)) = contexts.get_mut(&t.debtor) else {
                return Err(TreasuryError::Internal(format!(
                    "chain context for {} vanished",
                    t.debtor
                )));
            };

            let operation = Operation::clearing(pass_id, t.debtor, t.creditor, t.amount);
            let intent = TxIntent::Clearing {
                transfer_id: operation.transfer_id,
                debtor: t.debtor,
                creditor: t.creditor,
                amount: t.amount,
            };
            let transaction_object = self.builder.build(&intent, &ctx.with_nonce_offset(*used))?;
            *used += 1;

            out.push(ClearedTransfer {
                transfer_id: operation.transfer_id,
                transaction_object,
                operation,
            });
        }
        Ok(out)
    }

    /// Close the obligations claimed by `pass_id` once every clearing
    /// operation it emitted is closed.
    ///
    /// Returns the ids closed by this call; empty while the pass is still
    /// in flight or when it was already settled.
    ///
    /// # Errors
    /// Store errors other than [`TreasuryError::AlreadyClosed`].
    pub async fn close_settled_pass(&self, pass_id: PassId) -> Result<Vec<TransferId>> {
        let members = self
            .store
            .scan(&Selection::Pass(pass_id), Window::all())
            .await?;

        let pending = members
            .iter()
            .filter(|op| op.op_type == OperationType::Clearing && !op.is_closed())
            .count();
        if pending > 0 {
            tracing::debug!(%pass_id, pending, "clearing pass still in flight");
            return Ok(Vec::new());
        }

        let mut closed = Vec::new();
        for op in members
            .iter()
            .filter(|op| op.op_type != OperationType::Clearing && !op.is_closed())
        {
            match self
                .store
                .transition(
                    op.transfer_id,
                    OperationStatus::InProgress,
                    Transition::Close {
                        transfer_code: None,
                    },
                )
                .await
            {
                Ok(_) => closed.push(op.transfer_id),
                // A concurrent settlement of the same pass got there first.
                Err(TreasuryError::AlreadyClosed(_)) => {}
                Err(err) => return Err(err),
            }
        }

        if !closed.is_empty() {
            tracing::info!(%pass_id, closed = closed.len(), "clearing pass settled");
        }
        Ok(closed)
    }
}
