//! [`TreasuryService`]: the operations exposed to marketplaces.
//!
//! Creation calls build the transaction descriptor first and store the
//! operation second, so a chain-context failure never leaves an orphan
//! record. Closing calls use the store's compare-and-swap and, for clearing
//! operations, settle the owning pass once all of its transfers are closed.

use std::sync::Arc;

use rust_decimal::Decimal;
use treasury_chain::{ChainContextProvider, StaticChainContext, TransactionBuilder, TxIntent};
use treasury_clearing::{ClearingEngine, ClearingPass};
use treasury_ledger::{InMemoryOperationStore, OperationPage, OperationQuery, OperationStore};
use treasury_types::{
    Address, Operation, OperationType, Result, TransferId, Transition, TreasuryConfig,
    TreasuryError,
};

use crate::api::{
    ConfirmOutcome, ExchangeInRequest, ExchangeOutRequest, FeePaymentRequest, OperationReceipt,
    PaymentRequest, SetPaidReceipt, SetPaidRequest,
};

/// Compare-and-swap attempts before a close gives up.
const CLOSE_ATTEMPTS: usize = 3;

pub struct TreasuryService {
    store: Arc<dyn OperationStore>,
    provider: Arc<dyn ChainContextProvider>,
    builder: TransactionBuilder,
    clearing: ClearingEngine,
}

impl TreasuryService {
    /// Wire the service over a store and a chain-context provider.
    ///
    /// # Errors
    /// [`TreasuryError::Configuration`] if `config` does not validate.
    pub fn new(
        config: &TreasuryConfig,
        store: Arc<dyn OperationStore>,
        provider: Arc<dyn ChainContextProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let builder = TransactionBuilder::new(&config.chain, &config.clearing);
        let clearing = ClearingEngine::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            builder,
            &config.clearing,
        );
        tracing::info!(
            contract = %builder.contract(),
            chain_id = config.chain.chain_id,
            token_decimals = config.clearing.token_decimals,
            "treasury service ready"
        );
        Ok(Self {
            store,
            provider,
            builder,
            clearing,
        })
    }

    /// Service over an in-memory store and a static provider on the
    /// configured chain id.
    pub fn in_memory(config: &TreasuryConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(InMemoryOperationStore::new()),
            Arc::new(StaticChainContext::new(config.chain.chain_id)),
        )
    }

    pub fn store(&self) -> &Arc<dyn OperationStore> {
        &self.store
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub async fn list_operations(&self, query: &OperationQuery) -> Result<OperationPage> {
        treasury_ledger::list_operations(self.store.as_ref(), query).await
    }

    // -----------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------

    /// Credit `tokens` to a user against fiat received by the treasury.
    pub async fn exchange_in(&self, request: &ExchangeInRequest) -> Result<OperationReceipt> {
        let (user, tokens) = request.validate()?;
        let operation = Operation::new(OperationType::ExchangeIn, user, None, Some(tokens));
        let intent = TxIntent::ExchangeIn {
            transfer_id: operation.transfer_id,
            user,
            tokens,
        };
        self.record(operation, intent).await
    }

    /// Redeem a user's tokens through a marketplace.
    pub async fn exchange_out(&self, request: &ExchangeOutRequest) -> Result<OperationReceipt> {
        let (sender, marketplace) = request.validate()?;
        let operation = Operation::new(OperationType::ExchangeOut, sender, Some(marketplace), None);
        let intent = TxIntent::ExchangeOut {
            transfer_id: operation.transfer_id,
            sender,
            marketplace,
        };
        self.record(operation, intent).await
    }

    /// Record an inter-marketplace obligation for the next clearing pass.
    pub async fn payment(&self, request: &PaymentRequest) -> Result<OperationReceipt> {
        let (sender, beneficiary, amount) = request.validate()?;
        let operation = obligation(OperationType::Payment, sender, beneficiary, amount);
        let intent = TxIntent::Payment {
            transfer_id: operation.transfer_id,
            sender,
            beneficiary,
            amount,
        };
        self.record(operation, intent).await
    }

    pub async fn fee_payment(&self, request: &FeePaymentRequest) -> Result<OperationReceipt> {
        let (sender, marketplace, fee) = request.validate()?;
        let operation = obligation(OperationType::FeePayment, sender, marketplace, fee);
        let intent = TxIntent::FeePayment {
            transfer_id: operation.transfer_id,
            sender,
            marketplace,
            fee,
        };
        self.record(operation, intent).await
    }

    async fn record(&self, operation: Operation, intent: TxIntent) -> Result<OperationReceipt> {
        let transaction_object = self.builder.prepare(self.provider.as_ref(), &intent).await?;
        self.store.put(operation.clone()).await?;
        tracing::info!(
            transfer_id = %operation.transfer_id,
            op_type = %operation.op_type,
            user = %operation.user,
            status = %operation.status,
            "operation recorded"
        );
        Ok(OperationReceipt {
            transfer_id: operation.transfer_id,
            transaction_object,
            operation,
        })
    }

    // -----------------------------------------------------------------
    // Clearing
    // -----------------------------------------------------------------

    /// Net every open obligation. See [`ClearingEngine::run_pass`].
    pub async fn clearing(&self) -> Result<ClearingPass> {
        self.clearing.run_pass().await
    }

    // -----------------------------------------------------------------
    // Closing
    // -----------------------------------------------------------------

    /// Mark a payment or clearing operation as paid with its fiat reference.
    ///
    /// # Errors
    /// - [`TreasuryError::MissingParameter`] before the store is read
    /// - [`TreasuryError::NotFound`] for an unknown transfer id
    /// - [`TreasuryError::NotPayable`] for any other operation type
    /// - [`TreasuryError::AlreadyClosed`] if it is already closed
    pub async fn set_paid(&self, request: &SetPaidRequest) -> Result<SetPaidReceipt> {
        let (sender, transfer_id, transfer_code) = request.validate()?;

        let operation = self.store.get(transfer_id).await?;
        if !operation.op_type.is_payable() {
            return Err(TreasuryError::NotPayable {
                id: transfer_id,
                op_type: operation.op_type,
            });
        }
        if operation.is_closed() {
            tracing::info!(%transfer_id, "set_paid on closed operation ignored");
            return Err(TreasuryError::AlreadyClosed(transfer_id));
        }

        let intent = TxIntent::SetPaid {
            transfer_id,
            sender,
            transfer_code: transfer_code.clone(),
        };
        let transaction_object = self.builder.prepare(self.provider.as_ref(), &intent).await?;

        self.close(operation, Some(transfer_code)).await?;
        Ok(SetPaidReceipt {
            transfer_id,
            transaction_object,
        })
    }

    /// Confirmation signal from the chain watcher. Repeated signals for the
    /// same transfer report [`ConfirmOutcome::AlreadyClosed`].
    pub async fn confirm(&self, transfer_id: TransferId) -> Result<ConfirmOutcome> {
        let operation = self.store.get(transfer_id).await?;
        if operation.is_closed() {
            tracing::info!(%transfer_id, "repeated confirmation ignored");
            return Ok(ConfirmOutcome::AlreadyClosed { transfer_id });
        }
        match self.close(operation, None).await {
            Ok(operation) => Ok(ConfirmOutcome::Closed { operation }),
            Err(TreasuryError::AlreadyClosed(_)) => {
                tracing::info!(%transfer_id, "repeated confirmation ignored");
                Ok(ConfirmOutcome::AlreadyClosed { transfer_id })
            }
            Err(err) => Err(err),
        }
    }

    /// Close `operation`, retrying when a concurrent claim moved its status.
    async fn close(&self, mut operation: Operation, transfer_code: Option<String>) -> Result<Operation> {
        let transfer_id = operation.transfer_id;
        let mut attempts = 0;
        let closed = loop {
            attempts += 1;
            let transition = Transition::Close {
                transfer_code: transfer_code.clone(),
            };
            match self
                .store
                .transition(transfer_id, operation.status, transition)
                .await
            {
                Ok(closed) => break closed,
                Err(TreasuryError::StatusConflict { actual, .. }) if attempts < CLOSE_ATTEMPTS => {
                    tracing::debug!(%transfer_id, %actual, "status moved under close, retrying");
                    operation = self.store.get(transfer_id).await?;
                }
                Err(err) => return Err(err),
            }
        };
        tracing::info!(
            %transfer_id,
            op_type = %closed.op_type,
            transfer_code = closed.transfer_code.as_deref().unwrap_or_default(),
            "operation closed"
        );

        if closed.op_type == OperationType::Clearing {
            if let Some(pass_id) = closed.clearing_pass {
                self.clearing.close_settled_pass(pass_id).await?;
            }
        }
        Ok(closed)
    }
}

fn obligation(op_type: OperationType, debtor: Address, creditor: Address, amount: Decimal) -> Operation {
    Operation::new(op_type, debtor, Some(creditor), Some(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use treasury_types::{OperationStatus, TreasuryConfig};

    const A: &str = "0x00000000000000000000000000000000000000aa";
    const B: &str = "0x00000000000000000000000000000000000000bb";

    fn service() -> TreasuryService {
        TreasuryService::in_memory(&TreasuryConfig::default()).unwrap()
    }

    async fn pay(svc: &TreasuryService, from: &str, to: &str, amount: i64) -> OperationReceipt {
        svc.payment(&PaymentRequest {
            sender_address: Some(from.into()),
            beneficiary_address: Some(to.into()),
            amount: Some(Decimal::new(amount, 0)),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn payment_is_recorded_open() {
        let svc = service();
        let receipt = pay(&svc, A, B, 25).await;
        assert_eq!(receipt.operation.status, OperationStatus::Open);
        assert_eq!(receipt.transaction_object.from.to_string(), A);
        let stored = svc.store().get(receipt.transfer_id).await.unwrap();
        assert_eq!(stored, receipt.operation);
    }

    #[tokio::test]
    async fn set_paid_rejects_exchange_operations() {
        let svc = service();
        let receipt = svc
            .exchange_out(&ExchangeOutRequest {
                sender_address: Some(A.into()),
                marketplace_address: Some(B.into()),
            })
            .await
            .unwrap();
        let err = svc
            .set_paid(&SetPaidRequest {
                sender_address: Some(A.into()),
                transfer_id: Some(receipt.transfer_id.to_string()),
                transfer_code: Some("REF".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TreasuryError::NotPayable { .. }));
    }

    #[tokio::test]
    async fn set_paid_after_confirm_keeps_the_first_close() {
        let svc = service();
        let receipt = pay(&svc, A, B, 5).await;
        svc.confirm(receipt.transfer_id).await.unwrap();
        let closed = svc.store().get(receipt.transfer_id).await.unwrap();

        let err = svc
            .set_paid(&SetPaidRequest {
                sender_address: Some(A.into()),
                transfer_id: Some(receipt.transfer_id.to_string()),
                transfer_code: Some("LATE-REF".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TreasuryError::AlreadyClosed(id) if id == receipt.transfer_id));
        assert_eq!(svc.store().get(receipt.transfer_id).await.unwrap(), closed);
    }

    #[tokio::test]
    async fn confirm_twice_is_idempotent() {
        let svc = service();
        let receipt = pay(&svc, A, B, 5).await;
        let first = svc.confirm(receipt.transfer_id).await.unwrap();
        assert!(matches!(first, ConfirmOutcome::Closed { .. }));
        let second = svc.confirm(receipt.transfer_id).await.unwrap();
        assert_eq!(
            second,
            ConfirmOutcome::AlreadyClosed {
                transfer_id: receipt.transfer_id
            }
        );
    }

    #[tokio::test]
    async fn close_follows_a_concurrent_claim() {
        let svc = service();
        let receipt = pay(&svc, A, B, 5).await;
        // A clearing pass claims the obligation after we read it as open.
        let stale = svc.store().get(receipt.transfer_id).await.unwrap();
        svc.clearing().await.unwrap();

        let closed = svc.close(stale, Some("REF".into())).await.unwrap();
        assert_eq!(closed.status, OperationStatus::Closed);
        assert_eq!(closed.transfer_code.as_deref(), Some("REF"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = TreasuryConfig::default();
        config.clearing.token_decimals = 40;
        assert!(matches!(
            TreasuryService::in_memory(&config),
            Err(TreasuryError::Configuration(_))
        ));
    }
}
