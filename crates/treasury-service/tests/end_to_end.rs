//! End-to-end tests through the service facade.
//!
//! Marketplaces record payments, a clearing pass nets them, settlement is
//! reported with `set_paid`, and the claimed obligations close with the pass.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use treasury_ledger::{InMemoryOperationStore, OperationQuery, OperationStore};
use treasury_service::*;
use treasury_types::*;

const A: &str = "0x00000000000000000000000000000000000000aa";
const B: &str = "0x00000000000000000000000000000000000000bb";
const C: &str = "0x00000000000000000000000000000000000000cc";

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

fn set_paid(sender: &str, id: TransferId, code: &str) -> SetPaidRequest {
    SetPaidRequest {
        sender_address: Some(sender.into()),
        transfer_id: Some(id.to_string()),
        transfer_code: Some(code.into()),
    }
}

#[tokio::test]
async fn triangle_clears_settles_and_closes() {
    let svc = service();
    let gross = vec![
        pay(&svc, A, B, 30).await,
        pay(&svc, B, C, 30).await,
        pay(&svc, C, A, 10).await,
    ];

    let pass = svc.clearing().await.unwrap();
    assert_eq!(pass.transfers.len(), 1);
    let transfer = &pass.transfers[0];
    assert_eq!(transfer.operation.user.to_string(), A);
    assert_eq!(transfer.operation.counterparty.map(|c| c.to_string()).as_deref(), Some(C));
    assert_eq!(transfer.operation.amount, Some(Decimal::new(20, 0)));

    // Clearing response wire shape.
    let json = serde_json::to_value(&pass).unwrap();
    assert_eq!(json["transfers"][0]["operation"]["type"], "clearing");
    assert_eq!(json["transfers"][0]["operation"]["status"], "in_progress");
    assert!(json["transfers"][0]["transactionObject"]["data"].is_string());

    let receipt = svc
        .set_paid(&set_paid(A, transfer.transfer_id, "SEPA-2024-001"))
        .await
        .unwrap();
    assert_eq!(receipt.transfer_id, transfer.transfer_id);

    let cleared = svc.store().get(transfer.transfer_id).await.unwrap();
    assert_eq!(cleared.status, OperationStatus::Closed);
    assert_eq!(cleared.transfer_code.as_deref(), Some("SEPA-2024-001"));
    for receipt in &gross {
        let op = svc.store().get(receipt.transfer_id).await.unwrap();
        assert_eq!(op.status, OperationStatus::Closed, "source obligation closes with its pass");
    }

    // Second set_paid on the same transfer is reported, not applied.
    let err = svc
        .set_paid(&set_paid(A, transfer.transfer_id, "SEPA-OTHER"))
        .await
        .unwrap_err();
    assert!(matches!(err, TreasuryError::AlreadyClosed(_)));
    let still = svc.store().get(transfer.transfer_id).await.unwrap();
    assert_eq!(still.transfer_code.as_deref(), Some("SEPA-2024-001"));

    // Nothing left to clear.
    assert!(svc.clearing().await.unwrap().is_empty());
}

#[tokio::test]
async fn multi_transfer_pass_closes_sources_only_when_all_paid() {
    let svc = service();
    let sources = vec![pay(&svc, A, B, 30).await, pay(&svc, A, C, 20).await];
    let pass = svc.clearing().await.unwrap();
    assert_eq!(pass.transfers.len(), 2);

    svc.confirm(pass.transfers[0].transfer_id).await.unwrap();
    for s in &sources {
        let op = svc.store().get(s.transfer_id).await.unwrap();
        assert_eq!(op.status, OperationStatus::InProgress);
    }

    svc.confirm(pass.transfers[1].transfer_id).await.unwrap();
    for s in &sources {
        let op = svc.store().get(s.transfer_id).await.unwrap();
        assert_eq!(op.status, OperationStatus::Closed);
    }
}

#[tokio::test]
async fn set_paid_validates_before_touching_the_store() {
    let svc = service();
    let err = svc
        .set_paid(&SetPaidRequest {
            sender_address: Some(A.into()),
            transfer_id: Some(TransferId::new().to_string()),
            transfer_code: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TreasuryError::MissingParameter { .. }));
    assert_eq!(
        err.to_string(),
        "TR_ERR_100: Missing parameter: Must provide senderAddress, transferId and transferCode"
    );

    let unknown = TransferId::new();
    let err = svc.set_paid(&set_paid(A, unknown, "REF")).await.unwrap_err();
    assert!(matches!(err, TreasuryError::NotFound(id) if id == unknown));
}

#[tokio::test]
async fn exchange_in_is_minted_by_operator() {
    let svc = service();
    let receipt = svc
        .exchange_in(&ExchangeInRequest {
            user_address: Some(A.into()),
            tokens: Some(Decimal::new(60, 0)),
        })
        .await
        .unwrap();
    assert_eq!(receipt.operation.op_type, OperationType::ExchangeIn);
    assert_eq!(receipt.operation.status, OperationStatus::Open);
    assert_eq!(receipt.transaction_object.from, ChainConfig::default().operator_address);
    assert_eq!(receipt.transaction_object.to, ChainConfig::default().treasury_contract);
    assert_eq!(receipt.transaction_object.chain_id, constants::DEFAULT_CHAIN_ID);

    let json = serde_json::to_value(&receipt).unwrap();
    assert_eq!(json["transferId"], receipt.transfer_id.to_string());
    assert_eq!(json["operation"]["transferId"], receipt.transfer_id.to_string());
}

#[tokio::test]
async fn excess_precision_is_rejected_without_a_record() {
    let svc = service();
    let err = svc
        .fee_payment(&FeePaymentRequest {
            sender_address: Some(A.into()),
            marketplace_address: Some(B.into()),
            fee_amount: Some(Decimal::new(1_001, 3)),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TreasuryError::Encoding { .. }));
    let page = svc.list_operations(&OperationQuery::default()).await.unwrap();
    assert!(page.operations.is_empty());
}

#[tokio::test]
async fn provider_outage_records_nothing() {
    let store = Arc::new(InMemoryOperationStore::new());
    let provider = Arc::new(treasury_chain::StaticChainContext::default());
    let svc = TreasuryService::new(&TreasuryConfig::default(), store.clone(), provider.clone()).unwrap();
    provider.set_unavailable(true);

    let err = svc
        .exchange_out(&ExchangeOutRequest {
            sender_address: Some(A.into()),
            marketplace_address: Some(B.into()),
        })
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(store.is_empty());
}

#[tokio::test]
async fn list_operations_filters_by_user() {
    let svc = service();
    pay(&svc, A, B, 1).await;
    pay(&svc, B, C, 2).await;
    pay(&svc, C, A, 3).await;

    let page = svc
        .list_operations(&OperationQuery {
            user: Some(C.into()),
            ..OperationQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 2);

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["page_size"], 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exchange_in_produces_distinct_ids() {
    let svc = Arc::new(service());
    let mut handles = Vec::new();
    for i in 0..16 {
        let svc = Arc::clone(&svc);
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for _ in 0..10 {
                let receipt = svc
                    .exchange_in(&ExchangeInRequest {
                        user_address: Some(Address([i; 20]).to_string()),
                        tokens: Some(Decimal::new(1, 0)),
                    })
                    .await
                    .unwrap();
                ids.push(receipt.transfer_id);
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 160);
    let page = svc.list_operations(&OperationQuery::default()).await.unwrap();
    assert_eq!(page.operations.len(), 160);
}
