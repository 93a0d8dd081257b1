//! # treasury-service
//!
//! The external surface of the treasury. Every call validates its input
//! before touching the ledger, records or transitions operations, and
//! returns the unsigned transaction descriptor the caller must have signed.
//!
//! ```text
//! request ─► validate ─► TransactionBuilder ─► OperationStore ─► receipt
//!                              ▲
//!                   ChainContextProvider
//! ```
//!
//! - [`api`]: request and response DTOs (camelCase on the wire)
//! - [`service`]: [`TreasuryService`]
//! - [`telemetry`]: `tracing-subscriber` installation

pub mod api;
pub mod service;
pub mod telemetry;

pub use api::{
    ConfirmOutcome, ExchangeInRequest, ExchangeOutRequest, FeePaymentRequest, OperationReceipt,
    PaymentRequest, SetPaidReceipt, SetPaidRequest,
};
pub use service::TreasuryService;
pub use telemetry::init_tracing;
