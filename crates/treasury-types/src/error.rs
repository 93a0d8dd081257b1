//! Error types for the treasury ledger.
//!
//! All errors use the `TR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Request / parameter errors
//! - 2xx: Ledger store errors
//! - 3xx: Lifecycle (state machine) errors
//! - 4xx: Clearing errors
//! - 5xx: Chain / transaction builder errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Address, OperationStatus, OperationType, TransferId};

/// Central error enum for all treasury operations.
#[derive(Debug, Error)]
pub enum TreasuryError {
    // =================================================================
    // Request Errors (1xx)
    // =================================================================
    /// A required request parameter is absent or malformed.
    #[error("TR_ERR_100: Missing parameter: {reason}")]
    MissingParameter { reason: String },

    /// A query filter carried a value outside its domain.
    #[error("TR_ERR_101: Invalid filter: {reason}")]
    InvalidFilter { reason: String },

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// An operation with this transfer id already exists.
    #[error("TR_ERR_200: Duplicate transfer id: {0}")]
    DuplicateId(TransferId),

    /// No operation with this transfer id.
    #[error("TR_ERR_201: Operation not found: {0}")]
    NotFound(TransferId),

    /// Compare-and-swap lost: the stored status differs from the expected one.
    #[error("TR_ERR_202: Status conflict on {id}: expected {expected}, found {actual}")]
    StatusConflict {
        id: TransferId,
        expected: OperationStatus,
        actual: OperationStatus,
    },

    // =================================================================
    // Lifecycle Errors (3xx)
    // =================================================================
    /// The operation is already closed; the transition was not applied.
    #[error("TR_ERR_300: Operation already closed: {0}")]
    AlreadyClosed(TransferId),

    /// The requested transition is not allowed from the current status.
    #[error("TR_ERR_301: Invalid transition on {id}: {from} -> {to}")]
    InvalidTransition {
        id: TransferId,
        from: OperationStatus,
        to: OperationStatus,
    },

    /// Only payment and clearing operations can be marked paid.
    #[error("TR_ERR_302: Operation {id} of type {op_type} cannot be marked paid")]
    NotPayable {
        id: TransferId,
        op_type: OperationType,
    },

    // =================================================================
    // Clearing Errors (4xx)
    // =================================================================
    /// Netting could not zero a balance; the residue is carried forward.
    #[error("TR_ERR_400: Settlement remainder of {amount} from {debtor} to {creditor}")]
    SettlementRemainder {
        debtor: Address,
        creditor: Address,
        amount: Decimal,
    },

    /// An obligation was claimed by a concurrent clearing pass.
    #[error("TR_ERR_401: Clearing conflict: obligation {0} no longer open")]
    ClearingConflict(TransferId),

    // =================================================================
    // Chain Errors (5xx)
    // =================================================================
    /// The chain-context provider failed to supply nonce or gas data.
    #[error("TR_ERR_500: Chain context unavailable: {0}")]
    ChainContext(String),

    /// Transaction payload could not be encoded.
    #[error("TR_ERR_501: Encoding error: {reason}")]
    Encoding { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TR_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TR_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TR_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl TreasuryError {
    /// Whether the caller supplied bad input (a 400-equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. } | Self::InvalidFilter { .. } | Self::NotPayable { .. }
        )
    }

    /// Whether retrying the same request (with a fresh id) may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateId(_) | Self::ClearingConflict(_) | Self::ChainContext(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TreasuryError>;

impl From<serde_json::Error> for TreasuryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
