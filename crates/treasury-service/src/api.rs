//! Request and response types.
//!
//! Requests keep raw `Option` fields so that absent and malformed input can
//! be reported as [`TreasuryError::MissingParameter`] with a message naming
//! every required field, before anything touches the ledger.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use treasury_types::{Address, Operation, Result, TransactionObject, TransferId, TreasuryError};

fn missing(reason: &str) -> TreasuryError {
    TreasuryError::MissingParameter {
        reason: reason.to_string(),
    }
}

fn text<'a>(raw: Option<&'a String>, reason: &str) -> Result<&'a str> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing(reason))
}

fn parse<T: FromStr>(raw: Option<&String>, reason: &str) -> Result<T> {
    text(raw, reason)?.parse().map_err(|_| missing(reason))
}

fn positive(raw: Option<Decimal>, reason: &str) -> Result<Decimal> {
    match raw {
        Some(amount) if amount > Decimal::ZERO => Ok(amount),
        _ => Err(missing(reason)),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInRequest {
    pub user_address: Option<String>,
    pub tokens: Option<Decimal>,
}

impl ExchangeInRequest {
    const REQUIRED: &'static str = "Must provide userAddress and tokens";

    pub(crate) fn validate(&self) -> Result<(Address, Decimal)> {
        Ok((
            parse(self.user_address.as_ref(), Self::REQUIRED)?,
            positive(self.tokens, Self::REQUIRED)?,
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutRequest {
    pub sender_address: Option<String>,
    pub marketplace_address: Option<String>,
}

impl ExchangeOutRequest {
    const REQUIRED: &'static str = "Must provide the senderAddress and marketplaceAddress";

    pub(crate) fn validate(&self) -> Result<(Address, Address)> {
        Ok((
            parse(self.sender_address.as_ref(), Self::REQUIRED)?,
            parse(self.marketplace_address.as_ref(), Self::REQUIRED)?,
        ))
    }
}

/// Records an obligation from `sender` to `beneficiary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub sender_address: Option<String>,
    pub beneficiary_address: Option<String>,
    pub amount: Option<Decimal>,
}

impl PaymentRequest {
    const REQUIRED: &'static str = "Must provide senderAddress, beneficiaryAddress and amount";

    pub(crate) fn validate(&self) -> Result<(Address, Address, Decimal)> {
        let sender: Address = parse(self.sender_address.as_ref(), Self::REQUIRED)?;
        let beneficiary: Address = parse(self.beneficiary_address.as_ref(), Self::REQUIRED)?;
        if sender == beneficiary {
            return Err(missing("beneficiaryAddress must differ from senderAddress"));
        }
        Ok((sender, beneficiary, positive(self.amount, Self::REQUIRED)?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePaymentRequest {
    pub sender_address: Option<String>,
    pub marketplace_address: Option<String>,
    pub fee_amount: Option<Decimal>,
}

impl FeePaymentRequest {
    const REQUIRED: &'static str = "Must provide senderAddress, marketplaceAddress and feeAmount";

    pub(crate) fn validate(&self) -> Result<(Address, Address, Decimal)> {
        let sender: Address = parse(self.sender_address.as_ref(), Self::REQUIRED)?;
        let marketplace: Address = parse(self.marketplace_address.as_ref(), Self::REQUIRED)?;
        if sender == marketplace {
            return Err(missing("marketplaceAddress must differ from senderAddress"));
        }
        Ok((sender, marketplace, positive(self.fee_amount, Self::REQUIRED)?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPaidRequest {
    pub sender_address: Option<String>,
    pub transfer_id: Option<String>,
    pub transfer_code: Option<String>,
}

impl SetPaidRequest {
    const REQUIRED: &'static str = "Must provide senderAddress, transferId and transferCode";

    pub(crate) fn validate(&self) -> Result<(Address, TransferId, String)> {
        Ok((
            parse(self.sender_address.as_ref(), Self::REQUIRED)?,
            parse(self.transfer_id.as_ref(), Self::REQUIRED)?,
            text(self.transfer_code.as_ref(), Self::REQUIRED)?.to_string(),
        ))
    }
}

/// Response of every call that records a new operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReceipt {
    pub transfer_id: TransferId,
    pub transaction_object: TransactionObject,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPaidReceipt {
    pub transfer_id: TransferId,
    pub transaction_object: TransactionObject,
}

/// Result of a confirmation signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// The operation moved to `closed`.
    Closed { operation: Operation },
    /// A repeated signal; nothing changed.
    AlreadyClosed {
        #[serde(rename = "transferId")]
        transfer_id: TransferId,
    },
}
