//! # Operation: the central ledger entity
//!
//! Every interaction with the treasury (exchange in/out, inter-marketplace
//! payment, fee payment, clearing settlement) is recorded as an
//! [`Operation`]. Identity, type, parties, amount and date never change
//! after creation; only the lifecycle status moves.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  clearing claim  ┌─────────────┐
//!   │ OPEN ├─────────────────▶│ IN_PROGRESS │
//!   └──┬───┘                  └──────┬──────┘
//!      │ setPaid / confirmation      │ setPaid / confirmation
//!      │                             ▼
//!      │                        ┌────────┐
//!      └───────────────────────▶│ CLOSED │
//!                               └────────┘
//! ```
//!
//! Transitions are **monotonic**. `CLOSED` is terminal: any further
//! transition reports [`TreasuryError::AlreadyClosed`] and leaves the
//! record untouched, which makes retried confirmation signals harmless.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, PassId, Result, TransferId, TreasuryError};

/// What kind of value movement an operation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Tokens issued to a user against a fiat deposit.
    ExchangeIn,
    /// Tokens redeemed by a holder at a marketplace.
    ExchangeOut,
    /// Net settlement transfer emitted by the clearing engine.
    Clearing,
    /// Inter-marketplace fiat obligation.
    Payment,
    /// Fee owed by a marketplace to another marketplace.
    FeePayment,
}

impl OperationType {
    pub const ALL: [Self; 5] = [
        Self::ExchangeIn,
        Self::ExchangeOut,
        Self::Clearing,
        Self::Payment,
        Self::FeePayment,
    ];

    /// Status a freshly created operation of this type starts in.
    ///
    /// Clearing is multi-step (net transfer then fiat settlement), so it is
    /// born `in_progress`.
    #[must_use]
    pub fn initial_status(self) -> OperationStatus {
        match self {
            Self::Clearing => OperationStatus::InProgress,
            Self::ExchangeIn | Self::ExchangeOut | Self::Payment | Self::FeePayment => {
                OperationStatus::Open
            }
        }
    }

    /// Whether the clearing engine nets open operations of this type.
    #[must_use]
    pub fn is_obligation(self) -> bool {
        matches!(self, Self::Payment | Self::FeePayment)
    }

    /// Whether `setPaid` may close operations of this type.
    #[must_use]
    pub fn is_payable(self) -> bool {
        matches!(self, Self::Payment | Self::Clearing)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExchangeIn => "exchange_in",
            Self::ExchangeOut => "exchange_out",
            Self::Clearing => "clearing",
            Self::Payment => "payment",
            Self::FeePayment => "fee_payment",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| TreasuryError::InvalidFilter {
                reason: format!("unknown operation type '{s}'"),
            })
    }
}

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Open,
    InProgress,
    Closed,
}

impl OperationStatus {
    pub const ALL: [Self; 3] = [Self::Open, Self::InProgress, Self::Closed];

    /// Can an operation in this status move to `target`?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::InProgress | Self::Closed) | (Self::InProgress, Self::Closed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| TreasuryError::InvalidFilter {
                reason: format!("unknown operation status '{s}'"),
            })
    }
}

/// A lifecycle change requested on an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Claim an open obligation into a clearing pass (`open → in_progress`).
    Claim { pass: PassId },
    /// Close the operation, optionally attaching the bank transfer code.
    Close { transfer_code: Option<String> },
}

impl Transition {
    /// Status the operation ends up in when this transition applies.
    #[must_use]
    pub fn target(&self) -> OperationStatus {
        match self {
            Self::Claim { .. } => OperationStatus::InProgress,
            Self::Close { .. } => OperationStatus::Closed,
        }
    }
}

/// A recorded intent to move value, with immutable identity and a mutable
/// lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub transfer_id: TransferId,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub status: OperationStatus,
    /// The principal the operation is performed on behalf of.
    pub user: Address,
    /// Target marketplace or beneficiary, when the operation has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_code: Option<String>,
    /// Clearing pass that emitted (clearing) or claimed (obligation) this operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearing_pass: Option<PassId>,
    /// Clearing pass whose rounding residue this obligation carries forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carried_from: Option<PassId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Operation {
    /// Create a new operation in the initial status for its type.
    #[must_use]
    pub fn new(
        op_type: OperationType,
        user: Address,
        counterparty: Option<Address>,
        amount: Option<Decimal>,
    ) -> Self {
        Self {
            transfer_id: TransferId::new(),
            op_type,
            status: op_type.initial_status(),
            user,
            counterparty,
            amount,
            date: Utc::now(),
            transfer_code: None,
            clearing_pass: None,
            carried_from: None,
            closed_at: None,
        }
    }

    /// A net settlement transfer from `debtor` to `creditor` emitted by `pass`.
    #[must_use]
    pub fn clearing(pass: PassId, debtor: Address, creditor: Address, amount: Decimal) -> Self {
        let mut op = Self::new(OperationType::Clearing, debtor, Some(creditor), Some(amount));
        op.clearing_pass = Some(pass);
        op
    }

    /// An open payment obligation carrying a rounding residue of `pass`.
    #[must_use]
    pub fn carried_remainder(
        pass: PassId,
        debtor: Address,
        creditor: Address,
        amount: Decimal,
    ) -> Self {
        let mut op = Self::new(OperationType::Payment, debtor, Some(creditor), Some(amount));
        op.carried_from = Some(pass);
        op
    }

    /// The gross debt this operation represents, if it is an obligation:
    /// `(debtor, creditor, amount)`.
    #[must_use]
    pub fn obligation(&self) -> Option<(Address, Address, Decimal)> {
        if !self.op_type.is_obligation() {
            return None;
        }
        match (self.counterparty, self.amount) {
            (Some(creditor), Some(amount)) if amount > Decimal::ZERO && creditor != self.user => {
                Some((self.user, creditor, amount))
            }
            _ => None,
        }
    }

    /// Whether the clearing engine should net this operation right now.
    #[must_use]
    pub fn is_clearable(&self) -> bool {
        self.status == OperationStatus::Open && self.obligation().is_some()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a lifecycle transition in place.
    ///
    /// # Errors
    /// - [`TreasuryError::AlreadyClosed`] if the operation is closed (nothing changes)
    /// - [`TreasuryError::InvalidTransition`] if the move is not allowed
    pub fn apply(&mut self, transition: &Transition) -> Result<()> {
        if self.is_closed() {
            return Err(TreasuryError::AlreadyClosed(self.transfer_id));
        }
        let target = transition.target();
        if !self.status.can_transition_to(target) {
            return Err(TreasuryError::InvalidTransition {
                id: self.transfer_id,
                from: self.status,
                to: target,
            });
        }
        match transition {
            Transition::Claim { pass } => {
                self.clearing_pass = Some(*pass);
            }
            Transition::Close { transfer_code } => {
                if let Some(code) = transfer_code {
                    self.transfer_code = Some(code.clone());
                }
                self.closed_at = Some(Utc::now());
            }
        }
        self.status = target;
        Ok(())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation[{}] {} {} user={}",
            self.transfer_id,
            self.op_type,
            self.status,
            self.user.short()
        )?;
        if let Some(amount) = self.amount {
            write!(f, " amount={amount}")?;
        }
        Ok(())
    }
}

/// Dummy operations for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Operation {
    /// An open obligation of `amount` whole tokens from `debtor` to `creditor`.
    pub fn dummy_obligation(debtor: Address, creditor: Address, amount: i64) -> Self {
        Self::new(
            OperationType::Payment,
            debtor,
            Some(creditor),
            Some(Decimal::new(amount, 0)),
        )
    }

    /// An operation of the given type between random parties, dated `date`.
    pub fn dummy(op_type: OperationType, date: DateTime<Utc>) -> Self {
        let mut op = Self::new(
            op_type,
            Address::random(),
            Some(Address::random()),
            Some(Decimal::new(rand::random::<u16>().into(), 0) + Decimal::ONE),
        );
        op.date = date;
        op
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    #[test]
    fn initial_status_per_type() {
        assert_eq!(OperationType::ExchangeIn.initial_status(), OperationStatus::Open);
        assert_eq!(OperationType::FeePayment.initial_status(), OperationStatus::Open);
        assert_eq!(OperationType::Clearing.initial_status(), OperationStatus::InProgress);
    }

    #[test]
    fn status_transitions_valid() {
        assert!(OperationStatus::Open.can_transition_to(OperationStatus::InProgress));
        assert!(OperationStatus::Open.can_transition_to(OperationStatus::Closed));
        assert!(OperationStatus::InProgress.can_transition_to(OperationStatus::Closed));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!OperationStatus::InProgress.can_transition_to(OperationStatus::Open));
        assert!(!OperationStatus::Closed.can_transition_to(OperationStatus::Open));
        assert!(!OperationStatus::Closed.can_transition_to(OperationStatus::InProgress));
        assert!(!OperationStatus::Closed.can_transition_to(OperationStatus::Closed));
        assert!(!OperationStatus::Open.can_transition_to(OperationStatus::Open));
    }

    #[test]
    fn close_attaches_transfer_code() {
        let mut op = Operation::dummy_obligation(addr(1), addr(2), 10);
        op.apply(&Transition::Close {
            transfer_code: Some("ES12-3456".into()),
        })
        .unwrap();
        assert_eq!(op.status, OperationStatus::Closed);
        assert_eq!(op.transfer_code.as_deref(), Some("ES12-3456"));
        assert!(op.closed_at.is_some());
    }

    #[test]
    fn closed_is_terminal_and_unchanged() {
        let mut op = Operation::dummy_obligation(addr(1), addr(2), 10);
        op.apply(&Transition::Close {
            transfer_code: Some("first".into()),
        })
        .unwrap();
        let snapshot = op.clone();

        let err = op
            .apply(&Transition::Close {
                transfer_code: Some("second".into()),
            })
            .unwrap_err();
        assert!(matches!(err, TreasuryError::AlreadyClosed(id) if id == op.transfer_id));
        assert_eq!(op, snapshot, "closed operation must not mutate");

        let err = op.apply(&Transition::Claim { pass: PassId::new() }).unwrap_err();
        assert!(matches!(err, TreasuryError::AlreadyClosed(_)));
    }

    #[test]
    fn claim_only_from_open() {
        let mut op = Operation::dummy_obligation(addr(1), addr(2), 10);
        let pass = PassId::new();
        op.apply(&Transition::Claim { pass }).unwrap();
        assert_eq!(op.status, OperationStatus::InProgress);
        assert_eq!(op.clearing_pass, Some(pass));

        let err = op.apply(&Transition::Claim { pass }).unwrap_err();
        assert!(matches!(err, TreasuryError::InvalidTransition { .. }));
    }

    #[test]
    fn obligation_requires_counterparty_and_amount() {
        let op = Operation::dummy_obligation(addr(1), addr(2), 30);
        assert_eq!(op.obligation(), Some((addr(1), addr(2), Decimal::new(30, 0))));
        assert!(op.is_clearable());

        let exchange = Operation::new(
            OperationType::ExchangeIn,
            addr(1),
            None,
            Some(Decimal::ONE),
        );
        assert!(exchange.obligation().is_none());

        let self_debt = Operation::dummy_obligation(addr(1), addr(1), 5);
        assert!(self_debt.obligation().is_none());

        let zero = Operation::dummy_obligation(addr(1), addr(2), 0);
        assert!(zero.obligation().is_none());
    }

    #[test]
    fn clearing_constructor_is_in_progress() {
        let pass = PassId::new();
        let op = Operation::clearing(pass, addr(1), addr(3), Decimal::new(20, 0));
        assert_eq!(op.status, OperationStatus::InProgress);
        assert_eq!(op.clearing_pass, Some(pass));
        assert!(op.obligation().is_none(), "clearing ops are never re-netted");
    }

    #[test]
    fn parse_type_and_status() {
        assert_eq!("fee_payment".parse::<OperationType>().unwrap(), OperationType::FeePayment);
        assert_eq!("in_progress".parse::<OperationStatus>().unwrap(), OperationStatus::InProgress);
        assert!(matches!(
            "refund".parse::<OperationType>(),
            Err(TreasuryError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let op = Operation::dummy_obligation(addr(1), addr(2), 30);
        let json = serde_json::to_value(&op).unwrap();
        assert!(json.get("transferId").is_some());
        assert_eq!(json["type"], "payment");
        assert_eq!(json["status"], "open");
        assert!(json.get("transferCode").is_none());

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(op, back);
    }
}
