//! Multilateral netting.
//!
//! Gross obligations collapse into one signed position per marketplace
//! (receivable minus payable). Creditors and debtors are then matched
//! greedily, largest against largest, until every position is zero.
//!
//! Equal balances are ordered by address ascending, so the same input
//! always yields the same transfers in the same order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use treasury_types::{Address, Result, TreasuryError};

/// A directed payment between two marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetTransfer {
    pub debtor: Address,
    pub creditor: Address,
    pub amount: Decimal,
}

/// Output of [`settle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NettingResult {
    /// Transfers to materialize, each truncated to the token precision.
    pub transfers: Vec<NetTransfer>,
    /// Amounts that could not be emitted this pass: truncation residue and
    /// transfers below the minimum. Carried forward as new obligations.
    pub remainders: Vec<NetTransfer>,
}

impl NettingResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Sum of emitted transfer amounts, `None` if it exceeds [`Decimal::MAX`].
    #[must_use]
    pub fn settled_volume(&self) -> Option<Decimal> {
        self.transfers
            .iter()
            .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.amount))
    }
}

/// Signed position per marketplace: positive is owed money, negative owes.
///
/// Zero positions are dropped.
///
/// # Errors
/// [`TreasuryError::Encoding`] if a position leaves the [`Decimal`] range.
pub fn net_positions<I>(obligations: I) -> Result<BTreeMap<Address, Decimal>>
where
    I: IntoIterator<Item = (Address, Address, Decimal)>,
{
    let mut positions: BTreeMap<Address, Decimal> = BTreeMap::new();
    for (debtor, creditor, amount) in obligations {
        let payable = positions.entry(debtor).or_default();
        *payable = payable
            .checked_sub(amount)
            .ok_or_else(|| overflow(debtor))?;
        let receivable = positions.entry(creditor).or_default();
        *receivable = receivable
            .checked_add(amount)
            .ok_or_else(|| overflow(creditor))?;
    }
    positions.retain(|_, v| !v.is_zero());
    Ok(positions)
}

fn overflow(address: Address) -> TreasuryError {
    TreasuryError::Encoding {
        reason: format!("net position of {address} overflows"),
    }
}

/// Largest magnitude first, then address ascending.
fn by_magnitude(a: &(Address, Decimal), b: &(Address, Decimal)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Match creditors against debtors.
///
/// Every matched amount is truncated to `token_decimals`; the residue is
/// returned as a remainder for the same pair. A truncated amount that is
/// zero or below `min_transfer` is carried in full.
#[must_use]
pub fn settle(
    positions: &BTreeMap<Address, Decimal>,
    token_decimals: u32,
    min_transfer: Decimal,
) -> NettingResult {
    let mut creditors: Vec<(Address, Decimal)> = Vec::new();
    let mut debtors: Vec<(Address, Decimal)> = Vec::new();
    for (addr, position) in positions {
        if position.is_sign_positive() && !position.is_zero() {
            creditors.push((*addr, *position));
        } else if position.is_sign_negative() && !position.is_zero() {
            debtors.push((*addr, -*position));
        }
    }
    creditors.sort_by(by_magnitude);
    debtors.sort_by(by_magnitude);

    let mut result = NettingResult::default();
    let (mut ci, mut di) = (0, 0);
    while ci < creditors.len() && di < debtors.len() {
        let matched = creditors[ci].1.min(debtors[di].1);
        let (creditor, debtor) = (creditors[ci].0, debtors[di].0);

        let emitted = matched.round_dp_with_strategy(token_decimals, RoundingStrategy::ToZero);
        if emitted.is_zero() || emitted < min_transfer {
            result.remainders.push(NetTransfer {
                debtor,
                creditor,
                amount: matched,
            });
        } else {
            result.transfers.push(NetTransfer {
                debtor,
                creditor,
                amount: emitted,
            });
            let residue = matched - emitted;
            if !residue.is_zero() {
                result.remainders.push(NetTransfer {
                    debtor,
                    creditor,
                    amount: residue,
                });
            }
        }

        creditors[ci].1 -= matched;
        debtors[di].1 -= matched;
        if creditors[ci].1.is_zero() {
            ci += 1;
        }
        if debtors[di].1.is_zero() {
            di += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: u8) -> Address {
        Address([n; 20])
    }

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn positions_are_zero_sum() {
        let pos = net_positions([(a(1), a(2), d(30)), (a(2), a(3), d(30)), (a(3), a(1), d(10))]).unwrap();
        assert_eq!(pos[&a(1)], d(-20));
        assert!(!pos.contains_key(&a(2)), "B nets to zero");
        assert_eq!(pos[&a(3)], d(20));
        assert_eq!(pos.values().copied().sum::<Decimal>(), Decimal::ZERO);
    }

    #[test]
    fn triangle_collapses_to_one_transfer() {
        let pos = net_positions([(a(1), a(2), d(30)), (a(2), a(3), d(30)), (a(3), a(1), d(10))]).unwrap();
        let result = settle(&pos, 2, Decimal::ZERO);
        assert_eq!(
            result.transfers,
            vec![NetTransfer {
                debtor: a(1),
                creditor: a(3),
                amount: d(20)
            }]
        );
        assert!(result.remainders.is_empty());
    }

    #[test]
    fn perfect_cycle_needs_no_transfer() {
        let pos = net_positions([(a(1), a(2), d(10)), (a(2), a(1), d(10))]).unwrap();
        assert!(pos.is_empty());
        assert!(settle(&pos, 2, Decimal::ZERO).is_empty());
    }

    #[test]
    fn largest_matched_first() {
        // creditors: 4:+50, 5:+10 ; debtors: 1:-40, 2:-20
        let pos = net_positions([(a(1), a(4), d(40)), (a(2), a(4), d(10)), (a(2), a(5), d(10))]).unwrap();
        let result = settle(&pos, 2, Decimal::ZERO);
        assert_eq!(result.transfers[0].debtor, a(1));
        assert_eq!(result.transfers[0].creditor, a(4));
        assert_eq!(result.transfers[0].amount, d(40));
        assert_eq!(result.transfers.len(), 3);
        assert_eq!(result.settled_volume(), Some(d(60)));
    }

    #[test]
    fn ties_break_on_address() {
        let pos = net_positions([(a(9), a(7), d(10)), (a(8), a(6), d(10))]).unwrap();
        let result = settle(&pos, 2, Decimal::ZERO);
        assert_eq!(result.transfers[0].debtor, a(8));
        assert_eq!(result.transfers[0].creditor, a(6));
        assert_eq!(result.transfers[1].debtor, a(9));
        assert_eq!(result.transfers[1].creditor, a(7));
    }

    #[test]
    fn residue_is_carried() {
        let pos = net_positions([(a(1), a(2), Decimal::new(10_005, 3))]).unwrap();
        let result = settle(&pos, 2, Decimal::ZERO);
        assert_eq!(result.transfers[0].amount, Decimal::new(1000, 2));
        assert_eq!(
            result.remainders,
            vec![NetTransfer {
                debtor: a(1),
                creditor: a(2),
                amount: Decimal::new(5, 3)
            }]
        );
    }

    #[test]
    fn dust_only_pass_emits_nothing() {
        let pos = net_positions([(a(1), a(2), Decimal::new(4, 3))]).unwrap();
        let result = settle(&pos, 2, Decimal::ZERO);
        assert!(result.is_empty());
        assert_eq!(result.remainders.len(), 1);
    }

    #[test]
    fn overflowing_position_is_an_error() {
        let err = net_positions([(a(1), a(3), Decimal::MAX), (a(2), a(3), Decimal::MAX)]).unwrap_err();
        assert!(matches!(err, TreasuryError::Encoding { .. }));
        // Opposite directions still fit.
        let pos = net_positions([(a(1), a(2), Decimal::MAX), (a(2), a(1), Decimal::MAX)]).unwrap();
        assert!(pos.is_empty());
    }

    #[test]
    fn settled_volume_reports_overflow() {
        let result = NettingResult {
            transfers: vec![
                NetTransfer {
                    debtor: a(1),
                    creditor: a(3),
                    amount: Decimal::MAX,
                },
                NetTransfer {
                    debtor: a(2),
                    creditor: a(4),
                    amount: Decimal::MAX,
                },
            ],
            remainders: Vec::new(),
        };
        assert_eq!(result.settled_volume(), None);
    }

    #[test]
    fn below_minimum_is_carried_whole() {
        let pos = net_positions([(a(1), a(3), d(100)), (a(2), a(3), d(5))]).unwrap();
        let result = settle(&pos, 2, d(10));
        assert_eq!(result.transfers.len(), 1);
        assert_eq!(result.transfers[0].amount, d(100));
        assert_eq!(result.remainders[0].amount, d(5));
        assert_eq!(result.remainders[0].debtor, a(2));
    }
}
