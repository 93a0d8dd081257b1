//! The treasury contract interface.
//!
//! Calls are declared once with `sol!`; calldata comes from the generated
//! call structs. This module only converts ledger values into their EVM
//! counterparts.

use alloy::primitives::{Address as EvmAddress, FixedBytes, U256};
use alloy::sol;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use treasury_types::{Address, Result, TransferId, TreasuryError};

sol! {
    interface ITreasury {
        function exchangeIn(bytes16 transferId, address user, uint256 tokens) external;
        function exchangeOut(bytes16 transferId, address marketplace) external;
        function clearing(bytes16 transferId, address creditor, uint256 amount) external;
        function payment(bytes16 transferId, address beneficiary, uint256 amount) external;
        function setPaid(bytes16 transferId, string calldata transferCode) external;
        function feePayment(bytes16 transferId, address marketplace, uint256 fee) external;
    }
}

#[must_use]
pub fn evm_address(address: &Address) -> EvmAddress {
    EvmAddress::from(*address.as_bytes())
}

/// Transfer id as the contract's `bytes16` key.
#[must_use]
pub fn transfer_key(id: TransferId) -> FixedBytes<16> {
    FixedBytes::from(*id.as_bytes())
}

/// `0x`-prefixed lowercase hex.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Convert a token amount to integer base units: `amount * 10^decimals`.
///
/// # Errors
/// [`TreasuryError::Encoding`] if the amount is negative, has more
/// precision than `decimals`, or overflows.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(TreasuryError::Encoding {
            reason: format!("negative amount {amount}"),
        });
    }
    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| TreasuryError::Encoding {
            reason: format!("token decimals {decimals} out of range"),
        })?;
    let scaled = amount
        .checked_mul(factor)
        .ok_or_else(|| TreasuryError::Encoding {
            reason: format!("amount {amount} overflows at {decimals} decimals"),
        })?;
    if !scaled.fract().is_zero() {
        return Err(TreasuryError::Encoding {
            reason: format!("amount {amount} is finer than {decimals} decimals"),
        });
    }
    scaled
        .trunc()
        .to_u128()
        .map(U256::from)
        .ok_or_else(|| TreasuryError::Encoding {
            reason: format!("amount {amount} has no base-unit representation"),
        })
}
