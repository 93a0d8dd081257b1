//! Transaction builder: intent + chain context → unsigned descriptor.
//!
//! [`TransactionBuilder::build`] is pure. The async
//! [`TransactionBuilder::prepare`] only adds a provider lookup in front of it.

use alloy::primitives::U256;
use alloy::sol_types::SolCall;
use rust_decimal::Decimal;
use treasury_types::{
    Address, ChainConfig, ChainContext, ClearingConfig, Result, TransactionObject, TransferId,
};

use crate::contract::{self, ITreasury, evm_address, transfer_key};
use crate::context::ChainContextProvider;

/// An intended contract call, before chain state is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxIntent {
    /// Operator credits `tokens` to `user` against fiat received.
    ExchangeIn {
        transfer_id: TransferId,
        user: Address,
        tokens: Decimal,
    },
    /// `sender` redeems its balance through `marketplace`.
    ExchangeOut {
        transfer_id: TransferId,
        sender: Address,
        marketplace: Address,
    },
    /// Net settlement from `debtor` to `creditor`.
    Clearing {
        transfer_id: TransferId,
        debtor: Address,
        creditor: Address,
        amount: Decimal,
    },
    Payment {
        transfer_id: TransferId,
        sender: Address,
        beneficiary: Address,
        amount: Decimal,
    },
    /// Record the fiat bank reference of a settled transfer.
    SetPaid {
        transfer_id: TransferId,
        sender: Address,
        transfer_code: String,
    },
    FeePayment {
        transfer_id: TransferId,
        sender: Address,
        marketplace: Address,
        fee: Decimal,
    },
}

impl TxIntent {
    /// Solidity signature of the contract function this intent calls.
    #[must_use]
    pub fn signature(&self) -> &'static str {
        match self {
            Self::ExchangeIn { .. } => ITreasury::exchangeInCall::SIGNATURE,
            Self::ExchangeOut { .. } => ITreasury::exchangeOutCall::SIGNATURE,
            Self::Clearing { .. } => ITreasury::clearingCall::SIGNATURE,
            Self::Payment { .. } => ITreasury::paymentCall::SIGNATURE,
            Self::SetPaid { .. } => ITreasury::setPaidCall::SIGNATURE,
            Self::FeePayment { .. } => ITreasury::feePaymentCall::SIGNATURE,
        }
    }

    /// 4-byte function selector of [`Self::signature`].
    #[must_use]
    pub fn selector(&self) -> [u8; 4] {
        match self {
            Self::ExchangeIn { .. } => ITreasury::exchangeInCall::SELECTOR,
            Self::ExchangeOut { .. } => ITreasury::exchangeOutCall::SELECTOR,
            Self::Clearing { .. } => ITreasury::clearingCall::SELECTOR,
            Self::Payment { .. } => ITreasury::paymentCall::SELECTOR,
            Self::SetPaid { .. } => ITreasury::setPaidCall::SELECTOR,
            Self::FeePayment { .. } => ITreasury::feePaymentCall::SELECTOR,
        }
    }

    #[must_use]
    pub fn transfer_id(&self) -> TransferId {
        match self {
            Self::ExchangeIn { transfer_id, .. }
            | Self::ExchangeOut { transfer_id, .. }
            | Self::Clearing { transfer_id, .. }
            | Self::Payment { transfer_id, .. }
            | Self::SetPaid { transfer_id, .. }
            | Self::FeePayment { transfer_id, .. } => *transfer_id,
        }
    }
}

/// Builds [`TransactionObject`]s against one treasury contract.
#[derive(Debug, Clone, Copy)]
pub struct TransactionBuilder {
    contract: Address,
    operator: Address,
    token_decimals: u32,
}

impl TransactionBuilder {
    #[must_use]
    pub fn new(chain: &ChainConfig, clearing: &ClearingConfig) -> Self {
        Self {
            contract: chain.treasury_contract,
            operator: chain.operator_address,
            token_decimals: clearing.token_decimals,
        }
    }

    #[must_use]
    pub fn contract(&self) -> Address {
        self.contract
    }

    #[must_use]
    pub fn token_decimals(&self) -> u32 {
        self.token_decimals
    }

    /// Account the descriptor for `intent` is sent from.
    ///
    /// Exchange-in is minted by the treasury operator; every other call is
    /// sent by the marketplace that owes or acts.
    #[must_use]
    pub fn sender(&self, intent: &TxIntent) -> Address {
        match intent {
            TxIntent::ExchangeIn { .. } => self.operator,
            TxIntent::ExchangeOut { sender, .. }
            | TxIntent::Payment { sender, .. }
            | TxIntent::SetPaid { sender, .. }
            | TxIntent::FeePayment { sender, .. } => *sender,
            TxIntent::Clearing { debtor, .. } => *debtor,
        }
    }

    /// ABI calldata for `intent`.
    ///
    /// # Errors
    /// [`TreasuryError::Encoding`](treasury_types::TreasuryError::Encoding)
    /// for amounts that cannot be expressed in base units.
    pub fn calldata(&self, intent: &TxIntent) -> Result<Vec<u8>> {
        let transfer_id = transfer_key(intent.transfer_id());
        let data = match intent {
            TxIntent::ExchangeIn { user, tokens, .. } => ITreasury::exchangeInCall {
                transferId: transfer_id,
                user: evm_address(user),
                tokens: self.amount(*tokens)?,
            }
            .abi_encode(),
            TxIntent::ExchangeOut { marketplace, .. } => ITreasury::exchangeOutCall {
                transferId: transfer_id,
                marketplace: evm_address(marketplace),
            }
            .abi_encode(),
            TxIntent::Clearing {
                creditor, amount, ..
            } => ITreasury::clearingCall {
                transferId: transfer_id,
                creditor: evm_address(creditor),
                amount: self.amount(*amount)?,
            }
            .abi_encode(),
            TxIntent::Payment {
                beneficiary,
                amount,
                ..
            } => ITreasury::paymentCall {
                transferId: transfer_id,
                beneficiary: evm_address(beneficiary),
                amount: self.amount(*amount)?,
            }
            .abi_encode(),
            TxIntent::SetPaid { transfer_code, .. } => ITreasury::setPaidCall {
                transferId: transfer_id,
                transferCode: transfer_code.clone(),
            }
            .abi_encode(),
            TxIntent::FeePayment {
                marketplace, fee, ..
            } => ITreasury::feePaymentCall {
                transferId: transfer_id,
                marketplace: evm_address(marketplace),
                fee: self.amount(*fee)?,
            }
            .abi_encode(),
        };
        Ok(data)
    }

    fn amount(&self, amount: Decimal) -> Result<U256> {
        contract::to_base_units(amount, self.token_decimals)
    }

    /// Assemble the descriptor. No I/O, no shared state.
    ///
    /// # Errors
    /// Propagates [`Self::calldata`] errors.
    pub fn build(&self, intent: &TxIntent, ctx: &ChainContext) -> Result<TransactionObject> {
        let data = self.calldata(intent)?;
        Ok(TransactionObject {
            chain_id: ctx.chain_id,
            nonce: ctx.nonce,
            gas_limit: ctx.gas.gas_limit,
            gas_price: ctx.gas.gas_price,
            to: self.contract,
            from: self.sender(intent),
            data: contract::to_hex(&data),
        })
    }

    /// Look up chain context for the sender, then [`Self::build`].
    ///
    /// # Errors
    /// [`TreasuryError::ChainContext`](treasury_types::TreasuryError::ChainContext)
    /// from the provider, or encoding errors.
    pub async fn prepare(
        &self,
        provider: &dyn ChainContextProvider,
        intent: &TxIntent,
    ) -> Result<TransactionObject> {
        let ctx = provider.context_for(&self.sender(intent)).await?;
        let tx = self.build(intent, &ctx)?;
        tracing::debug!(
            transfer_id = %intent.transfer_id(),
            from = %tx.from,
            nonce = tx.nonce,
            selector = tx.selector().unwrap_or_default(),
            "transaction descriptor built"
        );
        Ok(tx)
    }
}
