//! Wallet-to-wallet transfers.
//!
//! A transfer debits the sender, credits the recipient and writes the two
//! linked ledger legs inside one unit of work. Either all four effects are
//! committed or none are.

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::store::{LedgerStore, WalletStore};
use crate::transaction::{NewTransaction, Transaction, TransferReference, TxStatus, TxType};
use crate::unit_of_work;
use crate::wallet::AccountId;
use log::{debug, info};
use std::sync::Arc;

/// Outcome of a committed transfer.
#[derive(Debug, Clone)]
pub struct TransferResult {
    /// Reference family; the legs are `<reference>_OUT` and `<reference>_IN`.
    pub reference: String,

    /// `TRANSFER_OUT` entry on the sender's wallet.
    pub debit: Transaction,

    /// `TRANSFER_IN` entry on the recipient's wallet.
    pub credit: Transaction,

    pub sender_balance: Money,
    pub recipient_balance: Money,
}

/// Orchestrates atomic two-wallet transfers.
pub struct TransferEngine {
    wallets: Arc<WalletStore>,
    ledger: Arc<LedgerStore>,
}

impl TransferEngine {
    pub fn new(wallets: Arc<WalletStore>, ledger: Arc<LedgerStore>) -> Self {
        TransferEngine { wallets, ledger }
    }

    /// Moves `amount` from the sender account's wallet to the wallet with
    /// number `recipient_number`.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount <= 0`
    /// - `AccountNotFound` / `WalletNotFound` if either side is unknown
    /// - `SelfTransfer` if both sides are the same wallet
    /// - `InsufficientFunds` if the sender balance, read under lock, is short
    /// - `LockTimeout` if either wallet stays locked past the timeout
    pub fn transfer(
        &self,
        sender: AccountId,
        recipient_number: &str,
        amount: Money,
    ) -> Result<TransferResult> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "transfer amount must be positive, got {}",
                amount
            )));
        }

        // Identity lookups only; balances are read under lock below.
        let from = self.wallets.wallet_id_for_account(sender)?;
        let to = self.wallets.wallet_id_for_number(recipient_number)?;
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }

        let ((family, sender_balance, recipient_balance), committed) =
            unit_of_work::execute(&self.wallets, &self.ledger, &[from, to], |uow| {
                let sender_balance = uow.debit(from, amount)?;
                let family = TransferReference::generate();

                uow.record(NewTransaction {
                    reference: family.debit_leg(),
                    wallet_id: from,
                    kind: TxType::TransferOut,
                    amount,
                    status: TxStatus::Success,
                    counterparty: Some(to),
                })?;

                let recipient_balance = uow.credit(to, amount)?;
                uow.record(NewTransaction {
                    reference: family.credit_leg(),
                    wallet_id: to,
                    kind: TxType::TransferIn,
                    amount,
                    status: TxStatus::Success,
                    counterparty: Some(from),
                })?;

                Ok((family, sender_balance, recipient_balance))
            })
            .map_err(|e| {
                debug!("Transfer of {} from wallet {} to {} rolled back: {}", amount, from, to, e);
                e
            })?;

        let mut legs = committed.into_iter();
        let (debit, credit) = match (legs.next(), legs.next()) {
            (Some(debit), Some(credit)) => (debit, credit),
            _ => {
                return Err(LedgerError::Validation(format!(
                    "transfer {} committed without both legs",
                    family
                )))
            }
        };

        info!(
            "Transfer {}: {} from wallet {} to wallet {}",
            family, amount, from, to
        );

        Ok(TransferResult {
            reference: family.as_str().to_string(),
            debit,
            credit,
            sender_balance,
            recipient_balance,
        })
    }
}
