//! Transaction recorder: validates ledger entries before they reach storage.

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::store::LedgerStore;
use crate::transaction::{NewTransaction, Transaction, TxStatus, TxType};
use crate::wallet::WalletId;
use log::debug;
use std::sync::Arc;

/// Shapes and validates ledger entries, delegating storage to the ledger store.
#[derive(Clone)]
pub struct TransactionRecorder {
    ledger: Arc<LedgerStore>,
}

impl TransactionRecorder {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        TransactionRecorder { ledger }
    }

    /// Checks the shape of an entry.
    ///
    /// - amount must be positive
    /// - transfers carry a counterparty distinct from the owning wallet and
    ///   are only ever recorded as `SUCCESS`
    /// - deposits never carry a counterparty
    pub fn validate(entry: &NewTransaction) -> Result<()> {
        if entry.reference.trim().is_empty() {
            return Err(LedgerError::Validation("reference must not be empty".to_string()));
        }

        if !entry.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "ledger amount must be positive, got {}",
                entry.amount
            )));
        }

        match (entry.kind, entry.counterparty) {
            (TxType::Deposit, Some(other)) => Err(LedgerError::Validation(format!(
                "deposit {} must not reference counterparty wallet {}",
                entry.reference, other
            ))),
            (kind, None) if kind.is_transfer() => Err(LedgerError::Validation(format!(
                "{} {} requires a counterparty wallet",
                kind, entry.reference
            ))),
            (kind, Some(other)) if kind.is_transfer() && other == entry.wallet_id => {
                Err(LedgerError::Validation(format!(
                    "{} {} cannot reference its own wallet",
                    kind, entry.reference
                )))
            }
            (kind, _) if kind.is_transfer() && entry.status != TxStatus::Success => {
                Err(LedgerError::Validation(format!(
                    "{} {} must be recorded as SUCCESS, got {}",
                    kind, entry.reference, entry.status
                )))
            }
            _ => Ok(()),
        }
    }

    /// Validates and stores an entry, returning the stored row.
    ///
    /// Recording a reference that already exists with the same payload
    /// returns the existing row unchanged.
    pub fn record(
        &self,
        reference: &str,
        wallet_id: WalletId,
        kind: TxType,
        amount: Money,
        status: TxStatus,
        counterparty: Option<WalletId>,
    ) -> Result<Transaction> {
        let entry = NewTransaction {
            reference: reference.to_string(),
            wallet_id,
            kind,
            amount,
            status,
            counterparty,
        };
        self.record_entry(entry).map(|(tx, _)| tx)
    }

    /// Validates and stores an entry, also reporting whether it was new.
    pub fn record_entry(&self, entry: NewTransaction) -> Result<(Transaction, bool)> {
        Self::validate(&entry)?;
        let (tx, inserted) = self.ledger.insert_if_absent(entry)?;
        if inserted {
            debug!(
                "Recorded {} {} for wallet {}: {} ({})",
                tx.kind, tx.reference, tx.wallet_id, tx.amount, tx.status
            );
        } else {
            debug!("Reference {} already recorded, returning existing entry", tx.reference);
        }
        Ok((tx, inserted))
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }
}
