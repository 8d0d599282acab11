//! Atomic unit of work over locked wallets and staged ledger writes.
//!
//! Wallet locks are taken in ascending id order before any work runs.
//! Balance changes and ledger writes are staged on private copies and only
//! become visible at commit, while the locks are still held. Returning an
//! error (or unwinding) drops the staged state, which is the rollback.

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::recorder::TransactionRecorder;
use crate::store::{LedgerStore, LedgerWrite, WalletStore};
use crate::transaction::{NewTransaction, Transaction, TxStatus};
use crate::wallet::{Wallet, WalletId};
use parking_lot::MutexGuard;

/// Staged changes against a set of exclusively locked wallets.
pub struct UnitOfWork<'a> {
    guards: Vec<MutexGuard<'a, Wallet>>,
    staged: Vec<Wallet>,
    writes: Vec<LedgerWrite>,
}

impl<'a> UnitOfWork<'a> {
    fn new(guards: Vec<MutexGuard<'a, Wallet>>) -> Self {
        let staged = guards.iter().map(|guard| (**guard).clone()).collect();
        UnitOfWork {
            guards,
            staged,
            writes: Vec::new(),
        }
    }

    fn position(&self, id: WalletId) -> Result<usize> {
        self.staged
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| {
                LedgerError::Validation(format!("wallet {} is not locked in this unit of work", id))
            })
    }

    /// The locked wallet, including changes staged so far.
    pub fn wallet(&self, id: WalletId) -> Result<&Wallet> {
        let pos = self.position(id)?;
        Ok(&self.staged[pos])
    }

    /// Replaces the balance of a locked wallet.
    pub fn update_balance(&mut self, id: WalletId, new_balance: Money) -> Result<()> {
        if new_balance < Money::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "wallet {} balance cannot become {}",
                id, new_balance
            )));
        }
        let pos = self.position(id)?;
        self.staged[pos].balance = new_balance;
        Ok(())
    }

    /// Debits a locked wallet, returning the new balance.
    pub fn debit(&mut self, id: WalletId, amount: Money) -> Result<Money> {
        let pos = self.position(id)?;
        let wallet = &mut self.staged[pos];
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }
        if !wallet.debit(amount) {
            return Err(LedgerError::InsufficientFunds {
                balance: wallet.balance,
                requested: amount,
            });
        }
        Ok(wallet.balance)
    }

    /// Credits a locked wallet, returning the new balance.
    pub fn credit(&mut self, id: WalletId, amount: Money) -> Result<Money> {
        let pos = self.position(id)?;
        let wallet = &mut self.staged[pos];
        if !wallet.credit(amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "cannot credit {} to wallet {}",
                amount, id
            )));
        }
        Ok(wallet.balance)
    }

    /// Stages a validated ledger insert.
    pub fn record(&mut self, entry: NewTransaction) -> Result<()> {
        TransactionRecorder::validate(&entry)?;
        self.position(entry.wallet_id)?;
        self.writes.push(LedgerWrite::Insert(entry));
        Ok(())
    }

    /// Stages a `PENDING` to terminal transition.
    pub fn settle(&mut self, reference: &str, status: TxStatus) {
        self.writes.push(LedgerWrite::Settle {
            reference: reference.to_string(),
            status,
        });
    }

    /// Publishes staged ledger writes, then staged balances.
    ///
    /// The ledger batch is the only step that can fail; balances are written
    /// afterwards, so a rejected batch leaves every wallet untouched.
    fn commit(mut self, ledger: &LedgerStore) -> Result<Vec<Transaction>> {
        if let Some(broken) = self.staged.iter().find(|w| !w.check_invariant()) {
            return Err(LedgerError::Validation(format!(
                "wallet {} would commit negative balance {}",
                broken.id, broken.balance
            )));
        }

        let committed = ledger.apply(std::mem::take(&mut self.writes))?;

        for (guard, wallet) in self.guards.iter_mut().zip(self.staged.drain(..)) {
            **guard = wallet;
        }

        Ok(committed.into_iter().map(|(tx, _)| tx).collect())
    }
}

/// Runs `work` inside one unit of work over the given wallets.
///
/// Returns the closure's value together with the ledger entries committed
/// by the unit of work, in staging order. Locks are released on return.
pub fn execute<T, F>(
    wallets: &WalletStore,
    ledger: &LedgerStore,
    ids: &[WalletId],
    work: F,
) -> Result<(T, Vec<Transaction>)>
where
    F: FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
{
    let handles = wallets.handles_ordered(ids)?;

    let mut guards = Vec::with_capacity(handles.len());
    for handle in &handles {
        guards.push(handle.lock_for_update()?);
    }

    let mut uow = UnitOfWork::new(guards);
    let value = work(&mut uow)?;
    let committed = uow.commit(ledger)?;

    Ok((value, committed))
}
