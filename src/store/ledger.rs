//! Ledger store: append-only transaction rows keyed by unique reference.

use crate::error::{LedgerError, Result};
use crate::transaction::{NewTransaction, Transaction, TxId, TxStatus};
use crate::wallet::WalletId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// A single write inside an atomic ledger batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Insert the entry unless its reference already exists.
    Insert(NewTransaction),

    /// Move a `PENDING` entry to a terminal status.
    Settle { reference: String, status: TxStatus },
}

/// Owns every ledger entry.
#[derive(Default)]
pub struct LedgerStore {
    inner: RwLock<LedgerIndex>,
}

#[derive(Default)]
struct LedgerIndex {
    rows: Vec<Transaction>,
    by_reference: HashMap<String, usize>,
    by_wallet: HashMap<WalletId, Vec<usize>>,
}

enum Planned {
    Existing(usize),
    Insert(NewTransaction),
    Settle(usize, TxStatus),
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the entry unless its reference is already present.
    ///
    /// Returns the stored entry and whether this call inserted it. An
    /// existing entry with a different payload is a `Conflict` and is never
    /// overwritten.
    pub fn insert_if_absent(&self, entry: NewTransaction) -> Result<(Transaction, bool)> {
        self.apply(vec![LedgerWrite::Insert(entry)])?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Validation("empty ledger batch".to_string()))
    }

    /// Applies a batch of writes atomically.
    ///
    /// Every write is checked against the current rows before any of them
    /// is applied, so either the whole batch lands or nothing changes. The
    /// result holds one `(entry, changed)` pair per write, in order.
    pub fn apply(&self, writes: Vec<LedgerWrite>) -> Result<Vec<(Transaction, bool)>> {
        let mut index = self.inner.write();

        let mut batch_refs = HashSet::new();
        let mut plan = Vec::with_capacity(writes.len());

        for write in writes {
            let reference = match &write {
                LedgerWrite::Insert(entry) => entry.reference.clone(),
                LedgerWrite::Settle { reference, .. } => reference.clone(),
            };
            if !batch_refs.insert(reference.clone()) {
                return Err(LedgerError::Validation(format!(
                    "reference {} appears twice in one batch",
                    reference
                )));
            }

            let step = match write {
                LedgerWrite::Insert(entry) => match index.by_reference.get(&entry.reference) {
                    Some(&pos) if index.rows[pos].same_payload(&entry) => Planned::Existing(pos),
                    Some(_) => return Err(LedgerError::Conflict(entry.reference)),
                    None => Planned::Insert(entry),
                },
                LedgerWrite::Settle { reference, status } => {
                    let pos = *index
                        .by_reference
                        .get(&reference)
                        .ok_or_else(|| LedgerError::ReferenceNotFound(reference.clone()))?;
                    let current = index.rows[pos].status;
                    if !status.is_terminal() {
                        return Err(LedgerError::Validation(format!(
                            "cannot settle {} to non-terminal status {}",
                            reference, status
                        )));
                    }
                    if current.is_terminal() {
                        return Err(LedgerError::Validation(format!(
                            "{} is already {}",
                            reference, current
                        )));
                    }
                    Planned::Settle(pos, status)
                }
            };
            plan.push(step);
        }

        let mut results = Vec::with_capacity(plan.len());
        for step in plan {
            let result = match step {
                Planned::Existing(pos) => (index.rows[pos].clone(), false),
                Planned::Insert(entry) => {
                    let pos = index.rows.len();
                    let tx = Transaction::from_new(TxId(pos as u64 + 1), entry);
                    index.by_reference.insert(tx.reference.clone(), pos);
                    index.by_wallet.entry(tx.wallet_id).or_default().push(pos);
                    index.rows.push(tx.clone());
                    (tx, true)
                }
                Planned::Settle(pos, status) => {
                    index.rows[pos].status = status;
                    (index.rows[pos].clone(), true)
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    pub fn get_by_reference(&self, reference: &str) -> Result<Transaction> {
        let index = self.inner.read();
        index
            .by_reference
            .get(reference)
            .map(|&pos| index.rows[pos].clone())
            .ok_or_else(|| LedgerError::ReferenceNotFound(reference.to_string()))
    }

    /// Entries of one wallet, newest first.
    ///
    /// Returns a finite snapshot; calling again re-reads the current rows.
    pub fn list_by_wallet(&self, wallet_id: WalletId) -> Vec<Transaction> {
        let index = self.inner.read();
        index
            .by_wallet
            .get(&wallet_id)
            .map(|positions| {
                positions
                    .iter()
                    .rev()
                    .map(|&pos| index.rows[pos].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
