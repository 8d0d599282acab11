//! Wallet store: identity indexes plus one lockable slot per wallet.
//!
//! The index lock is only held to resolve identities or register wallets,
//! never while waiting on a wallet slot.

use crate::error::{LedgerError, Result};
use crate::wallet::{AccountId, Wallet, WalletId};
use log::{debug, info};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Owns every wallet record.
pub struct WalletStore {
    index: RwLock<WalletIndex>,
    lock_timeout: Duration,
}

#[derive(Default)]
struct WalletIndex {
    slots: HashMap<WalletId, Arc<Mutex<Wallet>>>,
    by_account: HashMap<AccountId, WalletId>,
    by_number: HashMap<String, WalletId>,
    next_id: u64,
}

/// A resolved wallet slot that can be locked for update.
#[derive(Clone)]
pub struct WalletHandle {
    id: WalletId,
    slot: Arc<Mutex<Wallet>>,
    timeout: Duration,
}

impl WalletHandle {
    pub fn id(&self) -> WalletId {
        self.id
    }

    /// Acquires the exclusive lock on this wallet.
    ///
    /// Blocks other lockers until the guard is dropped. Fails with
    /// `LockTimeout` if the lock is not acquired within the store's timeout.
    pub fn lock_for_update(&self) -> Result<MutexGuard<'_, Wallet>> {
        self.slot
            .try_lock_for(self.timeout)
            .ok_or(LedgerError::LockTimeout(self.id))
    }

    /// Reads a consistent copy of the wallet.
    ///
    /// Waits for any unit of work holding the wallet to finish, so the copy
    /// never reflects a partially applied operation.
    pub fn snapshot(&self) -> Result<Wallet> {
        Ok(self.lock_for_update()?.clone())
    }
}

impl WalletStore {
    pub fn new(lock_timeout: Duration) -> Self {
        WalletStore {
            index: RwLock::new(WalletIndex::default()),
            lock_timeout,
        }
    }

    /// Creates the wallet for an account.
    ///
    /// Idempotent per account: a second call returns the existing wallet.
    /// When `wallet_number` is `None` a random unused number is generated.
    pub fn create(&self, account: AccountId, wallet_number: Option<&str>) -> Result<Wallet> {
        let existing = {
            let mut index = self.index.write();

            match index.by_account.get(&account).copied() {
                Some(id) => index.handle(id, self.lock_timeout)?,
                None => {
                    let number = match wallet_number {
                        Some(number) => {
                            if !Wallet::is_valid_number(number) {
                                return Err(LedgerError::Validation(format!(
                                    "wallet number {:?} must be {} digits",
                                    number,
                                    Wallet::NUMBER_LEN
                                )));
                            }
                            if index.by_number.contains_key(number) {
                                return Err(LedgerError::Validation(format!(
                                    "wallet number {} is already taken",
                                    number
                                )));
                            }
                            number.to_string()
                        }
                        None => index.unused_number(),
                    };

                    index.next_id += 1;
                    let id = WalletId(index.next_id);
                    let wallet = Wallet::new(id, account, number.clone());

                    index.slots.insert(id, Arc::new(Mutex::new(wallet.clone())));
                    index.by_account.insert(account, id);
                    index.by_number.insert(number, id);

                    info!(
                        "Opened wallet {} ({}) for account {}",
                        id, wallet.wallet_number, account
                    );
                    return Ok(wallet);
                }
            }
        };

        let wallet = existing.snapshot()?;
        if let Some(number) = wallet_number {
            if number != wallet.wallet_number {
                return Err(LedgerError::Validation(format!(
                    "account {} already owns wallet {}",
                    account, wallet.wallet_number
                )));
            }
        }
        debug!("Account {} already has wallet {}", account, wallet.id);
        Ok(wallet)
    }

    /// Resolves an account's wallet id without touching the wallet lock.
    pub fn wallet_id_for_account(&self, account: AccountId) -> Result<WalletId> {
        self.index
            .read()
            .by_account
            .get(&account)
            .copied()
            .ok_or(LedgerError::AccountNotFound(account))
    }

    /// Resolves a wallet number to its id without touching the wallet lock.
    pub fn wallet_id_for_number(&self, number: &str) -> Result<WalletId> {
        self.index
            .read()
            .by_number
            .get(number.trim())
            .copied()
            .ok_or_else(|| LedgerError::WalletNotFound(number.to_string()))
    }

    pub fn get_by_account_id(&self, account: AccountId) -> Result<Wallet> {
        let id = self.wallet_id_for_account(account)?;
        self.handle(id)?.snapshot()
    }

    pub fn get_by_wallet_number(&self, number: &str) -> Result<Wallet> {
        let id = self.wallet_id_for_number(number)?;
        self.handle(id)?.snapshot()
    }

    pub fn get_by_id(&self, id: WalletId) -> Result<Wallet> {
        self.handle(id)?.snapshot()
    }

    /// Resolves the lockable slot of a wallet.
    pub fn handle(&self, id: WalletId) -> Result<WalletHandle> {
        self.index.read().handle(id, self.lock_timeout)
    }

    /// Resolves several wallets in ascending id order, duplicates removed.
    ///
    /// Every multi-wallet lock acquisition goes through this order, which
    /// rules out lock cycles between units of work.
    pub fn handles_ordered(&self, ids: &[WalletId]) -> Result<Vec<WalletHandle>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let index = self.index.read();
        ids.into_iter()
            .map(|id| index.handle(id, self.lock_timeout))
            .collect()
    }

    /// Snapshots every wallet, sorted by account id.
    pub fn list(&self) -> Result<Vec<Wallet>> {
        let handles: Vec<WalletHandle> = {
            let index = self.index.read();
            let mut accounts: Vec<_> = index.by_account.iter().collect();
            accounts.sort_by_key(|(account, _)| **account);
            accounts
                .into_iter()
                .map(|(_, id)| index.handle(*id, self.lock_timeout))
                .collect::<Result<_>>()?
        };

        handles.iter().map(WalletHandle::snapshot).collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalletIndex {
    fn handle(&self, id: WalletId, timeout: Duration) -> Result<WalletHandle> {
        self.slots
            .get(&id)
            .map(|slot| WalletHandle {
                id,
                slot: Arc::clone(slot),
                timeout,
            })
            .ok_or_else(|| LedgerError::WalletNotFound(id.to_string()))
    }

    fn unused_number(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen_range(1_000_000_000u64..10_000_000_000u64).to_string();
            if !self.by_number.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}
