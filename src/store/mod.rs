//! In-process storage for wallets and ledger entries.

pub mod ledger;
pub mod wallets;

pub use ledger::{LedgerStore, LedgerWrite};
pub use wallets::{WalletHandle, WalletStore};
