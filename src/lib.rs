//! # Wallet Ledger
//!
//! Moves money between account wallets and records every balance change as
//! an immutable, uniquely referenced ledger entry.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: 2 decimal places via `rust_decimal`
//! - **Atomic units of work**: wallet locks taken in ascending id order,
//!   changes staged and committed all-or-nothing
//! - **Idempotent references**: a reference is applied at most once; replays
//!   return the existing entry
//! - **Bounded waiting**: lock acquisition times out with a retryable error
//!
//! ## Example
//!
//! ```
//! use std::str::FromStr;
//! use wallet_ledger::{AccountId, DepositOutcome, EngineConfig, Money, WalletEngine};
//!
//! let engine = WalletEngine::new(EngineConfig::default());
//! engine.open_wallet(AccountId(1), Some("1000000001")).unwrap();
//! engine.open_wallet(AccountId(2), Some("1000000002")).unwrap();
//!
//! let amount = Money::from_str("75.00").unwrap();
//! let handoff = engine.initiate_deposit(AccountId(1), amount).unwrap();
//! engine
//!     .apply_confirmation(&handoff.reference, amount, DepositOutcome::Success)
//!     .unwrap();
//!
//! engine
//!     .transfer(AccountId(1), "1000000002", Money::from_str("25").unwrap())
//!     .unwrap();
//! assert_eq!(engine.balance(AccountId(1)).unwrap().to_string(), "50.00");
//! ```

pub mod config;
pub mod deposit;
pub mod engine;
pub mod error;
pub mod money;
pub mod recorder;
pub mod script;
pub mod store;
pub mod transaction;
pub mod transfer;
pub mod unit_of_work;
pub mod wallet;

pub use config::EngineConfig;
pub use deposit::{DepositOutcome, DepositReconciler, GatewayHandoff, HostedCheckout, PaymentGateway};
pub use engine::WalletEngine;
pub use error::{LedgerError, Result};
pub use money::Money;
pub use recorder::TransactionRecorder;
pub use store::{LedgerStore, WalletStore};
pub use transaction::{Transaction, TxStatus, TxType};
pub use transfer::{TransferEngine, TransferResult};
pub use wallet::{AccountId, Wallet, WalletId};
