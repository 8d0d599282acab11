//! Ledger entry models and reference generation.

use crate::money::Money;
use crate::wallet::WalletId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use ulid::Ulid;

/// Internal ledger row identifier, assigned in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TxId(pub u64);

/// Kind of balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    /// Funds arriving from the payment gateway.
    Deposit,

    /// Debit side of an internal transfer.
    TransferOut,

    /// Credit side of an internal transfer.
    TransferIn,
}

impl TxType {
    pub fn is_transfer(&self) -> bool {
        matches!(self, TxType::TransferOut | TxType::TransferIn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "DEPOSIT",
            TxType::TransferOut => "TRANSFER_OUT",
            TxType::TransferIn => "TRANSFER_IN",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a ledger entry.
///
/// `Success` and `Failed` are terminal; only `Pending` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub reference: String,
    pub wallet_id: WalletId,
    pub kind: TxType,
    pub amount: Money,
    pub status: TxStatus,
    pub counterparty: Option<WalletId>,
}

/// A committed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TxId,

    /// Globally unique idempotency key.
    pub reference: String,

    /// Wallet whose balance this entry describes.
    pub wallet_id: WalletId,

    pub kind: TxType,

    /// Always positive; direction is carried by `kind`.
    pub amount: Money,

    pub status: TxStatus,

    /// The other wallet of a transfer. `None` for deposits.
    pub counterparty: Option<WalletId>,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) fn from_new(id: TxId, new: NewTransaction) -> Self {
        Transaction {
            id,
            reference: new.reference,
            wallet_id: new.wallet_id,
            kind: new.kind,
            amount: new.amount,
            status: new.status,
            counterparty: new.counterparty,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if `new` describes the same event as this entry.
    ///
    /// Status is not compared: a retried insert of a pending intent must
    /// still match the entry after it has settled.
    pub fn same_payload(&self, new: &NewTransaction) -> bool {
        self.reference == new.reference
            && self.wallet_id == new.wallet_id
            && self.kind == new.kind
            && self.amount == new.amount
            && self.counterparty == new.counterparty
    }
}

/// Reference family shared by the two legs of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReference(String);

impl TransferReference {
    /// Generates a fresh family. ULIDs combine millisecond time with 80
    /// random bits, so concurrent transfers from one sender never collide.
    pub fn generate() -> Self {
        TransferReference(format!("TRF_{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference of the sender's `TRANSFER_OUT` entry.
    pub fn debit_leg(&self) -> String {
        format!("{}_OUT", self.0)
    }

    /// Reference of the recipient's `TRANSFER_IN` entry.
    pub fn credit_leg(&self) -> String {
        format!("{}_IN", self.0)
    }
}

impl fmt::Display for TransferReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a fresh deposit-intent reference.
pub fn deposit_reference() -> String {
    format!("DEP_{}", Ulid::new())
}
