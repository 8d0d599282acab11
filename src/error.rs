//! Error types for the wallet ledger.

use crate::money::Money;
use crate::wallet::{AccountId, WalletId};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while moving money or recording ledger entries.
///
/// Every failure is scoped to the single operation that raised it. The
/// unit of work it ran in has already rolled back by the time the caller
/// sees the error.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No wallet is registered for the account
    #[error("No wallet found for account {0}")]
    AccountNotFound(AccountId),

    /// Wallet number or id does not exist
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// No ledger entry carries the reference
    #[error("Transaction not found: {0}")]
    ReferenceNotFound(String),

    /// Non-positive or malformed amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Sender balance is below the requested amount
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Money, requested: Money },

    /// Sender and recipient resolve to the same wallet
    #[error("Cannot transfer to the same wallet")]
    SelfTransfer,

    /// Wallet lock was not acquired within the configured timeout
    #[error("Timed out waiting for lock on wallet {0}")]
    LockTimeout(WalletId),

    /// Reference already used for a different payload
    #[error("Reference {0} already exists with a different payload")]
    Conflict(String),

    /// Malformed ledger entry shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payment gateway refused the deposit intent
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: wallet-ledger <script.csv>")]
    MissingArgument,
}

impl LedgerError {
    /// Stable error code for collaborators that shape responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_)
            | LedgerError::WalletNotFound(_)
            | LedgerError::ReferenceNotFound(_) => "NOT_FOUND",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::SelfTransfer => "SELF_TRANSFER",
            LedgerError::LockTimeout(_) => "LOCK_TIMEOUT",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::Gateway(_) => "GATEWAY_ERROR",
            LedgerError::Config(_) => "CONFIG_ERROR",
            LedgerError::Io(_) => "IO_ERROR",
            LedgerError::Csv(_) => "CSV_ERROR",
            LedgerError::MissingArgument => "MISSING_ARGUMENT",
        }
    }

    /// Returns `true` only for failures a caller may retry verbatim (with backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::LockTimeout(_))
    }

    /// Returns `true` for the not-found family.
    pub fn is_not_found(&self) -> bool {
        self.code() == "NOT_FOUND"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::SelfTransfer.code(), "SELF_TRANSFER");
        assert_eq!(
            LedgerError::ReferenceNotFound("dep_1".into()).code(),
            "NOT_FOUND"
        );
        assert_eq!(LedgerError::Conflict("x".into()).code(), "CONFLICT");
    }

    #[test]
    fn test_only_lock_timeout_is_retryable() {
        assert!(LedgerError::LockTimeout(WalletId(1)).is_retryable());
        assert!(!LedgerError::SelfTransfer.is_retryable());
        assert!(!LedgerError::InsufficientFunds {
            balance: Money::ZERO,
            requested: Money::ZERO,
        }
        .is_retryable());
        assert!(!LedgerError::Conflict("x".into()).is_retryable());
    }

    #[test]
    fn test_not_found_family() {
        assert!(LedgerError::AccountNotFound(AccountId(7)).is_not_found());
        assert!(LedgerError::WalletNotFound("123".into()).is_not_found());
        assert!(!LedgerError::SelfTransfer.is_not_found());
    }

    #[test]
    fn test_display() {
        let err = LedgerError::LockTimeout(WalletId(3));
        assert_eq!(err.to_string(), "Timed out waiting for lock on wallet 3");
    }
}
