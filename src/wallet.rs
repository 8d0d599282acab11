//! Wallet model and balance operations.
//!
//! Maintains the invariant: `balance >= 0` at all times.

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Opaque identifier of an authenticated account, supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AccountId(pub u64);

/// Internal wallet identity. Lock ordering is defined over this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WalletId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account's single money-holding record.
///
/// # Invariants
///
/// - `balance >= 0` after every operation; `debit` refuses to overdraw
/// - `wallet_number` and `account` never change after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    /// Internal identifier.
    pub id: WalletId,

    /// Owning account.
    pub account: AccountId,

    /// Externally shareable wallet number (10 digits).
    pub wallet_number: String,

    /// Current balance.
    pub balance: Money,

    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Number of digits in a wallet number.
    pub const NUMBER_LEN: usize = 10;

    /// Creates an empty wallet.
    pub fn new(id: WalletId, account: AccountId, wallet_number: String) -> Self {
        Wallet {
            id,
            account,
            wallet_number,
            balance: Money::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if `number` is a well-formed wallet number.
    pub fn is_valid_number(number: &str) -> bool {
        number.len() == Self::NUMBER_LEN && number.bytes().all(|b| b.is_ascii_digit())
    }

    /// Credits funds.
    ///
    /// Returns `false` if the amount is not positive or the sum overflows.
    pub fn credit(&mut self, amount: Money) -> bool {
        if !amount.is_positive() {
            return false;
        }
        match self.balance.checked_add(amount) {
            Some(balance) => {
                self.balance = balance;
                true
            }
            None => false,
        }
    }

    /// Debits funds.
    ///
    /// Returns `true` if the debit succeeded, `false` if:
    /// - The amount is not positive
    /// - Insufficient balance (`balance < amount`)
    pub fn debit(&mut self, amount: Money) -> bool {
        if !amount.is_positive() || self.balance < amount {
            return false;
        }

        match self.balance.checked_sub(amount) {
            Some(balance) => {
                self.balance = balance;
                true
            }
            None => false,
        }
    }

    /// Verifies the invariant: `balance >= 0`.
    pub fn check_invariant(&self) -> bool {
        self.balance >= Money::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn wallet() -> Wallet {
        Wallet::new(WalletId(1), AccountId(10), "1234567890".to_string())
    }

    #[test]
    fn test_new_wallet_has_zero_balance() {
        let w = wallet();
        assert_eq!(w.id, WalletId(1));
        assert_eq!(w.account, AccountId(10));
        assert_eq!(w.balance, Money::ZERO);
        assert!(w.check_invariant());
    }

    #[test]
    fn test_credit_then_debit() {
        let mut w = wallet();
        assert!(w.credit(dec("10.00")));
        assert!(w.debit(dec("3.50")));
        assert_eq!(w.balance.to_string(), "6.50");
        assert!(w.check_invariant());
    }

    #[test]
    fn test_debit_fails_with_insufficient_balance() {
        let mut w = wallet();
        w.credit(dec("100.00"));
        assert!(!w.debit(dec("150.00")));
        assert_eq!(w.balance.to_string(), "100.00");
    }

    #[test]
    fn test_debit_whole_balance_reaches_zero() {
        let mut w = wallet();
        w.credit(dec("5.00"));
        assert!(w.debit(dec("5.00")));
        assert!(w.balance.is_zero());
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let mut w = wallet();
        assert!(!w.credit(Money::ZERO));
        assert!(!w.credit(dec("-1.00")));
        assert!(!w.debit(dec("-1.00")));
        assert_eq!(w.balance, Money::ZERO);
    }

    #[test]
    fn test_wallet_number_format() {
        assert!(Wallet::is_valid_number("1000000001"));
        assert!(!Wallet::is_valid_number("12345"));
        assert!(!Wallet::is_valid_number("12345abcde"));
    }
}
