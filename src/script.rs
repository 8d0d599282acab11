//! Replay script rows: CSV parsing into typed wallet commands.

use crate::deposit::DepositOutcome;
use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::wallet::AccountId;
use serde::Deserialize;
use std::str::FromStr;

/// Raw script row as read from CSV.
///
/// Columns unused by an operation are left empty.
#[derive(Debug, Deserialize)]
pub struct ScriptRecord {
    /// Operation: open, deposit, confirm, transfer
    pub op: String,

    /// Acting account id
    pub account: Option<u64>,

    /// Wallet number (own number for `open`, recipient for `transfer`)
    pub wallet: Option<String>,

    /// Deposit reference
    pub reference: Option<String>,

    pub amount: Option<String>,

    /// Gateway outcome for `confirm`: success or failed
    pub outcome: Option<String>,
}

/// A parsed script command ready to run against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Onboard an account, optionally with a fixed wallet number.
    Open {
        account: AccountId,
        wallet_number: Option<String>,
    },

    /// Create a deposit intent.
    Deposit {
        account: AccountId,
        amount: Money,
        reference: Option<String>,
    },

    /// Apply a verified gateway event.
    Confirm {
        reference: String,
        amount: Money,
        outcome: DepositOutcome,
    },

    /// Move funds to another wallet.
    Transfer {
        account: AccountId,
        wallet_number: String,
        amount: Money,
    },
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ScriptRecord {
    /// Parses the raw CSV row into a typed command.
    pub fn parse(&self) -> Result<Command> {
        let op = self.op.trim().to_lowercase();

        match op.as_str() {
            "open" => Ok(Command::Open {
                account: self.account()?,
                wallet_number: present(&self.wallet).map(str::to_string),
            }),
            "deposit" => Ok(Command::Deposit {
                account: self.account()?,
                amount: self.amount()?,
                reference: present(&self.reference).map(str::to_string),
            }),
            "confirm" => Ok(Command::Confirm {
                reference: self.required(&self.reference, "reference")?.to_string(),
                amount: self.amount()?,
                outcome: DepositOutcome::from_str(self.required(&self.outcome, "outcome")?)?,
            }),
            "transfer" => Ok(Command::Transfer {
                account: self.account()?,
                wallet_number: self.required(&self.wallet, "wallet")?.to_string(),
                amount: self.amount()?,
            }),
            other => Err(LedgerError::Validation(format!("unknown operation {:?}", other))),
        }
    }

    fn account(&self) -> Result<AccountId> {
        self.account
            .map(AccountId)
            .ok_or_else(|| LedgerError::Validation(format!("{} requires an account", self.op.trim())))
    }

    fn amount(&self) -> Result<Money> {
        Money::from_str(self.required(&self.amount, "amount")?)
    }

    fn required<'a>(&self, field: &'a Option<String>, name: &str) -> Result<&'a str> {
        present(field).ok_or_else(|| {
            LedgerError::Validation(format!("{} requires {}", self.op.trim(), name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(op: &str, account: Option<u64>, wallet: &str, reference: &str, amount: &str, outcome: &str) -> ScriptRecord {
        let opt = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        ScriptRecord {
            op: op.to_string(),
            account,
            wallet: opt(wallet),
            reference: opt(reference),
            amount: opt(amount),
            outcome: opt(outcome),
        }
    }

    #[test]
    fn test_parse_open() {
        let cmd = record("open", Some(1), "1000000001", "", "", "").parse().unwrap();
        assert_eq!(
            cmd,
            Command::Open {
                account: AccountId(1),
                wallet_number: Some("1000000001".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_transfer_handles_whitespace_and_case() {
        let cmd = record("  Transfer ", Some(1), " 1000000002 ", "", " 200.5 ", "")
            .parse()
            .unwrap();
        match cmd {
            Command::Transfer { wallet_number, amount, .. } => {
                assert_eq!(wallet_number, "1000000002");
                assert_eq!(amount.to_string(), "200.50");
            }
            _ => panic!("Expected Transfer"),
        }
    }

    #[test]
    fn test_parse_confirm() {
        let cmd = record("confirm", None, "", "dep_123", "75.00", "success").parse().unwrap();
        assert_eq!(
            cmd,
            Command::Confirm {
                reference: "dep_123".to_string(),
                amount: Money::from_minor(7500),
                outcome: DepositOutcome::Success,
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        assert!(record("withdraw", Some(1), "", "", "1", "").parse().is_err());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(record("deposit", Some(1), "", "", "", "").parse().is_err());
        assert!(record("transfer", Some(1), "", "", "5", "").parse().is_err());
        assert!(record("confirm", None, "", "dep_1", "5", "").parse().is_err());
        assert!(record("open", None, "", "", "", "").parse().is_err());
    }
}
