//! Wallet engine facade.
//!
//! Wires the stores, the transfer engine and the deposit reconciler from one
//! configuration, and replays CSV scripts of wallet operations for batch
//! runs. The engine is `Sync`; share it across threads behind a reference
//! or an `Arc`.

use crate::config::EngineConfig;
use crate::deposit::{DepositOutcome, DepositReconciler, GatewayHandoff, HostedCheckout, PaymentGateway};
use crate::error::Result;
use crate::money::Money;
use crate::script::{Command, ScriptRecord};
use crate::store::{LedgerStore, WalletStore};
use crate::transaction::Transaction;
use crate::transfer::{TransferEngine, TransferResult};
use crate::wallet::{AccountId, Wallet};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::Serialize;
use std::io::{Read, Write};
use std::sync::Arc;

/// Entry point for money movement and ledger queries.
pub struct WalletEngine {
    wallets: Arc<WalletStore>,
    ledger: Arc<LedgerStore>,
    transfers: TransferEngine,
    deposits: DepositReconciler,
}

/// One line of the balance report.
#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    account: u64,
    wallet: &'a str,
    balance: Money,
}

impl WalletEngine {
    /// Creates an engine that hands deposits to a hosted checkout.
    pub fn new(config: EngineConfig) -> Self {
        let gateway = Arc::new(HostedCheckout::new(config.checkout_base_url.clone()));
        Self::with_gateway(config, gateway)
    }

    /// Creates an engine with a custom payment gateway.
    pub fn with_gateway(config: EngineConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        let wallets = Arc::new(WalletStore::new(config.lock_timeout));
        let ledger = Arc::new(LedgerStore::new());

        WalletEngine {
            transfers: TransferEngine::new(Arc::clone(&wallets), Arc::clone(&ledger)),
            deposits: DepositReconciler::new(Arc::clone(&wallets), Arc::clone(&ledger), gateway),
            wallets,
            ledger,
        }
    }

    /// Opens the account's wallet, or returns it if it already exists.
    pub fn open_wallet(&self, account: AccountId, wallet_number: Option<&str>) -> Result<Wallet> {
        self.wallets.create(account, wallet_number)
    }

    pub fn balance(&self, account: AccountId) -> Result<Money> {
        Ok(self.wallets.get_by_account_id(account)?.balance)
    }

    /// The account's ledger entries, newest first.
    pub fn history(&self, account: AccountId) -> Result<Vec<Transaction>> {
        let wallet_id = self.wallets.wallet_id_for_account(account)?;
        Ok(self.ledger.list_by_wallet(wallet_id))
    }

    pub fn transfer(
        &self,
        sender: AccountId,
        recipient_number: &str,
        amount: Money,
    ) -> Result<TransferResult> {
        self.transfers.transfer(sender, recipient_number, amount)
    }

    pub fn initiate_deposit(&self, account: AccountId, amount: Money) -> Result<GatewayHandoff> {
        self.deposits.initiate(account, amount)
    }

    pub fn initiate_deposit_with_reference(
        &self,
        account: AccountId,
        amount: Money,
        reference: &str,
    ) -> Result<GatewayHandoff> {
        self.deposits.initiate_with_reference(account, amount, reference)
    }

    pub fn apply_confirmation(
        &self,
        reference: &str,
        confirmed_amount: Money,
        outcome: DepositOutcome,
    ) -> Result<Transaction> {
        self.deposits.apply_confirmation(reference, confirmed_amount, outcome)
    }

    pub fn deposit_status(&self, reference: &str) -> Result<Transaction> {
        self.deposits.status(reference)
    }

    pub fn wallets(&self) -> &WalletStore {
        &self.wallets
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Replays a CSV script of wallet operations.
    ///
    /// Rows are processed in order. Rows that fail to parse or execute are
    /// logged at warn level and skipped. A failed row changes no balance,
    /// but a `deposit` row refused by the gateway leaves its intent in the
    /// ledger as `FAILED`.
    pub fn process_csv<R: Read>(&self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<ScriptRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            let outcome = result
                .map_err(Into::into)
                .and_then(|record| record.parse())
                .and_then(|command| self.execute(command, row_num));

            if let Err(e) = outcome {
                warn!("Row {}: {}", row_num, e);
            }
        }

        Ok(())
    }

    fn execute(&self, command: Command, row: usize) -> Result<()> {
        match command {
            Command::Open {
                account,
                wallet_number,
            } => {
                let wallet = self.open_wallet(account, wallet_number.as_deref())?;
                debug!("Row {}: account {} has wallet {}", row, account, wallet.wallet_number);
            }
            Command::Deposit {
                account,
                amount,
                reference,
            } => {
                let handoff = match reference {
                    Some(reference) => self.initiate_deposit_with_reference(account, amount, &reference)?,
                    None => self.initiate_deposit(account, amount)?,
                };
                debug!(
                    "Row {}: deposit {} awaiting payment at {}",
                    row, handoff.reference, handoff.authorization_url
                );
            }
            Command::Confirm {
                reference,
                amount,
                outcome,
            } => {
                let entry = self.apply_confirmation(&reference, amount, outcome)?;
                debug!("Row {}: deposit {} is {}", row, entry.reference, entry.status);
            }
            Command::Transfer {
                account,
                wallet_number,
                amount,
            } => {
                let result = self.transfer(account, &wallet_number, amount)?;
                debug!("Row {}: transfer {} committed", row, result.reference);
            }
        }
        Ok(())
    }

    /// Writes every wallet's balance as CSV.
    ///
    /// Output is sorted by account id; balances carry exactly 2 decimals.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for wallet in self.wallets.list()? {
            csv_writer.serialize(BalanceRow {
                account: wallet.account.0,
                wallet: &wallet.wallet_number,
                balance: wallet.balance,
            })?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for WalletEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxStatus, TxType};
    use std::io::Cursor;
    use std::str::FromStr;

    fn dec(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn process_csv_str(csv: &str) -> WalletEngine {
        let engine = WalletEngine::default();
        engine.process_csv(Cursor::new(csv)).unwrap();
        engine
    }

    #[test]
    fn test_deposit_then_transfer() {
        let csv = r#"op,account,wallet,reference,amount,outcome
open,1,1000000001,,,
open,2,1000000002,,,
deposit,1,,dep_1,500.00,
confirm,,,dep_1,500.00,success
transfer,1,1000000002,,200.00,"#;

        let engine = process_csv_str(csv);

        assert_eq!(engine.balance(AccountId(1)).unwrap(), dec("300.00"));
        assert_eq!(engine.balance(AccountId(2)).unwrap(), dec("200.00"));
    }

    #[test]
    fn test_failed_rows_are_skipped() {
        let csv = r#"op,account,wallet,reference,amount,outcome
open,1,1000000001,,,
open,2,1000000002,,,
transfer,1,1000000002,,10.00,
bogus,1,,,,
deposit,1,,,abc,"#;

        let engine = process_csv_str(csv);

        assert_eq!(engine.balance(AccountId(1)).unwrap(), Money::ZERO);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_refused_deposit_row_leaves_failed_intent() {
        struct Refusing;

        impl PaymentGateway for Refusing {
            fn initialize(&self, _intent: &crate::deposit::DepositIntent) -> Result<GatewayHandoff> {
                Err(crate::error::LedgerError::Gateway("declined".to_string()))
            }
        }

        let csv = r#"op,account,wallet,reference,amount,outcome
open,1,1000000001,,,
deposit,1,,dep_1,10.00,"#;

        let engine = WalletEngine::with_gateway(EngineConfig::default(), Arc::new(Refusing));
        engine.process_csv(Cursor::new(csv)).unwrap();

        assert_eq!(engine.balance(AccountId(1)).unwrap(), Money::ZERO);
        assert_eq!(engine.deposit_status("dep_1").unwrap().status, TxStatus::Failed);
    }

    #[test]
    fn test_history_is_newest_first() {
        let csv = r#"op,account,wallet,reference,amount,outcome
open,1,1000000001,,,
open,2,1000000002,,,
deposit,1,,dep_1,50.00,
confirm,,,dep_1,50.00,success
transfer,1,1000000002,,20.00,"#;

        let engine = process_csv_str(csv);
        let history = engine.history(AccountId(1)).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TxType::TransferOut);
        assert_eq!(history[1].kind, TxType::Deposit);
        assert_eq!(history[1].status, TxStatus::Success);
    }

    #[test]
    fn test_output_format() {
        let csv = r#"op,account,wallet,reference,amount,outcome
open,2,1000000002,,,
open,1,1000000001,,,
deposit,2,,dep_2,2.5,
confirm,,,dep_2,2.50,success"#;

        let engine = process_csv_str(csv);
        let mut output = Vec::new();
        engine.write_output(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines, vec!["account,wallet,balance", "1,1000000001,0.00", "2,1000000002,2.50"]);
    }
}
