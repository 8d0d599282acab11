//! Gateway deposits: intent creation and exactly-once confirmation.
//!
//! An intent is a `PENDING` ledger entry. Confirmations settle it at most
//! once; replays of the same gateway event find a terminal entry and return
//! it untouched, so a wallet is never credited twice for one reference.

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::recorder::TransactionRecorder;
use crate::store::{LedgerStore, WalletStore};
use crate::transaction::{deposit_reference, NewTransaction, Transaction, TxStatus, TxType};
use crate::unit_of_work;
use crate::wallet::AccountId;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What the payment gateway needs to collect a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositIntent {
    pub reference: String,
    pub account: AccountId,
    pub wallet_number: String,
    pub amount: Money,
}

/// What the gateway hands back for the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayHandoff {
    pub reference: String,
    pub amount: Money,
    pub authorization_url: String,
}

/// The payment collaborator deposits are handed off to.
pub trait PaymentGateway: Send + Sync {
    /// Registers the intent and returns where the payer should go next.
    fn initialize(&self, intent: &DepositIntent) -> Result<GatewayHandoff>;
}

/// Gateway that sends payers to a hosted checkout page per reference.
#[derive(Debug, Clone)]
pub struct HostedCheckout {
    base_url: String,
}

impl HostedCheckout {
    pub fn new(base_url: impl Into<String>) -> Self {
        HostedCheckout {
            base_url: base_url.into(),
        }
    }
}

impl PaymentGateway for HostedCheckout {
    fn initialize(&self, intent: &DepositIntent) -> Result<GatewayHandoff> {
        Ok(GatewayHandoff {
            reference: intent.reference.clone(),
            amount: intent.amount,
            authorization_url: format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                intent.reference
            ),
        })
    }
}

/// Result reported by a verified gateway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositOutcome {
    Success,
    Failed,
}

impl DepositOutcome {
    pub fn status(&self) -> TxStatus {
        match self {
            DepositOutcome::Success => TxStatus::Success,
            DepositOutcome::Failed => TxStatus::Failed,
        }
    }
}

impl FromStr for DepositOutcome {
    type Err = LedgerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(DepositOutcome::Success),
            "failed" => Ok(DepositOutcome::Failed),
            other => Err(LedgerError::Validation(format!(
                "unknown deposit outcome {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for DepositOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

/// Applies external deposit events to wallets exactly once.
pub struct DepositReconciler {
    wallets: Arc<WalletStore>,
    ledger: Arc<LedgerStore>,
    recorder: TransactionRecorder,
    gateway: Arc<dyn PaymentGateway>,
}

impl DepositReconciler {
    pub fn new(
        wallets: Arc<WalletStore>,
        ledger: Arc<LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let recorder = TransactionRecorder::new(Arc::clone(&ledger));
        DepositReconciler {
            wallets,
            ledger,
            recorder,
            gateway,
        }
    }

    /// Creates a `PENDING` deposit intent with a fresh reference and hands
    /// it to the gateway. The balance is not touched.
    pub fn initiate(&self, account: AccountId, amount: Money) -> Result<GatewayHandoff> {
        self.initiate_with_reference(account, amount, &deposit_reference())
    }

    /// Like [`initiate`](Self::initiate) with a caller-chosen reference.
    ///
    /// Retrying with the same reference and payload returns a handoff for
    /// the existing intent; a different payload is a `Conflict`. A gateway
    /// error settles the intent `FAILED` only when this call created it.
    pub fn initiate_with_reference(
        &self,
        account: AccountId,
        amount: Money,
        reference: &str,
    ) -> Result<GatewayHandoff> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "deposit amount must be positive, got {}",
                amount
            )));
        }

        let wallet = self.wallets.get_by_account_id(account)?;
        let (entry, inserted) = self.recorder.record_entry(NewTransaction {
            reference: reference.trim().to_string(),
            wallet_id: wallet.id,
            kind: TxType::Deposit,
            amount,
            status: TxStatus::Pending,
            counterparty: None,
        })?;

        if entry.status.is_terminal() {
            return Err(LedgerError::Validation(format!(
                "deposit {} is already {}",
                entry.reference, entry.status
            )));
        }
        if inserted {
            info!(
                "Deposit intent {} for account {}: {}",
                entry.reference, account, amount
            );
        }

        let intent = DepositIntent {
            reference: entry.reference.clone(),
            account,
            wallet_number: wallet.wallet_number,
            amount,
        };

        match self.gateway.initialize(&intent) {
            Ok(handoff) => Ok(handoff),
            Err(err) if !inserted => {
                // The intent was handed off by an earlier call and may
                // still be paid, so it stays PENDING.
                warn!(
                    "Gateway failed on retry of deposit {}: {}",
                    intent.reference, err
                );
                Err(err)
            }
            Err(err) => {
                warn!("Gateway refused deposit {}: {}", intent.reference, err);
                if let Err(settle_err) =
                    self.apply_confirmation(&intent.reference, amount, DepositOutcome::Failed)
                {
                    warn!(
                        "Could not mark deposit {} as failed: {}",
                        intent.reference, settle_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Applies a verified gateway event to its deposit intent.
    ///
    /// Idempotent: if the entry is already terminal it is returned
    /// unchanged, whatever the event says. Otherwise, under the wallet's
    /// lock, `Success` credits `confirmed_amount` and settles the entry;
    /// `Failed` settles it with no balance change.
    pub fn apply_confirmation(
        &self,
        reference: &str,
        confirmed_amount: Money,
        outcome: DepositOutcome,
    ) -> Result<Transaction> {
        let reference = reference.trim();
        if !confirmed_amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "confirmed amount must be positive, got {}",
                confirmed_amount
            )));
        }

        let entry = self.ledger.get_by_reference(reference)?;
        if entry.kind != TxType::Deposit {
            return Err(LedgerError::Validation(format!(
                "{} is a {} entry, not a deposit",
                reference, entry.kind
            )));
        }
        if entry.status.is_terminal() {
            debug!(
                "Deposit {} already {}, ignoring {} replay",
                reference, entry.status, outcome
            );
            return Ok(entry);
        }
        if outcome == DepositOutcome::Success && confirmed_amount != entry.amount {
            warn!(
                "Deposit {} confirmed for {} but intent was {}",
                reference, confirmed_amount, entry.amount
            );
            return Err(LedgerError::Conflict(reference.to_string()));
        }

        let wallet_id = entry.wallet_id;
        let (already_settled, committed) =
            unit_of_work::execute(&self.wallets, &self.ledger, &[wallet_id], |uow| {
                // A concurrent delivery may have settled it while we waited.
                let current = self.ledger.get_by_reference(reference)?;
                if current.status.is_terminal() {
                    return Ok(Some(current));
                }

                if outcome == DepositOutcome::Success {
                    uow.credit(wallet_id, confirmed_amount)?;
                }
                uow.settle(reference, outcome.status());
                Ok(None)
            })?;

        if let Some(settled) = already_settled {
            debug!("Deposit {} settled concurrently as {}", reference, settled.status);
            return Ok(settled);
        }

        let settled = committed
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::ReferenceNotFound(reference.to_string()))?;

        info!(
            "Deposit {} settled as {} for wallet {}: {}",
            reference, settled.status, wallet_id, settled.amount
        );
        Ok(settled)
    }

    /// Current state of a deposit.
    pub fn status(&self, reference: &str) -> Result<Transaction> {
        let reference = reference.trim();
        let entry = self.ledger.get_by_reference(reference)?;
        if entry.kind != TxType::Deposit {
            return Err(LedgerError::ReferenceNotFound(reference.to_string()));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct RefusingGateway;

    impl PaymentGateway for RefusingGateway {
        fn initialize(&self, _intent: &DepositIntent) -> Result<GatewayHandoff> {
            Err(LedgerError::Gateway("declined".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingGateway(AtomicUsize);

    impl PaymentGateway for CountingGateway {
        fn initialize(&self, intent: &DepositIntent) -> Result<GatewayHandoff> {
            self.0.fetch_add(1, Ordering::SeqCst);
            HostedCheckout::new("https://pay.test").initialize(intent)
        }
    }

    /// Accepts the first handoff, then fails every later one.
    #[derive(Default)]
    struct FlakyGateway(AtomicUsize);

    impl PaymentGateway for FlakyGateway {
        fn initialize(&self, intent: &DepositIntent) -> Result<GatewayHandoff> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                HostedCheckout::new("https://pay.test").initialize(intent)
            } else {
                Err(LedgerError::Gateway("transient 503".to_string()))
            }
        }
    }

    fn reconciler(gateway: Arc<dyn PaymentGateway>) -> (Arc<WalletStore>, DepositReconciler) {
        let wallets = Arc::new(WalletStore::new(Duration::from_millis(100)));
        wallets.create(AccountId(1), Some("1000000001")).unwrap();
        let ledger = Arc::new(LedgerStore::new());
        let reconciler = DepositReconciler::new(Arc::clone(&wallets), ledger, gateway);
        (wallets, reconciler)
    }

    fn balance(wallets: &WalletStore) -> Money {
        wallets.get_by_account_id(AccountId(1)).unwrap().balance
    }

    #[test]
    fn test_initiate_creates_pending_intent() {
        let (wallets, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test/")));

        let handoff = deposits.initiate(AccountId(1), Money::from_minor(7500)).unwrap();

        assert!(handoff.reference.starts_with("DEP_"));
        assert_eq!(
            handoff.authorization_url,
            format!("https://pay.test/{}", handoff.reference)
        );
        let entry = deposits.status(&handoff.reference).unwrap();
        assert_eq!(entry.status, TxStatus::Pending);
        assert_eq!(entry.kind, TxType::Deposit);
        assert_eq!(balance(&wallets), Money::ZERO);
    }

    #[test]
    fn test_confirmation_applied_once() {
        let (wallets, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test")));
        deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(7500), "dep_123")
            .unwrap();

        let first = deposits
            .apply_confirmation("dep_123", Money::from_minor(7500), DepositOutcome::Success)
            .unwrap();
        let second = deposits
            .apply_confirmation("dep_123", Money::from_minor(7500), DepositOutcome::Success)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.status, TxStatus::Success);
        assert_eq!(balance(&wallets), Money::from_minor(7500));
    }

    #[test]
    fn test_failed_outcome_leaves_balance() {
        let (wallets, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test")));
        deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(1000), "dep_9")
            .unwrap();

        let entry = deposits
            .apply_confirmation("dep_9", Money::from_minor(1000), DepositOutcome::Failed)
            .unwrap();
        assert_eq!(entry.status, TxStatus::Failed);

        let replay = deposits
            .apply_confirmation("dep_9", Money::from_minor(1000), DepositOutcome::Success)
            .unwrap();
        assert_eq!(replay.status, TxStatus::Failed);
        assert_eq!(balance(&wallets), Money::ZERO);
    }

    #[test]
    fn test_amount_mismatch_is_conflict() {
        let (wallets, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test")));
        deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(1000), "dep_7")
            .unwrap();

        let err = deposits
            .apply_confirmation("dep_7", Money::from_minor(9999), DepositOutcome::Success)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(deposits.status("dep_7").unwrap().status, TxStatus::Pending);
        assert_eq!(balance(&wallets), Money::ZERO);
    }

    #[test]
    fn test_unknown_reference() {
        let (_, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test")));
        let err = deposits
            .apply_confirmation("nope", Money::from_minor(1), DepositOutcome::Success)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(deposits.status("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_retried_initiate_reuses_intent() {
        let gateway = Arc::new(CountingGateway::default());
        let (_, deposits) = reconciler(gateway.clone());

        let a = deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(500), "dep_r")
            .unwrap();
        let b = deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(500), "dep_r")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(gateway.0.load(Ordering::SeqCst), 2);

        let err = deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(600), "dep_r")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_gateway_refusal_marks_intent_failed() {
        let (wallets, deposits) = reconciler(Arc::new(RefusingGateway));

        let err = deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(500), "dep_x")
            .unwrap_err();

        assert!(matches!(err, LedgerError::Gateway(_)));
        assert_eq!(deposits.status("dep_x").unwrap().status, TxStatus::Failed);
        assert_eq!(balance(&wallets), Money::ZERO);
    }

    #[test]
    fn test_gateway_error_on_retry_keeps_intent_pending() {
        let (wallets, deposits) = reconciler(Arc::new(FlakyGateway::default()));

        deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(7500), "dep_123")
            .unwrap();
        let err = deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(7500), "dep_123")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Gateway(_)));
        assert_eq!(deposits.status("dep_123").unwrap().status, TxStatus::Pending);

        let entry = deposits
            .apply_confirmation("dep_123", Money::from_minor(7500), DepositOutcome::Success)
            .unwrap();
        assert_eq!(entry.status, TxStatus::Success);
        assert_eq!(balance(&wallets), Money::from_minor(7500));
    }

    #[test]
    fn test_references_are_trimmed_everywhere() {
        let (wallets, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test")));

        let handoff = deposits
            .initiate_with_reference(AccountId(1), Money::from_minor(100), " dep_1 ")
            .unwrap();
        assert_eq!(handoff.reference, "dep_1");

        assert_eq!(deposits.status(" dep_1 ").unwrap().status, TxStatus::Pending);
        let entry = deposits
            .apply_confirmation(" dep_1 ", Money::from_minor(100), DepositOutcome::Success)
            .unwrap();
        assert_eq!(entry.reference, "dep_1");
        assert_eq!(balance(&wallets), Money::from_minor(100));
    }

    #[test]
    fn test_initiate_validation() {
        let (_, deposits) = reconciler(Arc::new(HostedCheckout::new("https://pay.test")));

        let err = deposits.initiate(AccountId(1), Money::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));

        let err = deposits.initiate(AccountId(2), Money::from_minor(100)).unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!(DepositOutcome::from_str(" SUCCESS ").unwrap(), DepositOutcome::Success);
        assert_eq!(DepositOutcome::from_str("failed").unwrap(), DepositOutcome::Failed);
        assert!(DepositOutcome::from_str("maybe").is_err());
    }
}
