//! Engine configuration.
//!
//! Defaults suit tests and local replays; deployments override them through
//! environment variables.

use crate::error::{LedgerError, Result};
use std::env;
use std::time::Duration;

/// Environment variable overriding [`EngineConfig::lock_timeout`], in milliseconds.
pub const LOCK_TIMEOUT_ENV: &str = "WALLET_LOCK_TIMEOUT_MS";

/// Environment variable overriding [`EngineConfig::checkout_base_url`].
pub const CHECKOUT_URL_ENV: &str = "WALLET_CHECKOUT_URL";

/// Runtime settings shared by the transfer engine and deposit reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on waiting for a single wallet lock.
    pub lock_timeout: Duration,

    /// Base URL the hosted checkout hands payers off to.
    pub checkout_base_url: String,
}

impl EngineConfig {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2_000);
    pub const DEFAULT_CHECKOUT_URL: &'static str = "https://checkout.local/pay";

    /// Builds a configuration from defaults overlaid with environment values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();

        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                LedgerError::Config(format!("{} must be an integer, got {:?}", LOCK_TIMEOUT_ENV, raw))
            })?;
            if millis == 0 {
                return Err(LedgerError::Config(format!(
                    "{} must be greater than zero",
                    LOCK_TIMEOUT_ENV
                )));
            }
            config.lock_timeout = Duration::from_millis(millis);
        }

        if let Some(url) = lookup(CHECKOUT_URL_ENV) {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                return Err(LedgerError::Config(format!("{} is empty", CHECKOUT_URL_ENV)));
            }
            config.checkout_base_url = url.to_string();
        }

        Ok(config)
    }

    /// Returns a copy with a different lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
            checkout_base_url: Self::DEFAULT_CHECKOUT_URL.to_string(),
        }
    }
}
