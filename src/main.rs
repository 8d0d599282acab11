//! Wallet Ledger CLI
//!
//! Replays a CSV script of wallet operations and prints final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- script.csv > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `WALLET_LOCK_TIMEOUT_MS`: Wallet lock timeout (default 2000)
//! - `WALLET_CHECKOUT_URL`: Hosted checkout base URL for deposit handoffs

use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;
use wallet_ledger::{EngineConfig, LedgerError, Result, WalletEngine};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(LedgerError::MissingArgument);
    }

    let config = EngineConfig::from_env()?;

    let input_path = &args[1];
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let engine = WalletEngine::new(config);
    engine.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    engine.write_output(handle)?;

    Ok(())
}
