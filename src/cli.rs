//! Shared setup for the command-line binaries

use crate::blockchain::Ledger;
use crate::config::{load_config_from, Config, DEFAULT_CONFIG_FILE};
use crate::error::ChainError;
use crate::persistence::{Database, Persistence};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Install the fmt subscriber at the configured level.
pub fn init_tracing(config: &Config) {
    let level = config.logging.tracing_level().unwrap_or(tracing::Level::INFO);
    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Load configuration (from `config_path` or `provchain.toml`), install
/// logging, open the database and load the verified ledger.
pub fn load_ledger_from_config(config_path: Option<&Path>) -> Result<(Config, Database, Ledger), ChainError> {
    let config = load_config_from(config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE)))?;
    init_tracing(&config);

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let db = Database::open(&config.database.path)?;
    let ledger = db.load_ledger(config.ledger.max_payload_bytes)?;
    if ledger.is_empty() {
        // Fresh store: persist the genesis block so positions line up.
        if db.load_blocks()?.is_empty() {
            db.save_ledger(&ledger)?;
            warn!(path = %config.database.path, "No ledger found, created genesis");
        }
    }
    info!(blocks = ledger.len(), tip = %crate::crypto::hash_to_hex(ledger.tip_hash()), "Ledger loaded");

    Ok((config, db, ledger))
}
