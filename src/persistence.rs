//! Database persistence layer for ProvChain
//!
//! Blocks are stored by append position. Loading reassembles the chain and
//! runs it through `Ledger::restore`, so a tampered database is rejected
//! with `BrokenLink` instead of being handed out as a consistent ledger.

use crate::blockchain::{Block, Ledger};
use crate::error::ChainError;
use rusqlite::{params, Connection};
use std::sync::Mutex;
use tracing::{debug, info};

/// Abstraction for persistence backends.
pub trait Persistence: Send + Sync {
    /// Store `block` at append position `position` (genesis is 0).
    fn save_block(&self, position: usize, block: &Block) -> Result<(), ChainError>;
    /// Replace the stored chain with `ledger` atomically.
    fn save_ledger(&self, ledger: &Ledger) -> Result<(), ChainError>;
    /// Stored blocks in append order, unverified.
    fn load_blocks(&self) -> Result<Vec<Block>, ChainError>;

    /// Load and verify. An empty store yields a fresh genesis-only ledger.
    fn load_ledger(&self, max_payload_bytes: usize) -> Result<Ledger, ChainError> {
        let blocks = self.load_blocks()?;
        if blocks.is_empty() {
            return Ok(Ledger::with_limit(max_payload_bytes));
        }
        Ledger::restore(blocks, max_payload_bytes)
    }
}

fn poisoned() -> ChainError {
    ChainError::DatabaseError("Mutex poisoned".to_string())
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                position INTEGER PRIMARY KEY,
                content_hash BLOB NOT NULL,
                previous_hash BLOB NOT NULL,
                payload BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        debug!(path, "Opened ledger database");
        Ok(Database { conn: Mutex::new(conn) })
    }

    pub fn save_block(&self, position: usize, block: &Block) -> Result<(), ChainError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO blocks (position, content_hash, previous_hash, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                position as i64,
                block.content_hash().to_vec(),
                block.previous_hash().to_vec(),
                block.payload(),
            ],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save block {}: {}", position, e)))?;
        Ok(())
    }

    pub fn save_ledger(&self, ledger: &Ledger) -> Result<(), ChainError> {
        let conn_guard = self.conn.lock().map_err(|_| poisoned())?;
        let tx = conn_guard
            .unchecked_transaction()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        tx.execute("DELETE FROM blocks", [])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to clear blocks: {}", e)))?;

        for (position, block) in ledger.iter().enumerate() {
            tx.execute(
                "INSERT INTO blocks (position, content_hash, previous_hash, payload) VALUES (?1, ?2, ?3, ?4)",
                params![
                    position as i64,
                    block.content_hash().to_vec(),
                    block.previous_hash().to_vec(),
                    block.payload(),
                ],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save block {}: {}", position, e)))?;
        }

        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;

        info!(blocks = ledger.len(), "Saved ledger to database");
        Ok(())
    }

    pub fn load_blocks(&self) -> Result<Vec<Block>, ChainError> {
        let conn_guard = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn_guard
            .prepare("SELECT position, content_hash, previous_hash, payload FROM blocks ORDER BY position ASC")
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let position: i64 = row.get(0)?;
                let content_hash: Vec<u8> = row.get(1)?;
                let previous_hash: Vec<u8> = row.get(2)?;
                let payload: Vec<u8> = row.get(3)?;
                Ok((position, content_hash, previous_hash, payload))
            })
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for (expected, row) in rows.enumerate() {
            let (position, content_hash, previous_hash, payload) =
                row.map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))?;

            if position != expected as i64 {
                return Err(ChainError::DatabaseError(format!(
                    "Gap in stored chain: expected position {}, found {}",
                    expected, position
                )));
            }

            blocks.push(Block::from_parts(
                to_digest(&previous_hash, position)?,
                payload,
                to_digest(&content_hash, position)?,
            ));
        }

        Ok(blocks)
    }
}

fn to_digest(bytes: &[u8], position: i64) -> Result<[u8; 32], ChainError> {
    bytes.try_into().map_err(|_| {
        ChainError::InvalidHash(format!(
            "Stored digest at position {} is {} bytes, expected 32",
            position,
            bytes.len()
        ))
    })
}

impl Persistence for Database {
    fn save_block(&self, position: usize, block: &Block) -> Result<(), ChainError> {
        Database::save_block(self, position, block)
    }

    fn save_ledger(&self, ledger: &Ledger) -> Result<(), ChainError> {
        Database::save_ledger(self, ledger)
    }

    fn load_blocks(&self) -> Result<Vec<Block>, ChainError> {
        Database::load_blocks(self)
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub blocks: std::sync::Arc<Mutex<Vec<Block>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_block(&self, position: usize, block: &Block) -> Result<(), ChainError> {
        let mut blocks = self.blocks.lock().map_err(|_| poisoned())?;
        if position != blocks.len() {
            return Err(ChainError::DatabaseError(format!(
                "Out-of-order save: position {} with {} blocks stored",
                position,
                blocks.len()
            )));
        }
        blocks.push(block.clone());
        Ok(())
    }

    fn save_ledger(&self, ledger: &Ledger) -> Result<(), ChainError> {
        let mut blocks = self.blocks.lock().map_err(|_| poisoned())?;
        *blocks = ledger.iter().cloned().collect();
        Ok(())
    }

    fn load_blocks(&self) -> Result<Vec<Block>, ChainError> {
        let blocks = self.blocks.lock().map_err(|_| poisoned())?;
        Ok(blocks.clone())
    }
}

/// Append `payload` to `ledger` and persist the new block.
pub fn append_and_save(
    ledger: &mut Ledger,
    store: &dyn Persistence,
    payload: impl Into<Vec<u8>>,
) -> Result<std::sync::Arc<Block>, ChainError> {
    let block = ledger.append(payload)?;
    store.save_block(ledger.len() - 1, &block)?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MAX_PAYLOAD_SIZE;
    use crate::error::LinkFault;

    #[test]
    fn test_database_open() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_empty_store_loads_genesis() {
        let db = Database::open(":memory:").unwrap();
        let ledger = db.load_ledger(MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_save_and_load_ledger() {
        let db = Database::open(":memory:").unwrap();
        let mut ledger = Ledger::new();
        ledger.append("Nike").unwrap();
        ledger.append("Puma").unwrap();
        db.save_ledger(&ledger).unwrap();

        let loaded = db.load_ledger(MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.tip_hash(), ledger.tip_hash());
    }

    #[test]
    fn test_incremental_saves() {
        let db = Database::open(":memory:").unwrap();
        let mut ledger = Ledger::new();
        db.save_ledger(&ledger).unwrap();
        append_and_save(&mut ledger, &db, "Nike").unwrap();
        append_and_save(&mut ledger, &db, "Puma").unwrap();

        let loaded = db.load_ledger(MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(loaded.tip_hash(), ledger.tip_hash());
    }

    #[test]
    fn test_tampered_row_rejected() {
        let db = Database::open(":memory:").unwrap();
        let mut ledger = Ledger::new();
        ledger.append("Nike").unwrap();
        ledger.append("Puma").unwrap();
        db.save_ledger(&ledger).unwrap();

        db.conn
            .lock()
            .unwrap()
            .execute("UPDATE blocks SET payload = ?1 WHERE position = 1", params![b"Fake".to_vec()])
            .unwrap();

        assert!(matches!(
            db.load_ledger(MAX_PAYLOAD_SIZE),
            Err(ChainError::BrokenLink { index: 1, fault: LinkFault::HashMismatch, .. })
        ));
    }

    #[test]
    fn test_reload_after_lowering_limit() {
        let db = Database::open(":memory:").unwrap();
        let mut ledger = Ledger::new();
        ledger.append(vec![b'x'; 100]).unwrap();
        db.save_ledger(&ledger).unwrap();

        let mut loaded = db.load_ledger(10).unwrap();
        assert_eq!(loaded.tip_hash(), ledger.tip_hash());
        assert!(matches!(
            append_and_save(&mut loaded, &db, vec![b'x'; 11]),
            Err(ChainError::PayloadTooLarge { size: 11, max: 10 })
        ));
    }

    #[test]
    fn test_in_memory_persistence() {
        let store = InMemoryPersistence::new();
        let mut ledger = Ledger::new();
        store.save_block(0, ledger.tip().unwrap()).unwrap();
        append_and_save(&mut ledger, &store, "Converse").unwrap();
        assert!(store.save_block(5, ledger.tip().unwrap()).is_err());

        let loaded = store.load_ledger(MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(loaded.tip_hash(), ledger.tip_hash());
    }
}
