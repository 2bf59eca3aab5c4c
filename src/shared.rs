//! Thread-safe ledger handle
//!
//! One writer at a time: `append` holds the write lock across reading the
//! tip, building the block and inserting it, so two appends can never both
//! link to the same predecessor. Readers take the read lock and never see a
//! half-applied append.

use crate::blockchain::{Block, ChainSummary, Ledger};
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        SharedLedger {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn append(&self, payload: impl Into<Vec<u8>>) -> Result<Arc<Block>, ChainError> {
        let mut ledger = self.inner.write();
        ledger.append(payload)
    }

    pub fn verify(&self) -> Result<(), ChainError> {
        self.inner.read().verify()
    }

    pub fn lookup(&self, hash: &Sha256Hash) -> Option<Arc<Block>> {
        self.inner.read().lookup_shared(hash)
    }

    pub fn tip_hash(&self) -> Sha256Hash {
        *self.inner.read().tip_hash()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn summary(&self) -> ChainSummary {
        self.inner.read().summary()
    }

    /// Point-in-time copy of the ledger. Blocks are shared, not copied, and
    /// later appends to this handle do not show up in the snapshot.
    pub fn snapshot(&self) -> Ledger {
        self.inner.read().clone()
    }

    /// Run `f` against the ledger under the read lock.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        f(&self.inner.read())
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        SharedLedger::new(ledger)
    }
}
