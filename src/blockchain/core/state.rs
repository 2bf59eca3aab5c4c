use crate::crypto::{hash_to_hex, Sha256Hash};
use std::fmt;

/// Lifecycle of a ledger.
///
/// A ledger starts `Consistent` and stays there under append. It becomes
/// `Corrupted` only when an append hits a digest collision; there is no way
/// back. Out-of-band damage is reported by `verify()` without changing this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LedgerState {
    Consistent,
    Corrupted,
}

impl fmt::Display for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerState::Consistent => write!(f, "consistent"),
            LedgerState::Corrupted => write!(f, "corrupted"),
        }
    }
}

/// Point-in-time description of a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Blocks including genesis.
    pub length: usize,
    pub genesis_hash: Sha256Hash,
    pub tip_hash: Sha256Hash,
    /// Total payload bytes, genesis excluded.
    pub payload_bytes: usize,
    pub state: LedgerState,
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} blocks, tip {}, {} payload bytes ({})",
            self.length,
            hash_to_hex(&self.tip_hash),
            self.payload_bytes,
            self.state
        )
    }
}
