//! Error types for ProvChain

use crate::crypto::Sha256Hash;
use std::fmt;

/// Why a block failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    /// Recomputed content hash differs from the hash the block is stored under.
    HashMismatch,
    /// `previous_hash` is not the hash of the block immediately before it.
    LinkMismatch,
    /// `previous_hash` names a block that an earlier block already extends.
    Fork,
    /// The first block is not the genesis sentinel.
    InvalidGenesis,
    /// The append order names a hash with no stored block.
    MissingBlock,
    /// The same content hash appears twice in the append order.
    DuplicateBlock,
    /// The recorded tip is not the last block in append order.
    TipMismatch,
}

impl fmt::Display for LinkFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkFault::HashMismatch => write!(f, "content hash mismatch"),
            LinkFault::LinkMismatch => write!(f, "previous hash does not match predecessor"),
            LinkFault::Fork => write!(f, "fork: predecessor already extended"),
            LinkFault::InvalidGenesis => write!(f, "invalid genesis block"),
            LinkFault::MissingBlock => write!(f, "block missing from store"),
            LinkFault::DuplicateBlock => write!(f, "duplicate block"),
            LinkFault::TipMismatch => write!(f, "tip does not match last block"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    PayloadTooLarge { size: usize, max: usize },
    DigestCollision { hash: Sha256Hash },
    BrokenLink { index: usize, hash: Sha256Hash, fault: LinkFault },
    LedgerCorrupted,
    InvalidHash(String),
    DatabaseError(String),
    IoError(String),
    SerializationError(String),
    ConfigError(String),
    DecodeError(String),
    InvalidRecord(String),
}

impl ChainError {
    /// Fatal errors leave the ledger unusable for further appends.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::DigestCollision { .. } | ChainError::LedgerCorrupted)
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::PayloadTooLarge { size, max } => {
                write!(f, "Payload too large: {} bytes (max {})", size, max)
            }
            ChainError::DigestCollision { hash } => {
                write!(f, "Digest collision on {}", hex::encode(hash))
            }
            ChainError::BrokenLink { index, hash, fault } => write!(
                f,
                "Broken link at index {} ({}): {}",
                index,
                hex::encode(hash),
                fault
            ),
            ChainError::LedgerCorrupted => write!(f, "Ledger is corrupted"),
            ChainError::InvalidHash(msg) => write!(f, "Invalid hash: {}", msg),
            ChainError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            ChainError::InvalidRecord(msg) => write!(f, "Invalid record: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
