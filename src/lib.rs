//! ProvChain - a tamper-evident, hash-chained ledger for product provenance
//!
//! # Architecture
//!
//! ## Ledger Core
//! - [`blockchain`] - Blocks, the append-only ledger, chain verification
//! - [`crypto`] - SHA-256 digests and the length-prefixed block encoding
//! - [`shared`] - Single-writer / many-reader ledger handle
//!
//! ## Records & Collaborators
//! - [`record`] - Product records carried as block payloads
//! - [`collaborators`] - Code decoder and presenter contracts, authenticity checks
//!
//! ## Storage
//! - [`interchange`] - Persisted chain files (JSON / bincode)
//! - [`persistence`] - Database layer (SQLite)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities
//!
//! The core modules never log or print; failures come back as [`error::ChainError`].

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Core
// ============================================================================
pub mod blockchain;
pub mod crypto;
pub mod shared;

// ============================================================================
// Records & Collaborators
// ============================================================================
pub mod collaborators;
pub mod record;

// ============================================================================
// Storage
// ============================================================================
pub mod interchange;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;

pub use blockchain::{Block, Ledger};
pub use error::{ChainError, LinkFault, Result};
pub use shared::SharedLedger;
