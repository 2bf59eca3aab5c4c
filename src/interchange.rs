//! Persisted interchange format
//!
//! A chain file is the genesis block followed by every appended block, each
//! as `{previous_hash, payload, content_hash}` with hex digests. Files are
//! written atomically (temp file + rename) and keep a `.backup` of the
//! previous version. Loading always verifies the chain before returning it.

use crate::blockchain::{Block, Ledger};
use crate::crypto::{hash_from_hex, hash_to_hex};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const FORMAT_VERSION: u32 = 1;
const BACKUP_SUFFIX: &str = "backup";

/// One block as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub previous_hash: String,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    pub content_hash: String,
}

impl BlockRecord {
    pub fn from_block(block: &Block) -> Self {
        BlockRecord {
            previous_hash: hash_to_hex(block.previous_hash()),
            payload: block.payload().to_vec(),
            content_hash: hash_to_hex(block.content_hash()),
        }
    }

    /// Decode the hex fields. The recorded content hash is kept as-is, so a
    /// tampered record surfaces later as a verification failure.
    pub fn to_block(&self) -> Result<Block, ChainError> {
        Ok(Block::from_parts(
            hash_from_hex(&self.previous_hash)?,
            self.payload.clone(),
            hash_from_hex(&self.content_hash)?,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Binary,
}

impl FileFormat {
    /// `.bin` and `.bincode` are binary, everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => FileFormat::Binary,
            _ => FileFormat::Json,
        }
    }
}

/// A whole persisted ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFile {
    pub format_version: u32,
    /// RFC 3339 export time.
    pub exported_at: String,
    pub blocks: Vec<BlockRecord>,
}

impl ChainFile {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        ChainFile {
            format_version: FORMAT_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            blocks: ledger.iter().map(BlockRecord::from_block).collect(),
        }
    }

    /// Decode and verify. Fails with `BrokenLink` on any tampering.
    pub fn into_ledger(self, max_payload_bytes: usize) -> Result<Ledger, ChainError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ChainError::SerializationError(format!(
                "Unsupported chain file version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        let blocks = self
            .blocks
            .iter()
            .map(BlockRecord::to_block)
            .collect::<Result<Vec<_>, _>>()?;
        Ledger::restore(blocks, max_payload_bytes)
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn encode(&self, format: FileFormat) -> Result<Vec<u8>, ChainError> {
        match format {
            FileFormat::Json => self.to_json().map(String::into_bytes),
            FileFormat::Binary => self.to_bincode(),
        }
    }

    pub fn decode(bytes: &[u8], format: FileFormat) -> Result<Self, ChainError> {
        match format {
            FileFormat::Json => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| ChainError::SerializationError(format!("Chain file is not UTF-8: {}", e)))?;
                Self::from_json(text)
            }
            FileFormat::Binary => Self::from_bincode(bytes),
        }
    }
}

/// `path` with `.suffix` added after its full file name (`chain.json` -> `chain.json.backup`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Where [`save_ledger`] keeps the previous version of `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

/// Write `ledger` to `path` atomically, keeping a backup of any existing file.
pub fn save_ledger(ledger: &Ledger, path: &Path, format: FileFormat) -> Result<(), ChainError> {
    let bytes = ChainFile::from_ledger(ledger).encode(format)?;

    if path.exists() {
        let backup_path = backup_path(path);
        fs::copy(path, &backup_path)?;
        debug!(backup = %backup_path.display(), "Backed up existing chain file");
    }

    let temp_path = with_suffix(path, "tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, path)?;

    info!(path = %path.display(), blocks = ledger.len(), "Saved chain file");
    Ok(())
}

/// Read and verify a chain file.
pub fn load_ledger(path: &Path, format: FileFormat, max_payload_bytes: usize) -> Result<Ledger, ChainError> {
    let bytes = fs::read(path)?;
    let ledger = ChainFile::decode(&bytes, format)?.into_ledger(max_payload_bytes)?;
    info!(path = %path.display(), blocks = ledger.len(), "Loaded and verified chain file");
    Ok(ledger)
}
