//! Boundary contracts for collaborators outside the ledger core
//!
//! - [`PayloadDecoder`]: turns captured image bytes (a scanned product code)
//!   into at most one text string.
//! - [`Presenter`]: shows a decoded string next to the matching block.
//!
//! The ledger never interprets payloads; [`authenticate`] is the one place
//! that ties a decoded string back to a block.

use crate::blockchain::{Block, Ledger};
use crate::crypto::hash_from_hex;
use crate::error::ChainError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input holds no decodable code.
    NotFound,
    /// The input was recognised but could not be decoded.
    Malformed(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::NotFound => write!(f, "no code found"),
            DecodeError::Malformed(msg) => write!(f, "malformed code: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for ChainError {
    fn from(err: DecodeError) -> Self {
        ChainError::DecodeError(err.to_string())
    }
}

/// Image/code decoder.
pub trait PayloadDecoder {
    fn decode(&self, image: &[u8]) -> Result<String, DecodeError>;
}

/// Decoder for codes that were already decoded to text (e.g. a scanner's
/// output file). Surrounding whitespace is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextDecoder;

impl PayloadDecoder for PlainTextDecoder {
    fn decode(&self, image: &[u8]) -> Result<String, DecodeError> {
        let text = std::str::from_utf8(image).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DecodeError::NotFound);
        }
        Ok(text.to_string())
    }
}

/// Display sink for authenticity results.
pub trait Presenter {
    fn present(&mut self, decoded: &str, block: Option<&Block>) -> Result<(), ChainError>;
}

/// Outcome of checking a scanned code against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authenticity<'a> {
    /// The code names a block on the verified chain.
    Genuine { code: String, index: usize, block: &'a Block },
    /// The code decoded, but nothing on the chain matches it.
    Unknown(String),
    /// The input held no code.
    Unreadable,
}

impl Authenticity<'_> {
    pub fn is_genuine(&self) -> bool {
        matches!(self, Authenticity::Genuine { .. })
    }
}

/// Resolve decoded text to a block: a 64-hex-digit content hash is looked up
/// directly, otherwise (or on a miss) the text must equal a payload exactly.
pub fn resolve<'a>(ledger: &'a Ledger, decoded: &str) -> Option<(usize, &'a Block)> {
    if decoded.len() == 64 {
        if let Ok(hash) = hash_from_hex(decoded) {
            // Genesis is a sentinel, not a product.
            let by_hash = ledger
                .position(&hash)
                .filter(|&i| i > 0)
                .and_then(|i| ledger.lookup(&hash).map(|b| (i, b)));
            if by_hash.is_some() {
                return by_hash;
            }
        }
    }
    let block = ledger.find_payload(decoded.as_bytes())?;
    ledger.position(block.content_hash()).map(|i| (i, block))
}

/// Decode `image` and check it against `ledger`.
///
/// The chain is verified first; a broken chain cannot vouch for anything and
/// the `BrokenLink` error is returned instead of a verdict.
pub fn authenticate<'a>(
    ledger: &'a Ledger,
    decoder: &dyn PayloadDecoder,
    image: &[u8],
) -> Result<Authenticity<'a>, ChainError> {
    ledger.verify()?;

    let decoded = match decoder.decode(image) {
        Ok(text) => text,
        Err(DecodeError::NotFound) => return Ok(Authenticity::Unreadable),
        Err(e) => return Err(e.into()),
    };

    Ok(match resolve(ledger, &decoded) {
        Some((index, block)) => Authenticity::Genuine { code: decoded, index, block },
        None => Authenticity::Unknown(decoded),
    })
}

/// Authenticate and hand the result to `presenter`.
pub fn authenticate_and_present<'a>(
    ledger: &'a Ledger,
    decoder: &dyn PayloadDecoder,
    presenter: &mut dyn Presenter,
    image: &[u8],
) -> Result<Authenticity<'a>, ChainError> {
    let verdict = authenticate(ledger, decoder, image)?;
    match &verdict {
        Authenticity::Genuine { code, block, .. } => presenter.present(code, Some(*block))?,
        Authenticity::Unknown(text) => presenter.present(text, None)?,
        Authenticity::Unreadable => {}
    }
    Ok(verdict)
}
