use crate::crypto::{Sha256Hash, GENESIS_PREVIOUS_HASH};
use crate::error::{ChainError, LinkFault};
use std::collections::HashSet;

use super::chain::{Block, GENESIS_PAYLOAD};

fn broken(index: usize, hash: Sha256Hash, fault: LinkFault) -> ChainError {
    ChainError::BrokenLink { index, hash, fault }
}

/// Verify an append-ordered sequence of `(stored_hash, block)` entries.
///
/// `stored_hash` is the key the block is filed under; `None` means the key
/// has no block behind it. Fails at the first bad entry. When `tip` is given
/// it must equal the last stored hash.
pub fn verify_sequence<'a, I>(entries: I, tip: Option<&Sha256Hash>) -> Result<(), ChainError>
where
    I: IntoIterator<Item = (Sha256Hash, Option<&'a Block>)>,
{
    let mut seen: HashSet<Sha256Hash> = HashSet::new();
    let mut extended: HashSet<Sha256Hash> = HashSet::new();
    let mut previous: Option<Sha256Hash> = None;
    let mut count = 0usize;

    for (index, (stored_hash, block)) in entries.into_iter().enumerate() {
        count = index + 1;
        let block = block.ok_or_else(|| broken(index, stored_hash, LinkFault::MissingBlock))?;

        if !seen.insert(stored_hash) {
            return Err(broken(index, stored_hash, LinkFault::DuplicateBlock));
        }

        if block.recompute_hash() != stored_hash || *block.content_hash() != stored_hash {
            return Err(broken(index, stored_hash, LinkFault::HashMismatch));
        }

        match previous {
            None => {
                if *block.previous_hash() != GENESIS_PREVIOUS_HASH || block.payload() != GENESIS_PAYLOAD {
                    return Err(broken(index, stored_hash, LinkFault::InvalidGenesis));
                }
            }
            Some(prev) => {
                if *block.previous_hash() != prev {
                    let fault = if extended.contains(block.previous_hash()) {
                        LinkFault::Fork
                    } else {
                        LinkFault::LinkMismatch
                    };
                    return Err(broken(index, stored_hash, fault));
                }
            }
        }

        extended.insert(*block.previous_hash());
        previous = Some(stored_hash);
    }

    let last = previous.ok_or_else(|| broken(0, GENESIS_PREVIOUS_HASH, LinkFault::InvalidGenesis))?;

    if let Some(tip) = tip {
        if *tip != last {
            return Err(broken(count - 1, *tip, LinkFault::TipMismatch));
        }
    }

    Ok(())
}

/// Index of the first block that fails verification, if any.
pub fn first_broken_index(blocks: &[Block]) -> Option<usize> {
    match verify_sequence(blocks.iter().map(|b| (*b.content_hash(), Some(b))), None) {
        Err(ChainError::BrokenLink { index, .. }) => Some(index),
        _ => None,
    }
}
