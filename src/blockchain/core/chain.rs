use crate::crypto::{block_digest, Sha256Hash, GENESIS_PREVIOUS_HASH};
use crate::error::ChainError;
use std::collections::HashMap;
use std::sync::Arc;

use super::state::{ChainSummary, LedgerState};
use super::validation::verify_sequence;

/// Hard upper bound on payload size (1 MiB). Bounds the cost of hashing one block.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Payload of the genesis block.
pub const GENESIS_PAYLOAD: &[u8] = b"START";

/// An immutable record linking a payload to its predecessor.
///
/// The content hash is computed once at construction from `previous_hash`
/// and `payload`; there is no way to change either field afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    previous_hash: Sha256Hash,
    payload: Vec<u8>,
    content_hash: Sha256Hash,
}

impl Block {
    /// Build a block, rejecting payloads above [`MAX_PAYLOAD_SIZE`].
    pub fn new(previous_hash: Sha256Hash, payload: impl Into<Vec<u8>>) -> Result<Self, ChainError> {
        Self::with_limit(previous_hash, payload, MAX_PAYLOAD_SIZE)
    }

    /// Build a block with a caller-supplied payload bound (never above the hard cap).
    pub fn with_limit(
        previous_hash: Sha256Hash,
        payload: impl Into<Vec<u8>>,
        max_payload_bytes: usize,
    ) -> Result<Self, ChainError> {
        let payload = payload.into();
        let max = max_payload_bytes.min(MAX_PAYLOAD_SIZE);
        if payload.len() > max {
            return Err(ChainError::PayloadTooLarge { size: payload.len(), max });
        }
        let content_hash = block_digest(&previous_hash, &payload);
        Ok(Block { previous_hash, payload, content_hash })
    }

    /// The fixed sentinel every chain starts with.
    pub fn genesis() -> Self {
        Block {
            previous_hash: GENESIS_PREVIOUS_HASH,
            payload: GENESIS_PAYLOAD.to_vec(),
            content_hash: block_digest(&GENESIS_PREVIOUS_HASH, GENESIS_PAYLOAD),
        }
    }

    /// Reassemble a block from persisted fields without recomputing the hash.
    /// Only reachable through restore paths, which verify before use.
    pub(crate) fn from_parts(previous_hash: Sha256Hash, payload: Vec<u8>, content_hash: Sha256Hash) -> Self {
        Block { previous_hash, payload, content_hash }
    }

    pub fn previous_hash(&self) -> &Sha256Hash {
        &self.previous_hash
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn content_hash(&self) -> &Sha256Hash {
        &self.content_hash
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH && self.payload == GENESIS_PAYLOAD
    }

    /// Hash recomputed from the block's fields.
    pub fn recompute_hash(&self) -> Sha256Hash {
        block_digest(&self.previous_hash, &self.payload)
    }
}

/// Append-only, hash-chained store of blocks.
///
/// Single writer: [`Ledger::append`] takes `&mut self`. For shared access
/// across threads use [`crate::shared::SharedLedger`].
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks_by_hash: HashMap<Sha256Hash, Arc<Block>>,
    order: Vec<Sha256Hash>,
    tip_hash: Sha256Hash,
    max_payload_bytes: usize,
    state: LedgerState,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create a ledger holding only the genesis block.
    pub fn new() -> Self {
        Self::with_limit(MAX_PAYLOAD_SIZE)
    }

    /// Create a ledger that rejects payloads above `max_payload_bytes`.
    pub fn with_limit(max_payload_bytes: usize) -> Self {
        let genesis = Block::genesis();
        let genesis_hash = *genesis.content_hash();
        let mut blocks_by_hash = HashMap::new();
        blocks_by_hash.insert(genesis_hash, Arc::new(genesis));

        Ledger {
            blocks_by_hash,
            order: vec![genesis_hash],
            tip_hash: genesis_hash,
            max_payload_bytes: max_payload_bytes.min(MAX_PAYLOAD_SIZE),
            state: LedgerState::Consistent,
        }
    }

    /// Rebuild a ledger from blocks in append order (genesis first) and
    /// verify it before handing it out.
    ///
    /// Stored blocks are only held to the hard [`MAX_PAYLOAD_SIZE`] cap;
    /// `max_payload_bytes` applies to later appends.
    pub fn restore(blocks: Vec<Block>, max_payload_bytes: usize) -> Result<Self, ChainError> {
        let order: Vec<Sha256Hash> = blocks.iter().map(|b| *b.content_hash()).collect();
        verify_sequence(order.iter().zip(blocks.iter()).map(|(h, b)| (*h, Some(b))), None)?;

        if let Some(block) = blocks.iter().skip(1).find(|b| b.payload().len() > MAX_PAYLOAD_SIZE) {
            return Err(ChainError::PayloadTooLarge {
                size: block.payload().len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // verify_sequence rejects an empty chain, so the tip always exists.
        let tip_hash = order.last().copied().unwrap_or(GENESIS_PREVIOUS_HASH);
        let blocks_by_hash = blocks
            .into_iter()
            .map(|b| (*b.content_hash(), Arc::new(b)))
            .collect();

        Ok(Ledger {
            blocks_by_hash,
            order,
            tip_hash,
            max_payload_bytes: max_payload_bytes.min(MAX_PAYLOAD_SIZE),
            state: LedgerState::Consistent,
        })
    }

    /// Append a payload as a new block linked to the current tip.
    pub fn append(&mut self, payload: impl Into<Vec<u8>>) -> Result<Arc<Block>, ChainError> {
        if self.state == LedgerState::Corrupted {
            return Err(ChainError::LedgerCorrupted);
        }

        let block = Block::with_limit(self.tip_hash, payload, self.max_payload_bytes)?;
        let hash = *block.content_hash();

        if self.blocks_by_hash.contains_key(&hash) {
            self.state = LedgerState::Corrupted;
            return Err(ChainError::DigestCollision { hash });
        }

        let block = Arc::new(block);
        self.blocks_by_hash.insert(hash, Arc::clone(&block));
        self.order.push(hash);
        self.tip_hash = hash;
        Ok(block)
    }

    /// Walk the chain genesis to tip and fail at the first inconsistent block.
    pub fn verify(&self) -> Result<(), ChainError> {
        verify_sequence(
            self.order
                .iter()
                .map(|h| (*h, self.blocks_by_hash.get(h).map(|b| b.as_ref()))),
            Some(&self.tip_hash),
        )
    }

    pub fn lookup(&self, hash: &Sha256Hash) -> Option<&Block> {
        self.blocks_by_hash.get(hash).map(|b| b.as_ref())
    }

    pub(crate) fn lookup_shared(&self, hash: &Sha256Hash) -> Option<Arc<Block>> {
        self.blocks_by_hash.get(hash).cloned()
    }

    /// Append index of a block (genesis is 0).
    pub fn position(&self, hash: &Sha256Hash) -> Option<usize> {
        if !self.blocks_by_hash.contains_key(hash) {
            return None;
        }
        self.order.iter().position(|h| h == hash)
    }

    /// Blocks in append order, genesis first. Each call starts a fresh walk.
    pub fn iter(&self) -> Blocks<'_> {
        Blocks {
            order: self.order.iter(),
            blocks_by_hash: &self.blocks_by_hash,
        }
    }

    /// First non-genesis block whose payload equals `payload`.
    pub fn find_payload(&self, payload: &[u8]) -> Option<&Block> {
        self.iter().skip(1).find(|b| b.payload() == payload)
    }

    /// Every non-genesis block whose payload contains `needle`.
    pub fn search(&self, needle: &[u8]) -> Vec<&Block> {
        if needle.is_empty() {
            return Vec::new();
        }
        self.iter()
            .skip(1)
            .filter(|b| b.payload().windows(needle.len()).any(|w| w == needle))
            .collect()
    }

    pub fn genesis_hash(&self) -> &Sha256Hash {
        &self.order[0]
    }

    pub fn tip_hash(&self) -> &Sha256Hash {
        &self.tip_hash
    }

    pub fn tip(&self) -> Option<&Block> {
        self.lookup(&self.tip_hash)
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when only the genesis block is present.
    pub fn is_empty(&self) -> bool {
        self.order.len() <= 1
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn summary(&self) -> ChainSummary {
        ChainSummary {
            length: self.order.len(),
            genesis_hash: *self.genesis_hash(),
            tip_hash: self.tip_hash,
            payload_bytes: self.iter().skip(1).map(|b| b.payload().len()).sum(),
            state: self.state,
        }
    }
}

/// Iterator over a ledger's blocks in append order.
pub struct Blocks<'a> {
    order: std::slice::Iter<'a, Sha256Hash>,
    blocks_by_hash: &'a HashMap<Sha256Hash, Arc<Block>>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        // A hash with no block is skipped here; verify() reports it as MissingBlock.
        loop {
            let hash = self.order.next()?;
            if let Some(block) = self.blocks_by_hash.get(hash) {
                return Some(block.as_ref());
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.order.size_hint().1)
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Block;
    type IntoIter = Blocks<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkFault;

    const NIKE: &str = "Nike,Free Runners,12,Black/Red,09/16/2009,Antarctica,1";
    const PUMA: &str = "Puma,Mesh runners,12.5,White/Gray,06/08/2020,Switzerland,2";
    const CONVERSE: &str = "Converse,Low top skater shoes,10,Black/Black,04/25/2012,England,3";

    fn shoe_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.append(NIKE).unwrap();
        ledger.append(PUMA).unwrap();
        ledger.append(CONVERSE).unwrap();
        ledger
    }

    /// Replace the stored block at `index` with one carrying a different payload
    /// but the original hashes, as an out-of-band edit would.
    fn tamper_payload(ledger: &mut Ledger, index: usize, payload: &[u8]) {
        let key = ledger.order[index];
        let original = ledger.blocks_by_hash[&key].clone();
        let forged = Block::from_parts(*original.previous_hash(), payload.to_vec(), *original.content_hash());
        ledger.blocks_by_hash.insert(key, Arc::new(forged));
    }

    #[test]
    fn test_genesis_ledger() {
        let ledger = Ledger::new();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_empty());
        assert_eq!(ledger.genesis_hash(), ledger.tip_hash());
        let genesis = ledger.lookup(ledger.genesis_hash()).unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.previous_hash(), &GENESIS_PREVIOUS_HASH);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_three_shoe_scenario() {
        let mut ledger = Ledger::new();
        ledger.append(NIKE).unwrap();
        ledger.append(PUMA).unwrap();
        let third = ledger.append(CONVERSE).unwrap();

        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.tip_hash(), third.content_hash());
        assert!(ledger.verify().is_ok());
        assert_eq!(ledger.state(), LedgerState::Consistent);
    }

    #[test]
    fn test_append_links_to_previous_tip() {
        let mut ledger = Ledger::new();
        let genesis = *ledger.tip_hash();
        let first = ledger.append("a").unwrap();
        let second = ledger.append("b").unwrap();
        assert_eq!(first.previous_hash(), &genesis);
        assert_eq!(second.previous_hash(), first.content_hash());
    }

    #[test]
    fn test_distinct_payloads_distinct_hashes() {
        let h = *Block::genesis().content_hash();
        let payloads: [&[u8]; 6] = [b"", b"a", b"a\0", b"--", b"!!--", &8u64.to_le_bytes()];
        let hashes: std::collections::HashSet<_> = payloads
            .iter()
            .map(|p| *Block::new(h, p.to_vec()).unwrap().content_hash())
            .collect();
        assert_eq!(hashes.len(), payloads.len());
    }

    #[test]
    fn test_delimiter_payload_does_not_forge_linkage() {
        // "!!" + tx + "--" + prev concatenation: moving "--<hash>" between the
        // payload and the link field yields identical naive bytes.
        let naive = |tx: &str, prev: &str| format!("!!{}--{}", tx, prev);
        let genesis_hash = *Block::genesis().content_hash();
        let gen_hex = hex::encode(genesis_hash);
        let hex_other = hex::encode(crate::crypto::sha256(b"another block"));

        let payload_a = format!("shoe--{}", hex_other);
        let split_prev = format!("{}--{}", hex_other, gen_hex);
        assert_eq!(naive(&payload_a, &gen_hex), naive("shoe", &split_prev));

        let split_a = crate::crypto::encode_fields(&[payload_a.as_bytes(), gen_hex.as_bytes()]);
        let split_b = crate::crypto::encode_fields(&[b"shoe", split_prev.as_bytes()]);
        assert_ne!(split_a, split_b);

        let a = Block::new(genesis_hash, payload_a.clone()).unwrap();
        let b = Block::new(genesis_hash, "shoe").unwrap();
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_payload_too_large() {
        let mut ledger = Ledger::with_limit(4);
        let err = ledger.append("12345").unwrap_err();
        assert_eq!(err, ChainError::PayloadTooLarge { size: 5, max: 4 });
        assert_eq!(ledger.len(), 1);
        assert!(ledger.append("1234").is_ok());
    }

    #[test]
    fn test_limit_is_capped() {
        let ledger = Ledger::with_limit(usize::MAX);
        assert_eq!(ledger.max_payload_bytes(), MAX_PAYLOAD_SIZE);
        let big = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Block::new(GENESIS_PREVIOUS_HASH, big),
            Err(ChainError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_tamper_detected_at_index() {
        for index in 1..4 {
            let mut ledger = shoe_ledger();
            tamper_payload(&mut ledger, index, b"Fake,Knockoff,9,Pink,01/01/2020,Nowhere,0");
            match ledger.verify() {
                Err(ChainError::BrokenLink { index: at, hash, fault }) => {
                    assert_eq!(at, index);
                    assert_eq!(hash, ledger.order[index]);
                    assert_eq!(fault, LinkFault::HashMismatch);
                }
                other => panic!("expected BrokenLink, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_tampered_genesis_detected() {
        let mut ledger = shoe_ledger();
        tamper_payload(&mut ledger, 0, b"STOP");
        assert!(matches!(
            ledger.verify(),
            Err(ChainError::BrokenLink { index: 0, .. })
        ));
    }

    #[test]
    fn test_digest_collision_marks_corrupted() {
        let mut ledger = Ledger::new();
        // Plant the hash the next append will compute.
        let next = Block::new(*ledger.tip_hash(), "dup").unwrap();
        ledger
            .blocks_by_hash
            .insert(*next.content_hash(), Arc::new(next.clone()));

        let err = ledger.append("dup").unwrap_err();
        assert!(matches!(err, ChainError::DigestCollision { .. }));
        assert!(err.is_fatal());
        assert_eq!(ledger.state(), LedgerState::Corrupted);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.append("other").unwrap_err(), ChainError::LedgerCorrupted);
    }

    #[test]
    fn test_lookup() {
        let ledger = shoe_ledger();
        assert!(ledger.lookup(&[7u8; 32]).is_none());
        assert!(ledger.lookup(ledger.genesis_hash()).unwrap().is_genesis());
        let tip = ledger.tip().unwrap();
        assert_eq!(tip.payload_str(), Some(CONVERSE));
        assert_eq!(ledger.position(ledger.tip_hash()), Some(3));
        assert_eq!(ledger.position(&[7u8; 32]), None);
    }

    #[test]
    fn test_iter_is_restartable() {
        let ledger = shoe_ledger();
        let first: Vec<_> = ledger.iter().map(|b| *b.content_hash()).collect();
        let second: Vec<_> = ledger.iter().map(|b| *b.content_hash()).collect();
        assert_eq!(first, second);
        assert_eq!(first, ledger.order);
        assert!(ledger.iter().next().unwrap().is_genesis());
        assert_eq!((&ledger).into_iter().count(), 4);
    }

    #[test]
    fn test_find_and_search() {
        let ledger = shoe_ledger();
        assert_eq!(ledger.find_payload(PUMA.as_bytes()).unwrap().payload_str(), Some(PUMA));
        assert!(ledger.find_payload(b"START").is_none());
        assert_eq!(ledger.search(b"Black").len(), 2);
        assert!(ledger.search(b"").is_empty());
    }

    #[test]
    fn test_restore_roundtrip_and_tamper() {
        let ledger = shoe_ledger();
        let blocks: Vec<Block> = ledger.iter().cloned().collect();
        let restored = Ledger::restore(blocks.clone(), MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(restored.tip_hash(), ledger.tip_hash());
        assert_eq!(restored.len(), 4);

        let mut tampered = blocks;
        let b = &tampered[2];
        tampered[2] = Block::from_parts(*b.previous_hash(), b"forged".to_vec(), *b.content_hash());
        assert!(matches!(
            Ledger::restore(tampered, MAX_PAYLOAD_SIZE),
            Err(ChainError::BrokenLink { index: 2, fault: LinkFault::HashMismatch, .. })
        ));
    }

    #[test]
    fn test_restore_after_lowering_limit() {
        let mut ledger = Ledger::new();
        ledger.append(vec![7u8; 100]).unwrap();
        let blocks: Vec<Block> = ledger.iter().cloned().collect();

        let mut restored = Ledger::restore(blocks, 10).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.max_payload_bytes(), 10);
        assert!(restored.verify().is_ok());

        assert_eq!(
            restored.append(vec![7u8; 11]).unwrap_err(),
            ChainError::PayloadTooLarge { size: 11, max: 10 }
        );
        assert!(restored.append(vec![7u8; 10]).is_ok());
    }

    #[test]
    fn test_restore_rejects_empty() {
        assert!(matches!(
            Ledger::restore(Vec::new(), MAX_PAYLOAD_SIZE),
            Err(ChainError::BrokenLink { index: 0, fault: LinkFault::InvalidGenesis, .. })
        ));
    }

    #[test]
    fn test_summary() {
        let ledger = shoe_ledger();
        let summary = ledger.summary();
        assert_eq!(summary.length, 4);
        assert_eq!(summary.tip_hash, *ledger.tip_hash());
        assert_eq!(summary.payload_bytes, NIKE.len() + PUMA.len() + CONVERSE.len());
    }
}
