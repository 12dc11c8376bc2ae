//! Chain orchestration: genesis bootstrap, append, lookup and backward traversal.
//!
//! `Chain` owns the sealing parameters and a cached copy of the storage tip.
//! Every operation that needs the tip re-reads it from storage first, and every
//! mutating operation returns the new tip so callers can thread it explicitly.

use crate::chain::block::Block;
use crate::chain::cancel::CancelToken;
use crate::chain::consensus::ProofOfWork;
use crate::chain::observer::{ChainObserver, NoOpObserver};
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::{digest_label, Digest, DIGEST_LEN};
use std::collections::HashSet;
use std::iter::FusedIterator;
use std::time::{Duration, Instant};

pub struct Chain<S: Storage, O: ChainObserver = NoOpObserver> {
    storage: S,
    pow: ProofOfWork,
    tip: Option<Digest>,
    cancel: CancelToken,
    mining_timeout: Option<Duration>,
    observer: O,
}

impl<S: Storage> Chain<S, NoOpObserver> {
    pub fn new(storage: S, pow: ProofOfWork) -> Self {
        Chain::with_observer(storage, pow, NoOpObserver)
    }
}

impl<S: Storage, O: ChainObserver> Chain<S, O> {
    pub fn with_observer(storage: S, pow: ProofOfWork, observer: O) -> Self {
        Chain {
            storage,
            pow,
            tip: None,
            cancel: CancelToken::new(),
            mining_timeout: None,
            observer,
        }
    }

    /// Bound every nonce search by `timeout`.
    pub fn with_mining_timeout(mut self, timeout: Duration) -> Self {
        self.mining_timeout = Some(timeout);
        self
    }

    /// Token that aborts any current and future search when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cached tip as of the last refresh or append.
    pub fn tip(&self) -> Option<&[u8]> {
        self.tip.as_deref()
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    fn seal_token(&self) -> CancelToken {
        match self.mining_timeout {
            Some(timeout) => self.cancel.child_with_timeout(timeout),
            None => self.cancel.clone(),
        }
    }

    /// Stored tip, rejecting anything that cannot be a block digest.
    fn read_tip(&self) -> Result<Option<Digest>> {
        match self.storage.last_hash()? {
            Some(tip) if tip.len() != DIGEST_LEN => Err(Error::Storage(format!(
                "recorded tip {} is not a {}-byte digest",
                digest_label(&tip),
                DIGEST_LEN
            ))),
            tip => Ok(tip),
        }
    }

    /// Fail unless the store was created at this chain's difficulty.
    fn ensure_difficulty(&self) -> Result<()> {
        let configured = self.pow.difficulty();
        match self.storage.difficulty()? {
            Some(recorded) if recorded != configured => {
                Err(Error::DifficultyMismatch { recorded, configured })
            }
            Some(_) => Ok(()),
            None => Err(Error::NotInitialized),
        }
    }

    /// Resume the stored chain, or seal and persist a genesis block whose
    /// payload comes from `genesis_payload`. Returns the tip digest.
    ///
    /// The difficulty is recorded before genesis is sealed and checked on every
    /// later `init`, so a chain never mixes targets.
    pub fn init<F>(&mut self, genesis_payload: F) -> Result<Digest>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if self.storage.difficulty()?.is_none() {
            self.storage.record_difficulty(self.pow.difficulty())?;
        }
        self.ensure_difficulty()?;

        let token = self.seal_token();
        let pow = &self.pow;
        let mut created = None;

        let tip = self.storage.init(|| {
            let genesis = Block::build(genesis_payload()?, Vec::new(), pow, &token)?;
            let bytes = genesis.serialize()?;
            let digest = genesis.digest().to_vec();
            created = Some(genesis);
            Ok((digest, bytes))
        })?;

        match &created {
            Some(genesis) => self.observer.on_genesis_created(genesis),
            None => self.observer.on_resumed(&tip),
        }
        self.tip = Some(tip.clone());
        Ok(tip)
    }

    /// Re-read the tip from storage into the cache.
    pub fn refresh_tip(&mut self) -> Result<Option<Digest>> {
        let tip = self.read_tip()?;
        self.observer.on_tip_refreshed(tip.as_deref());
        self.tip = tip.clone();
        Ok(tip)
    }

    /// Seal `payload` on top of the current stored tip.
    pub fn append(&mut self, payload: Vec<u8>) -> Result<Block> {
        let parent = self.refresh_tip()?.ok_or(Error::NotInitialized)?;
        self.append_after(&parent, payload)
    }

    /// Seal `payload` on top of `parent`, which must still be the stored tip.
    ///
    /// The parent is checked before sealing and again by storage at save time,
    /// so a writer that moved the tip in between yields `TipConflict`.
    pub fn append_after(&mut self, parent: &[u8], payload: Vec<u8>) -> Result<Block> {
        // Only init may create a block with the empty link
        if parent.is_empty() {
            return Err(Error::NotInitialized);
        }
        match self.read_tip()? {
            None => return Err(Error::NotInitialized),
            Some(recorded) if recorded != parent => {
                return Err(Error::TipConflict {
                    expected: digest_label(parent),
                    actual: digest_label(&recorded),
                })
            }
            Some(_) => {}
        }
        self.ensure_difficulty()?;

        let token = self.seal_token();
        let started = Instant::now();
        let block = Block::build(payload, parent.to_vec(), &self.pow, &token)?;
        self.observer.on_block_sealed(&block, started.elapsed());

        let bytes = block.serialize()?;
        self.storage.save_block(block.digest(), &bytes, parent)?;

        self.tip = Some(block.digest().to_vec());
        self.observer.on_block_appended(&block);
        Ok(block)
    }

    /// Fetch and decode the block stored under `digest`.
    pub fn get_block(&self, digest: &[u8]) -> Result<Block> {
        let bytes = self.storage.get(digest)?;
        Block::deserialize(&bytes)
    }

    /// Refresh the tip and return its block.
    pub fn tip_block(&mut self) -> Result<Block> {
        let tip = self.refresh_tip()?.ok_or(Error::NotInitialized)?;
        self.get_block(&tip)
    }

    /// Refresh the tip and iterate from it back to genesis.
    pub fn blocks(&mut self) -> Result<ChainIter<'_, S>> {
        self.refresh_tip()?;
        Ok(ChainIter::new(&self.storage, self.tip.clone()))
    }

    /// Visit every block newest-first, between `before` and `after`.
    ///
    /// `after` runs exactly once whenever `before` ran: on success, on an empty
    /// chain, and after a failed lookup. Returns the number of visited blocks.
    pub fn traverse<V, B, A>(&mut self, mut visit: V, before: B, after: A) -> Result<usize>
    where
        V: FnMut(&Block),
        B: FnOnce(),
        A: FnOnce(),
    {
        self.refresh_tip()?;
        before();

        let mut visited = 0;
        let mut outcome = Ok(());
        for block in ChainIter::new(&self.storage, self.tip.clone()) {
            match block {
                Ok(block) => {
                    visit(&block);
                    visited += 1;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        after();
        self.observer.on_traversal_finished(visited, outcome.is_ok());
        outcome.map(|()| visited)
    }

    /// Walk the whole chain re-checking each block's key, seal and difficulty.
    /// Returns the chain length, 0 for an uninitialized chain.
    pub fn verify(&mut self) -> Result<usize> {
        let mut expected = match self.refresh_tip()? {
            Some(tip) => tip,
            None => return Ok(0),
        };
        let configured = self.pow.difficulty();
        if let Some(recorded) = self.storage.difficulty()? {
            if recorded != configured {
                return Err(Error::DifficultyMismatch { recorded, configured });
            }
        }

        let mut length = 0;
        for block in ChainIter::new(&self.storage, Some(expected.clone())) {
            let block = block?;
            if block.digest() != expected.as_slice() {
                return Err(Error::InvalidBlock(format!(
                    "block stored under {} has digest {}",
                    hex::encode(&expected),
                    block.digest_hex()
                )));
            }
            if !self.pow.validate(&block) {
                return Err(Error::InvalidBlock(format!(
                    "block {} fails proof-of-work",
                    block.digest_hex()
                )));
            }
            length += 1;
            expected = block.link().to_vec();
        }
        Ok(length)
    }
}

/// Backward iterator from a tip to genesis.
///
/// Yields `Err` once on a failed lookup, a decode failure or a revisited
/// digest, and then stops.
pub struct ChainIter<'a, S: Storage> {
    storage: &'a S,
    next: Option<Digest>,
    seen: HashSet<Digest>,
}

impl<'a, S: Storage> ChainIter<'a, S> {
    pub fn new(storage: &'a S, start: Option<Digest>) -> Self {
        ChainIter {
            storage,
            next: start,
            seen: HashSet::new(),
        }
    }
}

impl<'a, S: Storage> Iterator for ChainIter<'a, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let digest = self.next.take()?;
        if !self.seen.insert(digest.clone()) {
            return Some(Err(Error::CycleDetected(hex::encode(&digest))));
        }

        let block = match self.storage.get(&digest).and_then(|bytes| Block::deserialize(&bytes)) {
            Ok(block) => block,
            Err(e) => return Some(Err(e)),
        };
        if !block.is_genesis() {
            self.next = Some(block.link().to_vec());
        }
        Some(Ok(block))
    }
}

impl<'a, S: Storage> FusedIterator for ChainIter<'a, S> {}
