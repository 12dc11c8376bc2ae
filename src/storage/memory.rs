use crate::error::{Error, Result};
use crate::storage::{ensure_parent_is_tip, Storage};
use crate::Digest;
use std::collections::HashMap;

/// In-process storage. Nothing survives a drop.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    blocks: HashMap<Digest, Vec<u8>>,
    tip: Option<Digest>,
    difficulty: Option<u32>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Overwrite stored bytes without touching the tip. Test hook for corruption scenarios.
    pub fn put_raw(&mut self, digest: &[u8], bytes: Vec<u8>) {
        self.blocks.insert(digest.to_vec(), bytes);
    }

    /// Force the tip pointer. Test hook for corruption scenarios.
    pub fn set_tip_raw(&mut self, tip: Option<Digest>) {
        self.tip = tip;
    }
}

impl Storage for MemoryStorage {
    fn last_hash(&self) -> Result<Option<Digest>> {
        Ok(self.tip.clone())
    }

    fn get(&self, digest: &[u8]) -> Result<Vec<u8>> {
        self.blocks
            .get(digest)
            .cloned()
            .ok_or_else(|| Error::NotFound(hex::encode(digest)))
    }

    fn save_block(&mut self, digest: &[u8], bytes: &[u8], parent: &[u8]) -> Result<()> {
        ensure_parent_is_tip(self.tip.as_deref(), parent)?;
        self.blocks.insert(digest.to_vec(), bytes.to_vec());
        self.tip = Some(digest.to_vec());
        Ok(())
    }

    fn difficulty(&self) -> Result<Option<u32>> {
        Ok(self.difficulty)
    }

    fn record_difficulty(&mut self, difficulty: u32) -> Result<()> {
        self.difficulty = Some(difficulty);
        Ok(())
    }
}
