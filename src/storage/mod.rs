pub mod kv;
pub mod memory;

pub use kv::FileStorage;
pub use memory::MemoryStorage;

use crate::error::{Error, Result};
use crate::{digest_label, Digest};

/// Key-value persistence for sealed blocks, keyed by digest, plus one tip pointer.
///
/// Implementations must preserve:
/// - Atomicity per key: a `get` never observes a half-written block or tip
/// - `save_block` refuses to write when `parent` is no longer the recorded tip
/// - The tip only moves after the block bytes are durable
///
/// The block write and the tip update are two separate steps. A crash between
/// them leaves the block stored but unreachable from the tip.
///
/// The parent check in `save_block` is only as strong as the implementation's
/// own exclusion: it holds for writers sharing one store value, not for
/// separate processes opening the same files.
pub trait Storage {
    /// Digest of the most recently saved block, `None` for an empty store.
    fn last_hash(&self) -> Result<Option<Digest>>;

    /// Raw bytes previously saved under `digest`. `Error::NotFound` when absent.
    fn get(&self, digest: &[u8]) -> Result<Vec<u8>>;

    /// Persist `bytes` under `digest` and make it the tip.
    ///
    /// `parent` is the tip the block was sealed on top of (empty for genesis).
    /// Fails with `Error::TipConflict` if the recorded tip differs.
    fn save_block(&mut self, digest: &[u8], bytes: &[u8], parent: &[u8]) -> Result<()>;

    /// Difficulty the chain was created with, `None` if none was recorded.
    fn difficulty(&self) -> Result<Option<u32>>;

    /// Record the chain's difficulty. Written once, before genesis is sealed.
    fn record_difficulty(&mut self, difficulty: u32) -> Result<()>;

    /// Resume the recorded tip, or persist the block produced by `genesis`.
    ///
    /// `genesis` returns `(digest, encoded block)` and is only invoked when the
    /// store is empty.
    fn init<F>(&mut self, genesis: F) -> Result<Digest>
    where
        Self: Sized,
        F: FnOnce() -> Result<(Digest, Vec<u8>)>,
    {
        if let Some(tip) = self.last_hash()? {
            return Ok(tip);
        }
        let (digest, bytes) = genesis()?;
        self.save_block(&digest, &bytes, &[])?;
        Ok(digest)
    }
}

/// Compare the recorded tip with the parent a writer sealed against.
pub(crate) fn ensure_parent_is_tip(recorded: Option<&[u8]>, parent: &[u8]) -> Result<()> {
    let recorded = recorded.unwrap_or(&[]);
    if recorded != parent {
        return Err(Error::TipConflict {
            expected: digest_label(parent),
            actual: digest_label(recorded),
        });
    }
    Ok(())
}
