//! Observer: injectable trace sink for chain lifecycle events.
//!
//! `Chain<S, O: ChainObserver>` reports what it did through the observer and
//! never logs by itself. `TracingObserver` forwards events to `tracing`.

use crate::chain::block::Block;
use crate::digest_label;
use std::time::Duration;

/// Callbacks fired after each chain operation step. All default to no-ops.
pub trait ChainObserver {
    /// Storage already had a tip; nothing was created.
    fn on_resumed(&mut self, _tip: &[u8]) {}

    /// A genesis block was sealed and persisted.
    fn on_genesis_created(&mut self, _genesis: &Block) {}

    /// The cached tip was re-read from storage.
    fn on_tip_refreshed(&mut self, _tip: Option<&[u8]>) {}

    /// A block finished the nonce search.
    fn on_block_sealed(&mut self, _block: &Block, _elapsed: Duration) {}

    /// A block was persisted and became the tip.
    fn on_block_appended(&mut self, _block: &Block) {}

    /// Traversal ended, successfully or not, after `visited` blocks.
    fn on_traversal_finished(&mut self, _visited: usize, _ok: bool) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl ChainObserver for NoOpObserver {}

/// Observer emitting structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ChainObserver for TracingObserver {
    fn on_resumed(&mut self, tip: &[u8]) {
        tracing::info!(tip = %digest_label(tip), "resumed existing chain");
    }

    fn on_genesis_created(&mut self, genesis: &Block) {
        tracing::info!(
            digest = %genesis.digest_hex(),
            nonce = genesis.nonce(),
            "created genesis block"
        );
    }

    fn on_tip_refreshed(&mut self, tip: Option<&[u8]>) {
        match tip {
            Some(tip) => tracing::debug!(tip = %digest_label(tip), "refreshed tip"),
            None => tracing::debug!("refreshed tip: chain is empty"),
        }
    }

    fn on_block_sealed(&mut self, block: &Block, elapsed: Duration) {
        tracing::debug!(
            digest = %block.digest_hex(),
            nonce = block.nonce(),
            elapsed_ms = elapsed.as_millis() as u64,
            "sealed block"
        );
    }

    fn on_block_appended(&mut self, block: &Block) {
        tracing::info!(
            digest = %block.digest_hex(),
            link = %digest_label(block.link()),
            "appended block"
        );
    }

    fn on_traversal_finished(&mut self, visited: usize, ok: bool) {
        if ok {
            tracing::debug!(visited, "traversal finished");
        } else {
            tracing::warn!(visited, "traversal aborted");
        }
    }
}
