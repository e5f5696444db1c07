//! Chain connectivity contract.
//!
//! The engine never holds a process-wide RPC singleton — a [`ChainClient`]
//! instance is passed to the block processor explicitly. Transport concerns
//! (RPC wire format, key management, call encoding) live behind this trait.

use async_trait::async_trait;

use tokenmirror_core::error::IndexerError;
use tokenmirror_core::types::{BlockHash, ProcessRanEvent};

/// Header data the fork walk needs: position and parent linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub hash: BlockHash,
    pub height: u64,
    pub parent: BlockHash,
}

/// Read access to the finalized chain.
///
/// Finality is assumed: a hash returned by [`last_finalized_hash`] will
/// never be reverted, though notifications may arrive at-least-once and may
/// skip intermediate heights.
///
/// [`last_finalized_hash`]: ChainClient::last_finalized_hash
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Hash of the most recently finalized block.
    async fn last_finalized_hash(&self) -> Result<BlockHash, IndexerError>;

    /// Header of an arbitrary block by hash.
    async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeader, IndexerError>;

    /// The decoded `ProcessRan` events of a block, in on-chain order.
    /// Order is causally significant: later events may consume tokens
    /// minted by earlier ones.
    async fn block_events(&self, hash: &BlockHash) -> Result<Vec<ProcessRanEvent>, IndexerError>;
}
