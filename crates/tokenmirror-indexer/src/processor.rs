//! Block processor — resolves the path from the last processed block to a
//! newly finalized tip (tolerating forks and skipped notifications), folds
//! each block's events into one ChangeSet, and commits block by block.
//!
//! Per chain there is exactly one in-flight commit at a time: applying
//! blocks takes `&mut self`, and the watch loop drives a single processor
//! from a single task. Status reads go through shared storage and stay
//! concurrent.

use std::sync::Arc;

use chrono::Utc;

use tokenmirror_core::changeset::ChangeSet;
use tokenmirror_core::error::IndexerError;
use tokenmirror_core::handler::handle_event;
use tokenmirror_core::processors::ProcessorRegistry;
use tokenmirror_core::storage::IndexerStorage;
use tokenmirror_core::types::{BlockHash, ProcessedBlock, UnprocessedBlock};

use crate::builder::IndexerConfig;
use crate::chain::ChainClient;

/// Snapshot of indexer progress for status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerStatus {
    pub chain: String,
    pub height: Option<u64>,
    pub hash: Option<BlockHash>,
}

/// Drives event reconciliation for one monitored chain.
pub struct BlockProcessor<C> {
    client: C,
    storage: Arc<dyn IndexerStorage>,
    registry: ProcessorRegistry,
    config: IndexerConfig,
}

impl<C: ChainClient> BlockProcessor<C> {
    pub fn new(
        client: C,
        storage: Arc<dyn IndexerStorage>,
        registry: ProcessorRegistry,
        config: IndexerConfig,
    ) -> Self {
        Self {
            client,
            storage,
            registry,
            config,
        }
    }

    /// Handle a finalized-block notification for `tip`.
    ///
    /// Walks ancestors back to the last processed block (recording each as
    /// an unprocessed block), then replays the recorded path in ascending
    /// height order, committing one atomic transaction per block. Returns
    /// the number of blocks applied.
    ///
    /// On failure the last-processed pointer has advanced only past the
    /// blocks that committed; the failed block and everything above it stay
    /// unprocessed and are retried on the next notification or poll.
    pub async fn handle_finalized(&mut self, tip: &BlockHash) -> Result<u64, IndexerError> {
        if let Some(last) = self.storage.last_processed_block().await? {
            if &last.hash == tip {
                tracing::trace!(chain = %self.config.chain, tip = %tip, "tip already processed");
                return Ok(0);
            }
        }

        let path = self.record_path(tip).await?;
        tracing::debug!(
            chain = %self.config.chain,
            blocks = path.len(),
            tip = %tip,
            "ancestor walk recorded"
        );

        // Only blocks on the walked path are ever applied. Persisted
        // leftovers from an interrupted earlier walk are re-derived by the
        // next walk (it reuses recorded rows); a stale sibling that shares
        // the tip's parent must never be promoted.
        let mut applied = 0u64;
        for block in &path {
            self.apply_block(block).await?;
            applied += 1;
        }

        Ok(applied)
    }

    /// Catch up from the last processed block to the chain's current
    /// finalized tip. Used at startup before live mode, and by each poll.
    pub async fn catch_up(&mut self) -> Result<u64, IndexerError> {
        let tip = self.client.last_finalized_hash().await?;
        self.handle_finalized(&tip).await
    }

    /// Current progress. Safe to call concurrently with block application
    /// from a clone of the storage handle.
    pub async fn status(&self) -> Result<IndexerStatus, IndexerError> {
        let last = self.storage.last_processed_block().await?;
        Ok(IndexerStatus {
            chain: self.config.chain.clone(),
            height: last.as_ref().map(|b| b.height),
            hash: last.map(|b| b.hash),
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Walk backward from `tip` via parent pointers, recording each block
    /// idempotently, until a processed block or the genesis floor is
    /// reached. Returns the blocks to apply in ascending height order.
    ///
    /// A walk longer than `max_walk_depth` means the connecting ancestor is
    /// missing — a missed notification or chain data loss — and is reported
    /// as a reorg gap rather than truncated.
    async fn record_path(&self, tip: &BlockHash) -> Result<Vec<UnprocessedBlock>, IndexerError> {
        let mut path: Vec<UnprocessedBlock> = Vec::new();
        let mut cursor = tip.clone();

        loop {
            if path.len() as u64 >= self.config.max_walk_depth {
                return Err(IndexerError::ReorgGap {
                    tip: tip.to_prefixed(),
                    max_depth: self.config.max_walk_depth,
                });
            }
            if self
                .storage
                .processed_block_by_hash(&cursor)
                .await?
                .is_some()
            {
                break; // join point with the processed chain
            }

            let header = self.client.block_header(&cursor).await?;
            let block = match self.storage.unprocessed_block_at(header.height).await? {
                // Recorded by an earlier walk; orphaned siblings at this
                // height are retained but never enter the path, because the
                // path follows parent pointers from the finalized tip.
                Some(existing) if existing.hash == header.hash => existing,
                _ => {
                    let block =
                        UnprocessedBlock::new(header.hash.clone(), header.height, header.parent);
                    self.storage.insert_unprocessed_block(block.clone()).await?;
                    block
                }
            };
            cursor = block.parent.clone();
            // Stop above the genesis block itself; it carries no events and
            // its header may not be fetchable.
            let at_floor = block.height <= self.config.genesis_height + 1;
            path.push(block);
            if at_floor {
                break;
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Fetch a block's events, fold them through the event handler in
    /// on-chain order, and commit the resulting ChangeSet together with the
    /// block bookkeeping in one atomic storage transaction.
    async fn apply_block(&self, block: &UnprocessedBlock) -> Result<(), IndexerError> {
        let events = self.client.block_events(&block.hash).await?;

        let mut changes = ChangeSet::new();
        for event in &events {
            changes = handle_event(&self.registry, self.storage.as_ref(), event, changes).await?;
        }

        let processed = ProcessedBlock {
            hash: block.hash.clone(),
            height: block.height,
            parent: block.parent.clone(),
            created_at: Utc::now(),
        };
        self.storage.commit_block(processed, &changes).await?;

        tracing::info!(
            chain = %self.config.chain,
            height = block.height,
            hash = %block.hash,
            events = events.len(),
            "block applied"
        );
        Ok(())
    }
}
