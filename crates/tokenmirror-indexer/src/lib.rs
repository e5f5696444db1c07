//! Finalized-block indexing for TokenMirror.
//!
//! This crate owns the chain-facing half of the engine:
//!
//! - [`ChainClient`] — read access to finalized headers and events
//! - [`BlockProcessor`] — ancestor walk, per-block event folding, atomic commit
//! - [`Watcher`] — startup catch-up followed by a finalized-tip poll loop
//! - [`IndexerBuilder`] — configuration

pub mod builder;
pub mod chain;
pub mod processor;
pub mod watcher;

pub use builder::{IndexerBuilder, IndexerConfig};
pub use chain::{BlockHeader, ChainClient};
pub use processor::{BlockProcessor, IndexerStatus};
pub use watcher::{ShutdownHandle, Watcher};

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted chain client for processor and watcher tests.

    use std::collections::HashMap;

    use async_trait::async_trait;

    use tokenmirror_core::error::IndexerError;
    use tokenmirror_core::types::{BlockHash, ProcessRanEvent};

    use crate::chain::{BlockHeader, ChainClient};

    #[derive(Debug, Clone, Default)]
    pub struct ScriptedChain {
        blocks: HashMap<BlockHash, (BlockHeader, Vec<ProcessRanEvent>)>,
        finalized: Option<BlockHash>,
    }

    impl ScriptedChain {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_block(
            &mut self,
            hash: &str,
            height: u64,
            parent: &str,
            events: Vec<ProcessRanEvent>,
        ) {
            let hash = BlockHash::parse(hash);
            let header = BlockHeader {
                hash: hash.clone(),
                height,
                parent: BlockHash::parse(parent),
            };
            self.blocks.insert(hash, (header, events));
        }

        pub fn set_finalized(&mut self, hash: &str) {
            self.finalized = Some(BlockHash::parse(hash));
        }
    }

    #[async_trait]
    impl ChainClient for ScriptedChain {
        async fn last_finalized_hash(&self) -> Result<BlockHash, IndexerError> {
            self.finalized
                .clone()
                .ok_or_else(|| IndexerError::Chain("no finalized head available".into()))
        }

        async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeader, IndexerError> {
            self.blocks
                .get(hash)
                .map(|(header, _)| header.clone())
                .ok_or_else(|| IndexerError::Chain(format!("unknown block {hash}")))
        }

        async fn block_events(
            &self,
            hash: &BlockHash,
        ) -> Result<Vec<ProcessRanEvent>, IndexerError> {
            self.blocks
                .get(hash)
                .map(|(_, events)| events.clone())
                .ok_or_else(|| IndexerError::Chain(format!("unknown block {hash}")))
        }
    }
}
