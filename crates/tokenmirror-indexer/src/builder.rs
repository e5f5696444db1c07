//! Indexer configuration and fluent builder.
//!
//! # Example
//!
//! ```rust
//! use tokenmirror_indexer::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .chain("sqnc")
//!     .genesis_height(1_000_000)
//!     .max_walk_depth(500)
//!     .poll_interval_ms(3000)
//!     .build_config();
//! assert_eq!(config.chain, "sqnc");
//! ```

use serde::{Deserialize, Serialize};

/// Configuration for one indexer instance (one monitored chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Chain label, used for logging only.
    pub chain: String,
    /// Height of the chain's genesis block. The ancestor walk stops at the
    /// block directly above it; the genesis block itself is never replayed.
    pub genesis_height: u64,
    /// Bound on the ancestor walk from a finalized tip. Exceeding it is
    /// reported as a reorg gap rather than walking unboundedly.
    pub max_walk_depth: u64,
    /// Finalized-tip polling interval in live mode (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chain: "ledger".into(),
            genesis_height: 0,
            max_walk_depth: 1000,
            poll_interval_ms: 2000,
        }
    }
}

/// Fluent builder for [`IndexerConfig`].
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the chain label used in logs.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Set the genesis floor height.
    pub fn genesis_height(mut self, height: u64) -> Self {
        self.config.genesis_height = height;
        self
    }

    /// Set the ancestor-walk bound.
    pub fn max_walk_depth(mut self, depth: u64) -> Self {
        self.config.max_walk_depth = depth;
        self
    }

    /// Set the live-mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Build the [`IndexerConfig`].
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().build_config();
        assert_eq!(cfg.genesis_height, 0);
        assert_eq!(cfg.max_walk_depth, 1000);
        assert_eq!(cfg.poll_interval_ms, 2000);
    }

    #[test]
    fn builder_custom() {
        let cfg = IndexerBuilder::new()
            .chain("sqnc")
            .genesis_height(42)
            .max_walk_depth(64)
            .poll_interval_ms(500)
            .build_config();
        assert_eq!(cfg.chain, "sqnc");
        assert_eq!(cfg.genesis_height, 42);
        assert_eq!(cfg.max_walk_depth, 64);
        assert_eq!(cfg.poll_interval_ms, 500);
    }
}
