//! Persistence contract the reconciliation engine consumes.
//!
//! Concrete backends live in `tokenmirror-storage`. The contract keeps the
//! engine honest about two things: block bookkeeping (processed/unprocessed
//! records) and the atomic per-block commit — either every staged mutation
//! plus the ProcessedBlock marker lands, or none does.
//!
//! Backends persist block hashes in their unprefixed form (see
//! [`BlockHash::as_unprefixed`]) and restore the `0x`-prefixed form on read.

use async_trait::async_trait;
use uuid::Uuid;

use crate::changeset::{ChangeSet, LocalRef};
use crate::entities::{Demand, LocalId, Match2, Permission, Transaction};
use crate::error::IndexerError;
use crate::types::{BlockHash, ProcessedBlock, TokenId, UnprocessedBlock};

/// Storage operations the indexer requires.
#[async_trait]
pub trait IndexerStorage: Send + Sync {
    /// The highest processed block, if any.
    async fn last_processed_block(&self) -> Result<Option<ProcessedBlock>, IndexerError>;

    /// Look up a processed block by hash (used to find the join point of a
    /// reorg walk).
    async fn processed_block_by_hash(
        &self,
        hash: &BlockHash,
    ) -> Result<Option<ProcessedBlock>, IndexerError>;

    /// The unprocessed block recorded at exactly `height`, if any.
    async fn unprocessed_block_at(
        &self,
        height: u64,
    ) -> Result<Option<UnprocessedBlock>, IndexerError>;

    /// The lowest unprocessed block strictly above `height`, if any.
    async fn next_unprocessed_block_above(
        &self,
        height: u64,
    ) -> Result<Option<UnprocessedBlock>, IndexerError>;

    /// Record a discovered block. Ignore-on-conflict: re-inserting an
    /// already-recorded hash is a no-op, not an error.
    async fn insert_unprocessed_block(&self, block: UnprocessedBlock)
        -> Result<(), IndexerError>;

    /// Map a ledger token id to the local entity currently represented by it
    /// (`latest_token_id` match). `None` is an expected outcome for tokens
    /// this mirror does not track.
    async fn find_local_id_by_token(
        &self,
        token_id: TokenId,
    ) -> Result<Option<LocalRef>, IndexerError>;

    /// Find a locally-submitted transaction record by its call hash.
    async fn find_transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Transaction>, IndexerError>;

    /// Atomically apply a block: every mutation in `changes`, the
    /// ProcessedBlock row, and consumption of the matching UnprocessedBlock
    /// rows, in one storage transaction. On failure nothing is applied and
    /// the block remains unprocessed for retry.
    async fn commit_block(
        &self,
        block: ProcessedBlock,
        changes: &ChangeSet,
    ) -> Result<(), IndexerError>;

    // ── row reads (status queries, reconciliation checks, tests) ──

    async fn demand(&self, id: LocalId) -> Result<Option<Demand>, IndexerError>;
    async fn match2(&self, id: LocalId) -> Result<Option<Match2>, IndexerError>;
    async fn permission(&self, id: LocalId) -> Result<Option<Permission>, IndexerError>;
    async fn transaction(&self, id: Uuid) -> Result<Option<Transaction>, IndexerError>;
}

#[cfg(test)]
pub(crate) mod tests_support {
    //! Minimal storage stub for unit tests that only exercise the pure
    //! decision layer.

    use super::*;

    /// Storage that knows nothing and rejects writes.
    pub struct NullStorage;

    #[async_trait]
    impl IndexerStorage for NullStorage {
        async fn last_processed_block(&self) -> Result<Option<ProcessedBlock>, IndexerError> {
            Ok(None)
        }

        async fn processed_block_by_hash(
            &self,
            _hash: &BlockHash,
        ) -> Result<Option<ProcessedBlock>, IndexerError> {
            Ok(None)
        }

        async fn unprocessed_block_at(
            &self,
            _height: u64,
        ) -> Result<Option<UnprocessedBlock>, IndexerError> {
            Ok(None)
        }

        async fn next_unprocessed_block_above(
            &self,
            _height: u64,
        ) -> Result<Option<UnprocessedBlock>, IndexerError> {
            Ok(None)
        }

        async fn insert_unprocessed_block(
            &self,
            _block: UnprocessedBlock,
        ) -> Result<(), IndexerError> {
            Ok(())
        }

        async fn find_local_id_by_token(
            &self,
            _token_id: TokenId,
        ) -> Result<Option<LocalRef>, IndexerError> {
            Ok(None)
        }

        async fn find_transaction_by_hash(
            &self,
            _hash: &str,
        ) -> Result<Option<Transaction>, IndexerError> {
            Ok(None)
        }

        async fn commit_block(
            &self,
            _block: ProcessedBlock,
            _changes: &ChangeSet,
        ) -> Result<(), IndexerError> {
            Err(IndexerError::Storage("null storage".into()))
        }

        async fn demand(&self, _id: LocalId) -> Result<Option<Demand>, IndexerError> {
            Ok(None)
        }

        async fn match2(&self, _id: LocalId) -> Result<Option<Match2>, IndexerError> {
            Ok(None)
        }

        async fn permission(&self, _id: LocalId) -> Result<Option<Permission>, IndexerError> {
            Ok(None)
        }

        async fn transaction(&self, _id: Uuid) -> Result<Option<Transaction>, IndexerError> {
            Ok(None)
        }
    }
}
