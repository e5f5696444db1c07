//! In-memory storage backend.
//!
//! All tables live behind one mutex; the per-block commit clones the inner
//! state, applies every mutation to the clone, and swaps it in only if the
//! whole set applied cleanly — a failed commit leaves nothing behind.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tokenmirror_core::changeset::{Change, ChangeSet, EntityStateSnapshot, LocalRef};
use tokenmirror_core::entities::{
    Comment, Demand, EntityTable, LocalId, Match2, Permission, Transaction, TransactionState,
};
use tokenmirror_core::error::IndexerError;
use tokenmirror_core::storage::IndexerStorage;
use tokenmirror_core::types::{BlockHash, ProcessedBlock, TokenId, UnprocessedBlock};

#[derive(Debug, Clone, Default)]
struct Inner {
    processed: Vec<ProcessedBlock>, // ascending height
    unprocessed: HashMap<BlockHash, UnprocessedBlock>,
    demands: HashMap<LocalId, Demand>,
    matches: HashMap<LocalId, Match2>,
    permissions: HashMap<LocalId, Permission>,
    comments: HashMap<LocalId, Comment>,
    transactions: HashMap<Uuid, Transaction>,
}

/// In-memory mirror storage. All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    // ── seeding helpers for the API-layer writes the engine only observes ──

    /// Record a locally-created demand row (state `pending`, no tokens yet).
    pub fn seed_demand(&self, demand: Demand) {
        self.inner.lock().unwrap().demands.insert(demand.id, demand);
    }

    pub fn seed_match2(&self, m: Match2) {
        self.inner.lock().unwrap().matches.insert(m.id, m);
    }

    pub fn seed_permission(&self, p: Permission) {
        self.inner.lock().unwrap().permissions.insert(p.id, p);
    }

    /// Record a submitted transaction awaiting its on-chain outcome.
    pub fn seed_transaction(&self, tx: Transaction) {
        self.inner.lock().unwrap().transactions.insert(tx.id, tx);
    }

    pub fn comment(&self, id: LocalId) -> Option<Comment> {
        self.inner.lock().unwrap().comments.get(&id).cloned()
    }

    pub fn processed_count(&self) -> usize {
        self.inner.lock().unwrap().processed.len()
    }

    pub fn unprocessed_count(&self) -> usize {
        self.inner.lock().unwrap().unprocessed.len()
    }
}

fn apply(inner: &mut Inner, block: &ProcessedBlock, changes: &ChangeSet) -> Result<(), String> {
    // Parent linkage: every processed block except the genesis floor must
    // extend the current tip, keeping heights unique and contiguous.
    if let Some(last) = inner.processed.last() {
        if block.parent != last.hash {
            return Err(format!(
                "block {} does not extend processed tip {}",
                block.hash, last.hash
            ));
        }
        if block.height != last.height + 1 {
            return Err(format!(
                "height {} is not contiguous with processed tip at {}",
                block.height, last.height
            ));
        }
    }

    for (id, change) in &changes.demands {
        match change {
            Change::Insert(row) => {
                inner.demands.insert(*id, row.clone());
            }
            Change::Update(patch) => inner
                .demands
                .get_mut(id)
                .map(|row| row.apply(patch))
                .ok_or_else(|| format!("update of missing demand {id}"))?,
        }
    }
    for (id, change) in &changes.matches {
        match change {
            Change::Insert(row) => {
                inner.matches.insert(*id, row.clone());
            }
            Change::Update(patch) => inner
                .matches
                .get_mut(id)
                .map(|row| row.apply(patch))
                .ok_or_else(|| format!("update of missing match {id}"))?,
        }
    }
    for (id, change) in &changes.permissions {
        match change {
            Change::Insert(row) => {
                inner.permissions.insert(*id, row.clone());
            }
            Change::Update(patch) => inner
                .permissions
                .get_mut(id)
                .map(|row| row.apply(patch))
                .ok_or_else(|| format!("update of missing permission {id}"))?,
        }
    }
    for (id, comment) in &changes.comments {
        inner.comments.insert(*id, comment.clone());
    }

    let now = Utc::now();
    for (id, update) in &changes.transactions {
        let row = inner
            .transactions
            .get_mut(id)
            .ok_or_else(|| format!("update of missing transaction {id}"))?;
        row.state = update.state;
        row.updated_at = now;
    }
    for slot in &changes.conflicts {
        for row in inner.transactions.values_mut() {
            if row.local_id == slot.local_id
                && row.hash != slot.winning_hash
                && row.state.is_settleable()
            {
                row.state = TransactionState::Failed;
                row.updated_at = now;
            }
        }
    }

    // Consume this height's unprocessed record; anything at or below the
    // committed height is superseded.
    inner.unprocessed.retain(|_, b| b.height > block.height);
    inner.processed.push(block.clone());
    Ok(())
}

#[async_trait]
impl IndexerStorage for InMemoryStorage {
    async fn last_processed_block(&self) -> Result<Option<ProcessedBlock>, IndexerError> {
        Ok(self.inner.lock().unwrap().processed.last().cloned())
    }

    async fn processed_block_by_hash(
        &self,
        hash: &BlockHash,
    ) -> Result<Option<ProcessedBlock>, IndexerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .processed
            .iter()
            .find(|b| &b.hash == hash)
            .cloned())
    }

    async fn unprocessed_block_at(
        &self,
        height: u64,
    ) -> Result<Option<UnprocessedBlock>, IndexerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .unprocessed
            .values()
            .find(|b| b.height == height)
            .cloned())
    }

    async fn next_unprocessed_block_above(
        &self,
        height: u64,
    ) -> Result<Option<UnprocessedBlock>, IndexerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .unprocessed
            .values()
            .filter(|b| b.height > height)
            .min_by_key(|b| b.height)
            .cloned())
    }

    async fn insert_unprocessed_block(
        &self,
        block: UnprocessedBlock,
    ) -> Result<(), IndexerError> {
        let mut inner = self.inner.lock().unwrap();
        // Ignore-on-conflict: re-discovering a block is a no-op.
        inner.unprocessed.entry(block.hash.clone()).or_insert(block);
        Ok(())
    }

    async fn find_local_id_by_token(
        &self,
        token_id: TokenId,
    ) -> Result<Option<LocalRef>, IndexerError> {
        let inner = self.inner.lock().unwrap();
        if let Some(d) = inner
            .demands
            .values()
            .find(|d| d.latest_token_id == Some(token_id))
        {
            return Ok(Some(LocalRef {
                table: EntityTable::Demand,
                id: d.id,
                state: Some(EntityStateSnapshot::Demand(d.state)),
            }));
        }
        if let Some(m) = inner
            .matches
            .values()
            .find(|m| m.latest_token_id == Some(token_id))
        {
            return Ok(Some(LocalRef {
                table: EntityTable::Match2,
                id: m.id,
                state: Some(EntityStateSnapshot::Match2(m.state)),
            }));
        }
        if let Some(p) = inner
            .permissions
            .values()
            .find(|p| p.latest_token_id == Some(token_id))
        {
            return Ok(Some(LocalRef {
                table: EntityTable::Permission,
                id: p.id,
                state: Some(EntityStateSnapshot::Permission(p.state)),
            }));
        }
        Ok(None)
    }

    async fn find_transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Transaction>, IndexerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transactions
            .values()
            .find(|t| t.hash == hash)
            .cloned())
    }

    async fn commit_block(
        &self,
        block: ProcessedBlock,
        changes: &ChangeSet,
    ) -> Result<(), IndexerError> {
        let mut guard = self.inner.lock().unwrap();
        let mut staged = guard.clone();
        apply(&mut staged, &block, changes).map_err(IndexerError::Storage)?;
        *guard = staged;
        tracing::debug!(height = block.height, hash = %block.hash, "block committed");
        Ok(())
    }

    async fn demand(&self, id: LocalId) -> Result<Option<Demand>, IndexerError> {
        Ok(self.inner.lock().unwrap().demands.get(&id).cloned())
    }

    async fn match2(&self, id: LocalId) -> Result<Option<Match2>, IndexerError> {
        Ok(self.inner.lock().unwrap().matches.get(&id).cloned())
    }

    async fn permission(&self, id: LocalId) -> Result<Option<Permission>, IndexerError> {
        Ok(self.inner.lock().unwrap().permissions.get(&id).cloned())
    }

    async fn transaction(&self, id: Uuid) -> Result<Option<Transaction>, IndexerError> {
        Ok(self.inner.lock().unwrap().transactions.get(&id).cloned())
    }
}
