//! SQLite storage backend.
//!
//! Persists block bookkeeping, mirrored entities, and transaction records to
//! a single SQLite file via `sqlx`, with WAL mode for concurrent reads. The
//! per-block commit runs inside one SQL transaction, so a failed mutation
//! rolls the whole block back.
//!
//! Block hashes are stored unprefixed and restored `0x`-prefixed on read.
//!
//! # Usage
//! ```rust,no_run
//! use tokenmirror_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./mirror.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use tokenmirror_core::changeset::{Change, ChangeSet, EntityStateSnapshot, LocalRef};
use tokenmirror_core::entities::{
    Demand, DemandState, DemandSubtype, EntityTable, LocalId, Match2, Match2State, Permission,
    PermissionState, Transaction, TransactionApiType, TransactionState, TransactionType,
};
use tokenmirror_core::error::IndexerError;
use tokenmirror_core::storage::IndexerStorage;
use tokenmirror_core::types::{BlockHash, ProcessedBlock, TokenId, UnprocessedBlock};

fn db_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

fn bad_row(what: &str) -> IndexerError {
    IndexerError::Storage(format!("corrupt row: {what}"))
}

/// SQLite-backed mirror storage.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(db_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database. All data is lost when the pool is
    /// dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        // One connection: every `:memory:` connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        for ddl in [
            "CREATE TABLE IF NOT EXISTS processed_blocks (
                hash       TEXT    PRIMARY KEY,
                height     INTEGER NOT NULL UNIQUE,
                parent     TEXT    NOT NULL,
                created_at TEXT    NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS unprocessed_blocks (
                hash       TEXT    PRIMARY KEY,
                height     INTEGER NOT NULL,
                parent     TEXT    NOT NULL,
                created_at TEXT    NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS demands (
                id                TEXT PRIMARY KEY,
                owner             TEXT NOT NULL,
                subtype           TEXT NOT NULL,
                state             TEXT NOT NULL,
                latest_token_id   INTEGER,
                original_token_id INTEGER
            );",
            "CREATE TABLE IF NOT EXISTS match2 (
                id                TEXT PRIMARY KEY,
                state             TEXT NOT NULL,
                member_a          TEXT NOT NULL,
                member_b          TEXT NOT NULL,
                demand_a_id       TEXT NOT NULL,
                demand_b_id       TEXT NOT NULL,
                latest_token_id   INTEGER,
                original_token_id INTEGER
            );",
            "CREATE TABLE IF NOT EXISTS permissions (
                id                TEXT PRIMARY KEY,
                owner             TEXT NOT NULL,
                state             TEXT NOT NULL,
                latest_token_id   INTEGER,
                original_token_id INTEGER
            );",
            "CREATE TABLE IF NOT EXISTS comments (
                id         TEXT PRIMARY KEY,
                demand_id  TEXT NOT NULL,
                owner      TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS transactions (
                id               TEXT PRIMARY KEY,
                local_id         TEXT NOT NULL,
                api_type         TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                state            TEXT NOT NULL,
                hash             TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_demands_latest_token ON demands (latest_token_id);",
            "CREATE INDEX IF NOT EXISTS idx_match2_latest_token ON match2 (latest_token_id);",
            "CREATE INDEX IF NOT EXISTS idx_permissions_latest_token ON permissions (latest_token_id);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_hash ON transactions (hash);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_local_id ON transactions (local_id);",
        ] {
            sqlx::query(ddl).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    /// Record a submitted transaction awaiting its on-chain outcome — the
    /// write the API layer performs at submission time.
    pub async fn seed_transaction(&self, tx: &Transaction) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO transactions
               (id, local_id, api_type, transaction_type, state, hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tx.id.to_string())
        .bind(tx.local_id.to_string())
        .bind(tx.api_type.as_str())
        .bind(tx.transaction_type.as_str())
        .bind(tx.state.as_str())
        .bind(&tx.hash)
        .bind(tx.created_at.to_rfc3339())
        .bind(tx.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Record a locally-created demand row.
    pub async fn seed_demand(&self, demand: &Demand) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO demands (id, owner, subtype, state, latest_token_id, original_token_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(demand.id.to_string())
        .bind(&demand.owner)
        .bind(demand.subtype.as_str())
        .bind(demand.state.as_str())
        .bind(demand.latest_token_id.map(|t| t as i64))
        .bind(demand.original_token_id.map(|t| t as i64))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

// ─── row mapping ─────────────────────────────────────────────────────────────

fn parse_uuid(s: String) -> Result<Uuid, IndexerError> {
    Uuid::parse_str(&s).map_err(|_| bad_row("invalid uuid"))
}

fn parse_timestamp(s: String) -> Result<DateTime<Utc>, IndexerError> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| bad_row("invalid timestamp"))
}

fn row_to_processed(row: &SqliteRow) -> Result<ProcessedBlock, IndexerError> {
    Ok(ProcessedBlock {
        hash: BlockHash::parse(&row.try_get::<String, _>("hash").map_err(db_err)?),
        height: row.try_get::<i64, _>("height").map_err(db_err)? as u64,
        parent: BlockHash::parse(&row.try_get::<String, _>("parent").map_err(db_err)?),
        created_at: parse_timestamp(row.try_get("created_at").map_err(db_err)?)?,
    })
}

fn row_to_unprocessed(row: &SqliteRow) -> Result<UnprocessedBlock, IndexerError> {
    Ok(UnprocessedBlock {
        hash: BlockHash::parse(&row.try_get::<String, _>("hash").map_err(db_err)?),
        height: row.try_get::<i64, _>("height").map_err(db_err)? as u64,
        parent: BlockHash::parse(&row.try_get::<String, _>("parent").map_err(db_err)?),
        created_at: parse_timestamp(row.try_get("created_at").map_err(db_err)?)?,
    })
}

fn row_to_demand(row: &SqliteRow) -> Result<Demand, IndexerError> {
    Ok(Demand {
        id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
        owner: row.try_get("owner").map_err(db_err)?,
        subtype: DemandSubtype::from_str(&row.try_get::<String, _>("subtype").map_err(db_err)?)
            .ok_or_else(|| bad_row("invalid demand subtype"))?,
        state: DemandState::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
            .ok_or_else(|| bad_row("invalid demand state"))?,
        latest_token_id: row
            .try_get::<Option<i64>, _>("latest_token_id")
            .map_err(db_err)?
            .map(|t| t as TokenId),
        original_token_id: row
            .try_get::<Option<i64>, _>("original_token_id")
            .map_err(db_err)?
            .map(|t| t as TokenId),
    })
}

fn row_to_match2(row: &SqliteRow) -> Result<Match2, IndexerError> {
    Ok(Match2 {
        id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
        state: Match2State::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
            .ok_or_else(|| bad_row("invalid match state"))?,
        member_a: row.try_get("member_a").map_err(db_err)?,
        member_b: row.try_get("member_b").map_err(db_err)?,
        demand_a_id: parse_uuid(row.try_get("demand_a_id").map_err(db_err)?)?,
        demand_b_id: parse_uuid(row.try_get("demand_b_id").map_err(db_err)?)?,
        latest_token_id: row
            .try_get::<Option<i64>, _>("latest_token_id")
            .map_err(db_err)?
            .map(|t| t as TokenId),
        original_token_id: row
            .try_get::<Option<i64>, _>("original_token_id")
            .map_err(db_err)?
            .map(|t| t as TokenId),
    })
}

fn row_to_permission(row: &SqliteRow) -> Result<Permission, IndexerError> {
    Ok(Permission {
        id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
        owner: row.try_get("owner").map_err(db_err)?,
        state: PermissionState::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
            .ok_or_else(|| bad_row("invalid permission state"))?,
        latest_token_id: row
            .try_get::<Option<i64>, _>("latest_token_id")
            .map_err(db_err)?
            .map(|t| t as TokenId),
        original_token_id: row
            .try_get::<Option<i64>, _>("original_token_id")
            .map_err(db_err)?
            .map(|t| t as TokenId),
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction, IndexerError> {
    Ok(Transaction {
        id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
        local_id: parse_uuid(row.try_get("local_id").map_err(db_err)?)?,
        api_type: TransactionApiType::from_str(
            &row.try_get::<String, _>("api_type").map_err(db_err)?,
        )
        .ok_or_else(|| bad_row("invalid api type"))?,
        transaction_type: TransactionType::from_str(
            &row.try_get::<String, _>("transaction_type").map_err(db_err)?,
        )
        .ok_or_else(|| bad_row("invalid transaction type"))?,
        state: TransactionState::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
            .ok_or_else(|| bad_row("invalid transaction state"))?,
        hash: row.try_get("hash").map_err(db_err)?,
        created_at: parse_timestamp(row.try_get("created_at").map_err(db_err)?)?,
        updated_at: parse_timestamp(row.try_get("updated_at").map_err(db_err)?)?,
    })
}

#[async_trait]
impl IndexerStorage for SqliteStorage {
    async fn last_processed_block(&self) -> Result<Option<ProcessedBlock>, IndexerError> {
        let row = sqlx::query("SELECT * FROM processed_blocks ORDER BY height DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_processed).transpose()
    }

    async fn processed_block_by_hash(
        &self,
        hash: &BlockHash,
    ) -> Result<Option<ProcessedBlock>, IndexerError> {
        let row = sqlx::query("SELECT * FROM processed_blocks WHERE hash = ?")
            .bind(hash.as_unprefixed())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_processed).transpose()
    }

    async fn unprocessed_block_at(
        &self,
        height: u64,
    ) -> Result<Option<UnprocessedBlock>, IndexerError> {
        let row = sqlx::query("SELECT * FROM unprocessed_blocks WHERE height = ? LIMIT 1")
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_unprocessed).transpose()
    }

    async fn next_unprocessed_block_above(
        &self,
        height: u64,
    ) -> Result<Option<UnprocessedBlock>, IndexerError> {
        let row = sqlx::query(
            "SELECT * FROM unprocessed_blocks WHERE height > ? ORDER BY height ASC LIMIT 1",
        )
        .bind(height as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(row_to_unprocessed).transpose()
    }

    async fn insert_unprocessed_block(
        &self,
        block: UnprocessedBlock,
    ) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR IGNORE INTO unprocessed_blocks (hash, height, parent, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(block.hash.as_unprefixed())
        .bind(block.height as i64)
        .bind(block.parent.as_unprefixed())
        .bind(block.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_local_id_by_token(
        &self,
        token_id: TokenId,
    ) -> Result<Option<LocalRef>, IndexerError> {
        let token = token_id as i64;
        if let Some(row) = sqlx::query("SELECT id, state FROM demands WHERE latest_token_id = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
        {
            let state = DemandState::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
                .ok_or_else(|| bad_row("invalid demand state"))?;
            return Ok(Some(LocalRef {
                table: EntityTable::Demand,
                id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
                state: Some(EntityStateSnapshot::Demand(state)),
            }));
        }
        if let Some(row) = sqlx::query("SELECT id, state FROM match2 WHERE latest_token_id = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
        {
            let state = Match2State::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
                .ok_or_else(|| bad_row("invalid match state"))?;
            return Ok(Some(LocalRef {
                table: EntityTable::Match2,
                id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
                state: Some(EntityStateSnapshot::Match2(state)),
            }));
        }
        if let Some(row) =
            sqlx::query("SELECT id, state FROM permissions WHERE latest_token_id = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
        {
            let state =
                PermissionState::from_str(&row.try_get::<String, _>("state").map_err(db_err)?)
                    .ok_or_else(|| bad_row("invalid permission state"))?;
            return Ok(Some(LocalRef {
                table: EntityTable::Permission,
                id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
                state: Some(EntityStateSnapshot::Permission(state)),
            }));
        }
        Ok(None)
    }

    async fn find_transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Transaction>, IndexerError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE hash = ? LIMIT 1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn commit_block(
        &self,
        block: ProcessedBlock,
        changes: &ChangeSet,
    ) -> Result<(), IndexerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Parent linkage check against the tip, inside the transaction.
        let tip = sqlx::query("SELECT * FROM processed_blocks ORDER BY height DESC LIMIT 1")
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if let Some(tip) = tip.as_ref().map(row_to_processed).transpose()? {
            if block.parent != tip.hash || block.height != tip.height + 1 {
                return Err(IndexerError::Storage(format!(
                    "block {} at height {} does not extend processed tip {} at {}",
                    block.hash, block.height, tip.hash, tip.height
                )));
            }
        }

        for (id, change) in &changes.demands {
            match change {
                Change::Insert(d) => {
                    sqlx::query(
                        "INSERT INTO demands
                           (id, owner, subtype, state, latest_token_id, original_token_id)
                         VALUES (?, ?, ?, ?, ?, ?)
                         ON CONFLICT(id) DO UPDATE SET
                           state = excluded.state,
                           latest_token_id = excluded.latest_token_id,
                           original_token_id = excluded.original_token_id",
                    )
                    .bind(d.id.to_string())
                    .bind(&d.owner)
                    .bind(d.subtype.as_str())
                    .bind(d.state.as_str())
                    .bind(d.latest_token_id.map(|t| t as i64))
                    .bind(d.original_token_id.map(|t| t as i64))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                Change::Update(u) => {
                    let res = sqlx::query(
                        "UPDATE demands SET
                           state = COALESCE(?, state),
                           latest_token_id = COALESCE(?, latest_token_id),
                           original_token_id = COALESCE(?, original_token_id)
                         WHERE id = ?",
                    )
                    .bind(u.state.map(|s| s.as_str()))
                    .bind(u.latest_token_id.map(|t| t as i64))
                    .bind(u.original_token_id.map(|t| t as i64))
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    if res.rows_affected() == 0 {
                        return Err(IndexerError::Storage(format!(
                            "update of missing demand {id}"
                        )));
                    }
                }
            }
        }

        for (id, change) in &changes.matches {
            match change {
                Change::Insert(m) => {
                    sqlx::query(
                        "INSERT INTO match2
                           (id, state, member_a, member_b, demand_a_id, demand_b_id,
                            latest_token_id, original_token_id)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                         ON CONFLICT(id) DO UPDATE SET
                           state = excluded.state,
                           latest_token_id = excluded.latest_token_id,
                           original_token_id = excluded.original_token_id",
                    )
                    .bind(m.id.to_string())
                    .bind(m.state.as_str())
                    .bind(&m.member_a)
                    .bind(&m.member_b)
                    .bind(m.demand_a_id.to_string())
                    .bind(m.demand_b_id.to_string())
                    .bind(m.latest_token_id.map(|t| t as i64))
                    .bind(m.original_token_id.map(|t| t as i64))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                Change::Update(u) => {
                    let res = sqlx::query(
                        "UPDATE match2 SET
                           state = COALESCE(?, state),
                           latest_token_id = COALESCE(?, latest_token_id),
                           original_token_id = COALESCE(?, original_token_id)
                         WHERE id = ?",
                    )
                    .bind(u.state.map(|s| s.as_str()))
                    .bind(u.latest_token_id.map(|t| t as i64))
                    .bind(u.original_token_id.map(|t| t as i64))
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    if res.rows_affected() == 0 {
                        return Err(IndexerError::Storage(format!(
                            "update of missing match {id}"
                        )));
                    }
                }
            }
        }

        for (id, change) in &changes.permissions {
            match change {
                Change::Insert(p) => {
                    sqlx::query(
                        "INSERT INTO permissions
                           (id, owner, state, latest_token_id, original_token_id)
                         VALUES (?, ?, ?, ?, ?)
                         ON CONFLICT(id) DO UPDATE SET
                           state = excluded.state,
                           latest_token_id = excluded.latest_token_id,
                           original_token_id = excluded.original_token_id",
                    )
                    .bind(p.id.to_string())
                    .bind(&p.owner)
                    .bind(p.state.as_str())
                    .bind(p.latest_token_id.map(|t| t as i64))
                    .bind(p.original_token_id.map(|t| t as i64))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                Change::Update(u) => {
                    let res = sqlx::query(
                        "UPDATE permissions SET
                           state = COALESCE(?, state),
                           latest_token_id = COALESCE(?, latest_token_id),
                           original_token_id = COALESCE(?, original_token_id)
                         WHERE id = ?",
                    )
                    .bind(u.state.map(|s| s.as_str()))
                    .bind(u.latest_token_id.map(|t| t as i64))
                    .bind(u.original_token_id.map(|t| t as i64))
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    if res.rows_affected() == 0 {
                        return Err(IndexerError::Storage(format!(
                            "update of missing permission {id}"
                        )));
                    }
                }
            }
        }

        for comment in changes.comments.values() {
            sqlx::query(
                "INSERT OR IGNORE INTO comments (id, demand_id, owner, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(comment.id.to_string())
            .bind(comment.demand_id.to_string())
            .bind(&comment.owner)
            .bind(comment.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let now = Utc::now().to_rfc3339();
        for (id, update) in &changes.transactions {
            let res = sqlx::query("UPDATE transactions SET state = ?, updated_at = ? WHERE id = ?")
                .bind(update.state.as_str())
                .bind(&now)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 {
                return Err(IndexerError::Storage(format!(
                    "update of missing transaction {id}"
                )));
            }
        }
        for slot in &changes.conflicts {
            sqlx::query(
                "UPDATE transactions SET state = 'failed', updated_at = ?
                 WHERE local_id = ? AND hash != ? AND state IN ('submitted', 'in_block')",
            )
            .bind(&now)
            .bind(slot.local_id.to_string())
            .bind(&slot.winning_hash)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        sqlx::query(
            "INSERT INTO processed_blocks (hash, height, parent, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(block.hash.as_unprefixed())
        .bind(block.height as i64)
        .bind(block.parent.as_unprefixed())
        .bind(block.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("DELETE FROM unprocessed_blocks WHERE height <= ?")
            .bind(block.height as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(height = block.height, hash = %block.hash, "block committed");
        Ok(())
    }

    async fn demand(&self, id: LocalId) -> Result<Option<Demand>, IndexerError> {
        let row = sqlx::query("SELECT * FROM demands WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_demand).transpose()
    }

    async fn match2(&self, id: LocalId) -> Result<Option<Match2>, IndexerError> {
        let row = sqlx::query("SELECT * FROM match2 WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_match2).transpose()
    }

    async fn permission(&self, id: LocalId) -> Result<Option<Permission>, IndexerError> {
        let row = sqlx::query("SELECT * FROM permissions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_permission).transpose()
    }

    async fn transaction(&self, id: Uuid) -> Result<Option<Transaction>, IndexerError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_transaction).transpose()
    }
}
