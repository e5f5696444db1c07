//! Shared ledger-facing types: block hashes, block records, decoded events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ledger-native token id — one minted/burned unit of on-chain state.
pub type TokenId = u64;

// ─── BlockHash ───────────────────────────────────────────────────────────────

/// A block hash held in canonical form: lowercase hex, no `0x` prefix.
///
/// The chain reports hashes as `0x…`; storage persists them unprefixed.
/// Normalizing at the boundary keeps comparisons byte-equal no matter which
/// representation a value arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    /// Parse a hash from either representation (`0x`-prefixed or bare hex).
    pub fn parse(s: &str) -> Self {
        let bare = s.strip_prefix("0x").unwrap_or(s);
        Self(bare.to_ascii_lowercase())
    }

    /// The canonical unprefixed form, as persisted by storage backends.
    pub fn as_unprefixed(&self) -> &str {
        &self.0
    }

    /// The `0x`-prefixed form, as the chain reports it.
    pub fn to_prefixed(&self) -> String {
        format!("0x{}", self.0)
    }
}

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

impl From<&str> for BlockHash {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

// ─── Block records ───────────────────────────────────────────────────────────

/// A block whose events have been durably applied.
///
/// Written exactly once, inside the same storage transaction as the block's
/// ChangeSet. Except for the genesis floor, `parent` must itself reference a
/// processed block, and heights are unique and contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedBlock {
    pub hash: BlockHash,
    pub height: u64,
    pub parent: BlockHash,
    pub created_at: DateTime<Utc>,
}

/// A discovered-but-not-yet-applied block, persisted so a reorg walk can
/// resume across restarts. Inserted idempotently; consumed (or superseded)
/// when a block at its height is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprocessedBlock {
    pub hash: BlockHash,
    pub height: u64,
    pub parent: BlockHash,
    pub created_at: DateTime<Utc>,
}

impl UnprocessedBlock {
    pub fn new(hash: BlockHash, height: u64, parent: BlockHash) -> Self {
        Self {
            hash,
            height,
            parent,
            created_at: Utc::now(),
        }
    }
}

// ─── Decoded events ──────────────────────────────────────────────────────────

/// The ledger-level identifier of the action type that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRef {
    /// e.g. `"demand_create"`.
    pub id: String,
    pub version: u32,
}

/// One decoded on-chain action (`ProcessRan`).
///
/// Ephemeral — decoded per block by the chain client, never persisted
/// verbatim. `inputs` are token ids consumed by the action, `outputs` are
/// token ids it minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRanEvent {
    pub block_hash: BlockHash,
    /// Hash of the extrinsic call — correlates locally-submitted
    /// transactions with the event that materializes them.
    pub call_hash: String,
    pub process: ProcessRef,
    /// On-chain address of the account that ran the process.
    pub sender: String,
    pub inputs: Vec<TokenId>,
    pub outputs: Vec<TokenId>,
}
