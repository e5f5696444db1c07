//! tokenmirror-core — decision layer of the off-chain ledger mirror.
//!
//! # Architecture
//!
//! ```text
//! BlockProcessor (tokenmirror-indexer)
//!     └── handle_event                (one ledger event → updated ChangeSet)
//!             ├── resolve_local_id    (token id → local entity, in-flight first)
//!             ├── ProcessorRegistry   (process id → EventProcessor)
//!             └── ChangeSet::merge    (per-key last-write-wins accumulation)
//!     └── IndexerStorage              (atomic per-block commit contract)
//! ```
//!
//! Everything in this crate is pure with respect to the chain: it receives
//! already-decoded events and stages mutations; the only I/O is reads
//! through the [`IndexerStorage`] contract during token resolution.

pub mod changeset;
pub mod entities;
pub mod error;
pub mod handler;
pub mod processors;
pub mod storage;
pub mod types;

pub use changeset::{ChangeSet, ConflictSlot, EntityStateSnapshot, LocalRef};
pub use entities::{Demand, Match2, Permission, Transaction, TransactionState};
pub use error::IndexerError;
pub use handler::{handle_event, resolve_local_id, ResolvedInput, ResolvedOutput};
pub use processors::{EventProcessor, ProcessorRegistry};
pub use storage::IndexerStorage;
pub use types::{BlockHash, ProcessRanEvent, ProcessedBlock, TokenId, UnprocessedBlock};
