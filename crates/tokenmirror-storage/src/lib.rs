//! tokenmirror-storage — pluggable backends for the [`IndexerStorage`]
//! contract.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Both persist block hashes unprefixed and restore the `0x` prefix on read,
//! so hash comparisons stay byte-equal regardless of representation.
//!
//! [`IndexerStorage`]: tokenmirror_core::IndexerStorage

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;
