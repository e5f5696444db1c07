//! Event processors — one per ledger process id.
//!
//! A processor turns one decoded, resolved event into a ChangeSet fragment.
//! Processors are pure with respect to storage: they read only their
//! arguments, and use the matched transaction (when present) to settle its
//! resulting state per the causal-slot rules.

mod demand;
mod match2;
mod permission;

pub use demand::{DemandComment, DemandCreate};
pub use match2::{Match2Accept, Match2AcceptFinal, Match2Cancel, Match2Propose, Match2Reject};
pub use permission::{PermissionCreate, PermissionRevoke};

use std::collections::HashMap;

use crate::changeset::ChangeSet;
use crate::entities::{Transaction, TransactionState};
use crate::error::IndexerError;
use crate::handler::{ResolvedInput, ResolvedOutput};

/// The process schema version this build understands.
pub const SUPPORTED_VERSION: u32 = 1;

/// Handler for one ledger process id.
pub trait EventProcessor: Send + Sync {
    /// The ledger process id this processor handles (e.g. `"demand_create"`).
    fn process_id(&self) -> &'static str;

    /// Whether an input token that resolves to no local entity is acceptable
    /// (externally-originated, informational) rather than fatal to the block.
    fn tolerates_unresolved_inputs(&self) -> bool {
        false
    }

    /// Produce the ChangeSet fragment for one event.
    fn run(
        &self,
        version: u32,
        matched_tx: Option<&Transaction>,
        sender: &str,
        inputs: &[ResolvedInput],
        outputs: &[ResolvedOutput],
    ) -> Result<ChangeSet, IndexerError>;
}

/// String-keyed registry mapping process ids to processors.
///
/// Unknown ids fail explicitly — there is no default handler.
pub struct ProcessorRegistry {
    processors: HashMap<&'static str, Box<dyn EventProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Registry pre-loaded with every built-in processor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DemandCreate));
        registry.register(Box::new(DemandComment));
        registry.register(Box::new(Match2Propose));
        registry.register(Box::new(Match2Accept));
        registry.register(Box::new(Match2AcceptFinal));
        registry.register(Box::new(Match2Reject));
        registry.register(Box::new(Match2Cancel));
        registry.register(Box::new(PermissionCreate));
        registry.register(Box::new(PermissionRevoke));
        registry
    }

    pub fn register(&mut self, processor: Box<dyn EventProcessor>) {
        self.processors.insert(processor.process_id(), processor);
    }

    pub fn resolve(&self, process_id: &str) -> Result<&dyn EventProcessor, IndexerError> {
        self.processors
            .get(process_id)
            .map(|p| p.as_ref())
            .ok_or_else(|| IndexerError::UnknownProcess(process_id.to_string()))
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ─── shared processor plumbing ───────────────────────────────────────────────

pub(crate) fn check_version(process_id: &str, version: u32) -> Result<(), IndexerError> {
    if version != SUPPORTED_VERSION {
        return Err(IndexerError::UnsupportedProcessVersion {
            id: process_id.to_string(),
            version,
        });
    }
    Ok(())
}

pub(crate) fn malformed(process_id: &str, reason: impl Into<String>) -> IndexerError {
    IndexerError::MalformedEvent {
        process: process_id.to_string(),
        reason: reason.into(),
    }
}

/// Settle a matched transaction: promote it to finalised and claim its
/// causal slot so competing submissions for the same local id fail at
/// commit time.
pub(crate) fn settle(changes: &mut ChangeSet, matched_tx: Option<&Transaction>) {
    if let Some(tx) = matched_tx {
        changes.set_transaction_state(tx.id, TransactionState::Finalised);
        changes.claim_slot(tx.local_id, tx.hash.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_process() {
        let registry = ProcessorRegistry::with_defaults();
        assert_eq!(
            registry.resolve("demand_create").unwrap().process_id(),
            "demand_create"
        );
    }

    #[test]
    fn resolve_unknown_process_errors() {
        let registry = ProcessorRegistry::with_defaults();
        // err() rather than unwrap_err(): the Ok side is a trait object
        // without Debug.
        let err = registry.resolve("demand_destroy").err().unwrap();
        assert!(matches!(err, IndexerError::UnknownProcess(p) if p == "demand_destroy"));
    }

    #[test]
    fn defaults_cover_the_full_process_family() {
        let registry = ProcessorRegistry::with_defaults();
        for id in [
            "demand_create",
            "demand_comment",
            "match2_propose",
            "match2_accept",
            "match2_accept_final",
            "match2_reject",
            "match2_cancel",
            "permission_create",
            "permission_revoke",
        ] {
            assert!(registry.resolve(id).is_ok(), "missing processor for {id}");
        }
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let registry = ProcessorRegistry::with_defaults();
        let processor = registry.resolve("demand_create").unwrap();
        let err = processor.run(2, None, "5GrwvaEF", &[], &[]).unwrap_err();
        assert!(matches!(
            err,
            IndexerError::UnsupportedProcessVersion { version: 2, .. }
        ));
    }
}
