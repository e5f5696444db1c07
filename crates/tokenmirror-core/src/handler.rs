//! Per-event decision layer: resolves token references, correlates the
//! event with any locally-submitted transaction, dispatches to the right
//! processor, and folds the result into the block's accumulated ChangeSet.
//!
//! No storage writes happen here — the block processor commits.

use std::collections::HashMap;

use crate::changeset::{ChangeSet, LocalRef};
use crate::error::IndexerError;
use crate::processors::ProcessorRegistry;
use crate::storage::IndexerStorage;
use crate::types::{ProcessRanEvent, TokenId};

/// An input token id with the local entity it resolved to, if any.
///
/// `local` is `None` when neither the in-flight ChangeSet nor persisted
/// storage knows the token — whether that aborts the event is the owning
/// processor's policy.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub token_id: TokenId,
    pub local: Option<LocalRef>,
}

/// An output token id minted by the event. Roles and metadata default to
/// empty; enrichment is the responsibility of the specific processor.
#[derive(Debug, Clone, Default)]
pub struct ResolvedOutput {
    pub token_id: TokenId,
    pub roles: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
}

impl ResolvedOutput {
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            ..Default::default()
        }
    }
}

/// Two-tier token resolution: the in-flight ChangeSet first (tokens minted
/// earlier in the same block shadow the database), persisted storage second.
/// A miss is an explicit `None`, not an error — callers decide whether a
/// missing mapping is acceptable.
pub async fn resolve_local_id(
    token_id: TokenId,
    in_flight: &ChangeSet,
    storage: &dyn IndexerStorage,
) -> Result<Option<LocalRef>, IndexerError> {
    if let Some(local) = in_flight.find_local_id_by_token(token_id) {
        return Ok(Some(local));
    }
    storage.find_local_id_by_token(token_id).await
}

/// Translate one decoded ledger event plus the accumulated in-block
/// ChangeSet into an updated ChangeSet.
///
/// An unknown process id is fatal to the whole block and propagates.
pub async fn handle_event(
    registry: &ProcessorRegistry,
    storage: &dyn IndexerStorage,
    event: &ProcessRanEvent,
    accumulated: ChangeSet,
) -> Result<ChangeSet, IndexerError> {
    let processor = registry.resolve(&event.process.id)?;

    let mut inputs = Vec::with_capacity(event.inputs.len());
    for &token_id in &event.inputs {
        let local = resolve_local_id(token_id, &accumulated, storage).await?;
        if local.is_none() && !processor.tolerates_unresolved_inputs() {
            return Err(IndexerError::UnresolvedToken { token_id });
        }
        inputs.push(ResolvedInput { token_id, local });
    }

    let outputs: Vec<ResolvedOutput> = event
        .outputs
        .iter()
        .map(|&token_id| ResolvedOutput::new(token_id))
        .collect();

    // Absence is valid: most events originate from actions other nodes
    // submitted.
    let matched_tx = storage.find_transaction_by_hash(&event.call_hash).await?;

    tracing::debug!(
        process = %event.process.id,
        version = event.process.version,
        inputs = inputs.len(),
        outputs = outputs.len(),
        matched_tx = matched_tx.is_some(),
        "dispatching event"
    );

    let fragment = processor.run(
        event.process.version,
        matched_tx.as_ref(),
        &event.sender,
        &inputs,
        &outputs,
    )?;

    Ok(accumulated.merge(fragment))
}
