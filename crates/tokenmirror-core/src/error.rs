//! Error taxonomy for the reconciliation engine.

use thiserror::Error;

use crate::types::TokenId;

/// Errors that can occur while reconciling ledger events.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// An event references a process id with no registered handler.
    /// Fatal to the enclosing block — it must not be applied partially
    /// and the engine must not advance past it.
    #[error("no event processor registered for process '{0}'")]
    UnknownProcess(String),

    #[error("process '{id}' does not support version {version}")]
    UnsupportedProcessVersion { id: String, version: u32 },

    /// An input token id could not be mapped to a local entity via the
    /// in-flight ChangeSet or persisted storage, and the processor for the
    /// event does not tolerate externally-originated inputs.
    #[error("token {token_id} does not resolve to a local entity")]
    UnresolvedToken { token_id: TokenId },

    /// The event's token shape does not match what its process mints/burns.
    #[error("malformed '{process}' event: {reason}")]
    MalformedEvent { process: String, reason: String },

    /// The atomic per-block commit failed; the block's mutation set was
    /// rolled back and the block remains unprocessed for retry.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("chain client error: {0}")]
    Chain(String),

    /// The ancestor walk from a finalized tip found no processed block
    /// within the configured bound — a missed notification or chain data
    /// loss, reported rather than silently truncated.
    #[error("no processed ancestor within {max_depth} blocks of {tip}")]
    ReorgGap { tip: String, max_depth: u64 },
}

impl IndexerError {
    /// Returns `true` for failures the watch loop retries on the next
    /// notification or poll, as opposed to misconfiguration that needs an
    /// operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Chain(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(IndexerError::Storage("busy".into()).is_retryable());
        assert!(IndexerError::Chain("timeout".into()).is_retryable());
        assert!(!IndexerError::UnknownProcess("x".into()).is_retryable());
        assert!(!IndexerError::ReorgGap { tip: "0xa".into(), max_depth: 10 }.is_retryable());
    }
}
