//! Live watch loop: catch up, then poll the finalized tip until shutdown.

use std::time::Duration;

use tokio::sync::watch;

use tokenmirror_core::error::IndexerError;

use crate::chain::ChainClient;
use crate::processor::BlockProcessor;

/// Signals a running [`Watcher`] to stop after its current iteration.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Polls the chain's finalized tip and drives a [`BlockProcessor`].
///
/// Retryable failures (storage or chain connectivity) are logged and retried
/// on the next tick. Fatal failures (unknown process, malformed event, reorg
/// gap) are logged at error level; progress stays pinned at the failing
/// block until an operator intervenes, so downstream state never skips it.
pub struct Watcher<C> {
    processor: BlockProcessor<C>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<C: ChainClient> Watcher<C> {
    pub fn new(processor: BlockProcessor<C>) -> (Self, ShutdownHandle) {
        let (tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                processor,
                shutdown_rx,
            },
            ShutdownHandle { tx },
        )
    }

    /// Run until shutdown. Performs an initial catch-up pass, then polls at
    /// the configured interval.
    pub async fn run(mut self) -> Result<(), IndexerError> {
        let chain = self.processor.config().chain.clone();
        let interval = Duration::from_millis(self.processor.config().poll_interval_ms);
        tracing::info!(chain = %chain, poll_ms = interval.as_millis() as u64, "watcher starting");

        self.tick(&chain).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&chain).await;
                }
                res = self.shutdown_rx.changed() => {
                    if res.is_err() || *self.shutdown_rx.borrow() {
                        tracing::info!(chain = %chain, "watcher stopping");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn tick(&mut self, chain: &str) {
        match self.processor.catch_up().await {
            Ok(0) => {}
            Ok(applied) => {
                tracing::debug!(chain = %chain, applied, "caught up");
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(chain = %chain, error = %err, "transient failure, will retry");
            }
            Err(err) => {
                tracing::error!(chain = %chain, error = %err, "indexing halted at current block");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexerConfig;
    use crate::testing::ScriptedChain;
    use std::sync::Arc;

    use tokenmirror_core::processors::ProcessorRegistry;
    use tokenmirror_core::storage::IndexerStorage;
    use tokenmirror_core::types::BlockHash;
    use tokenmirror_storage::InMemoryStorage;

    #[tokio::test]
    async fn watcher_catches_up_and_stops_on_shutdown() {
        let mut chain = ScriptedChain::new();
        chain.add_block("0xa1", 1, "0x00", vec![]);
        chain.add_block("0xa2", 2, "0xa1", vec![]);
        chain.set_finalized("0xa2");

        let storage = Arc::new(InMemoryStorage::new());
        let processor = BlockProcessor::new(
            chain,
            storage.clone(),
            ProcessorRegistry::with_defaults(),
            IndexerConfig {
                poll_interval_ms: 10,
                ..Default::default()
            },
        );

        let (watcher, handle) = Watcher::new(processor);
        let task = tokio::spawn(watcher.run());

        for _ in 0..100 {
            if storage.last_processed_block().await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let last = storage.last_processed_block().await.unwrap().unwrap();
        assert_eq!(last.hash, BlockHash::parse("0xa2"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn watcher_survives_transient_chain_failure() {
        // No finalized tip scripted: every poll fails with a chain error.
        let chain = ScriptedChain::new();
        let storage = Arc::new(InMemoryStorage::new());
        let processor = BlockProcessor::new(
            chain,
            storage.clone(),
            ProcessorRegistry::with_defaults(),
            IndexerConfig {
                poll_interval_ms: 5,
                ..Default::default()
            },
        );

        let (watcher, handle) = Watcher::new(processor);
        let task = tokio::spawn(watcher.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(storage.last_processed_block().await.unwrap().is_none());

        handle.shutdown();
        task.await.unwrap().unwrap();
    }
}
