//! Block registration: keeping the store's block list caught up with the
//! node.
//!
//! One block per cycle, lowest missing height first. Hashes and transaction
//! lists are taken from the node as-is — header validation and consensus
//! are someone else's problem.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ImportError;
use crate::rpc::BitcoinRpc;
use crate::status::StatusReporter;
use crate::store::GraphStore;
use crate::types::{Block, BlockHeight};

/// Importer cadence.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Delay between cycles while catching up to the node.
    pub poll_interval: Duration,
    /// Delay once the store has reached the node's tip.
    pub idle_interval: Duration,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            idle_interval: Duration::from_secs(30),
        }
    }
}

/// Result of one import cycle.
#[derive(Debug)]
pub enum FeedOutcome {
    /// A new block record was stored at this height.
    Registered(BlockHeight),
    /// The store already holds every block the node has.
    AtTip,
}

pub struct BlockImporter {
    rpc: Arc<dyn BitcoinRpc>,
    store: Arc<dyn GraphStore>,
    status: Arc<StatusReporter>,
    config: ImporterConfig,
}

impl BlockImporter {
    pub fn new(
        rpc: Arc<dyn BitcoinRpc>,
        store: Arc<dyn GraphStore>,
        status: Arc<StatusReporter>,
        config: ImporterConfig,
    ) -> Self {
        Self {
            rpc,
            store,
            status,
            config,
        }
    }

    /// Register the next missing block, if the node has one.
    pub async fn run_once(&self) -> Result<FeedOutcome, ImportError> {
        let next = match self.store.best_block_height().await? {
            Some(height) => height.next(),
            None => BlockHeight(0),
        };

        let tip = self.rpc.get_block_count().await?;
        if u64::from(next.0) > tip {
            return Ok(FeedOutcome::AtTip);
        }

        let hash = self.rpc.get_block_hash(next).await?;
        let raw = self.rpc.get_block(&hash).await?;
        let block = Block {
            height: BlockHeight(raw.height),
            hash: raw.hash,
            tx_hashes: raw.tx,
            transactions_imported: false,
        };
        self.store.save_block(block).await?;
        self.status
            .add_log(format!("block {next} registered for import"))
            .await;
        Ok(FeedOutcome::Registered(next))
    }

    /// Drive [`run_once`](Self::run_once) forever on the configured cadence.
    /// Failures are reported and retried, never fatal.
    pub async fn run(&self) {
        loop {
            let delay = match self.run_once().await {
                Ok(FeedOutcome::Registered(_)) => self.config.poll_interval,
                Ok(FeedOutcome::AtTip) => self.config.idle_interval,
                Err(err) => {
                    self.status
                        .add_error(format!("block registration failed: {err}"))
                        .await;
                    self.config.poll_interval
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}
