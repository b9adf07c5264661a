//! Sequential block-by-block transaction import.
//!
//! Each cycle picks the lowest block whose transactions are not yet fully
//! imported and resolves its hashes strictly in order; the block is marked
//! imported only when every non-genesis hash has a persisted record. The
//! scanner holds no locks and takes no precautions against concurrent
//! resolution of the same hashes elsewhere — the resolver's idempotency is
//! the whole correctness story.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use bitcoin::Txid;

use crate::async_resolver::AsyncResolver;
use crate::error::{ImportError, StoreError};
use crate::resolver::TransactionResolver;
use crate::status::StatusReporter;
use crate::store::GraphStore;
use crate::types::BlockHeight;

/// The chain's first coinbase transactions. They are listed on their blocks
/// but not retrievable through `getrawtransaction`, so the scanner skips
/// them instead of failing the block forever.
static GENESIS_COINBASE_TXIDS: LazyLock<[Txid; 2]> = LazyLock::new(|| {
    [
        "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            .parse()
            .expect("static genesis txid"),
        "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098"
            .parse()
            .expect("static genesis txid"),
    ]
});

/// Whether `txid` is one of the reserved genesis coinbase placeholders.
pub fn is_genesis_coinbase(txid: &Txid) -> bool {
    GENESIS_COINBASE_TXIDS.contains(txid)
}

/// Scan cadence.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Delay between cycles while there are blocks to work on.
    pub poll_interval: Duration,
    /// Delay when no incomplete block was found.
    pub idle_interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(10),
        }
    }
}

/// Result of one scan cycle.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Every transaction on the block resolved; the block is marked imported.
    Imported(BlockHeight),
    /// A resolution failed; the block stays incomplete and is retried on a
    /// later cycle.
    Aborted(BlockHeight),
    /// No incomplete block in the store.
    Idle,
}

pub struct BlockScanner {
    store: Arc<dyn GraphStore>,
    resolver: Arc<TransactionResolver>,
    tasks: Arc<AsyncResolver>,
    status: Arc<StatusReporter>,
    config: ScannerConfig,
}

impl BlockScanner {
    pub fn new(
        store: Arc<dyn GraphStore>,
        resolver: Arc<TransactionResolver>,
        tasks: Arc<AsyncResolver>,
        status: Arc<StatusReporter>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            tasks,
            status,
            config,
        }
    }

    /// Run one scan cycle.
    ///
    /// The first failure of any kind aborts the block immediately: it is not
    /// marked imported and the cycle ends. When the failure is an unresolved
    /// reference, the missing ancestor is additionally handed to the async
    /// resolver so the next pass over this block can succeed.
    pub async fn run_once(&self) -> Result<ScanOutcome, StoreError> {
        let Some(mut block) = self.store.find_first_incomplete_block().await? else {
            return Ok(ScanOutcome::Idle);
        };

        let height = block.height;
        self.status
            .add_log(format!("importing transactions of block {height}"))
            .await;

        for txid in &block.tx_hashes {
            if is_genesis_coinbase(txid) {
                continue;
            }
            if let Err(err) = self.resolver.resolve(txid).await {
                self.status
                    .add_error(format!("block {height}: resolving {txid}: {err}"))
                    .await;
                if let ImportError::UnresolvedReference { outpoint, .. } = err {
                    // Heal the missing ancestor off-cycle; this block is
                    // retried after the poll interval either way.
                    drop(self.tasks.create_transaction(outpoint.txid));
                }
                return Ok(ScanOutcome::Aborted(height));
            }
        }

        block.transactions_imported = true;
        self.store.save_block(block).await?;
        self.status
            .add_log(format!("block {height} fully imported"))
            .await;
        Ok(ScanOutcome::Imported(height))
    }

    /// Drive [`run_once`](Self::run_once) forever on the configured cadence.
    /// Store failures are reported and retried, never fatal.
    pub async fn run(&self) {
        loop {
            let delay = match self.run_once().await {
                Ok(ScanOutcome::Idle) => self.config.idle_interval,
                Ok(_) => self.config.poll_interval,
                Err(err) => {
                    self.status
                        .add_error(format!("scan cycle failed: {err}"))
                        .await;
                    self.config.poll_interval
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}
