//! The resolve-and-link algorithm.
//!
//! [`TransactionResolver::resolve`] turns a transaction hash into a
//! persisted, fully-linked graph record. It is the single write path for
//! transactions and the place where the system's invariants live:
//!
//! - **Idempotent.** A hash already in the store returns immediately; no
//!   refetch, no re-link. Two concurrent attempts at the same new hash both
//!   succeed, with exactly one record persisted — the loser adopts the
//!   winner's record and its own staged edges are never applied.
//! - **All-or-nothing.** Any failure before the atomic save leaves zero
//!   state behind; an input requiring a reference is never stored unbound.
//! - **Out-of-order tolerant.** A missing upstream output aborts with
//!   [`ImportError::UnresolvedReference`] carrying the outpoint, so callers
//!   can resolve the ancestor first and retry.
//!
//! Both entry points — the sequential block scanner and on-demand async
//! resolution — funnel through this one implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bitcoin::{OutPoint, Txid};
use lru::LruCache;
use tokio::sync::RwLock;

use crate::error::ImportError;
use crate::mapper;
use crate::rpc::{BitcoinRpc, RawTransaction};
use crate::status::StatusReporter;
use crate::store::{GraphStore, SaveOutcome};
use crate::types::{InputRef, LinkedTransaction, Transaction};

/// Default capacity of the raw fetch cache.
pub const DEFAULT_FETCH_CACHE_CAPACITY: usize = 10_000;

pub struct TransactionResolver {
    rpc: Arc<dyn BitcoinRpc>,
    store: Arc<dyn GraphStore>,
    status: Arc<StatusReporter>,
    /// Raw payloads fetched but not yet persisted. A resolution that aborts
    /// on an unresolved reference leaves its payload here, so the retry
    /// after the ancestor lands does not refetch. Entries are dropped once
    /// the transaction is persisted — from then on the store short-circuit
    /// answers first.
    fetch_cache: RwLock<LruCache<Txid, RawTransaction>>,
}

impl TransactionResolver {
    pub fn new(
        rpc: Arc<dyn BitcoinRpc>,
        store: Arc<dyn GraphStore>,
        status: Arc<StatusReporter>,
        fetch_cache_capacity: usize,
    ) -> Self {
        Self {
            rpc,
            store,
            status,
            fetch_cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(fetch_cache_capacity.max(1)).expect("max(1) is non-zero"),
            )),
        }
    }

    /// Resolve `txid` into a persisted transaction.
    ///
    /// Fetches the raw payload, binds every spending input to the output it
    /// references, stages deposit and withdrawal edges for each touched
    /// address, and persists the whole result as one unit. See the module
    /// docs for the invariants.
    pub async fn resolve(&self, txid: &Txid) -> Result<Transaction, ImportError> {
        if let Some(existing) = self.store.find_transaction(txid).await? {
            tracing::debug!(%txid, "transaction already persisted");
            return Ok(existing);
        }

        let raw = self.fetch_raw(txid).await?;
        let mut tx = mapper::to_domain(&raw)?;

        // Bind each spending input to the output it references and stage a
        // withdrawal edge per funding address. A missing reference aborts
        // before anything is persisted.
        let mut withdrawals = Vec::new();
        for input in &mut tx.inputs {
            let Some(outpoint) = input.outpoint else {
                continue; // coinbase
            };
            let funding = self.store.find_output(&outpoint).await?.ok_or(
                ImportError::UnresolvedReference {
                    txid: *txid,
                    input_index: input.index,
                    outpoint,
                },
            )?;
            input.value = Some(funding.value);
            for address in &funding.addresses {
                self.store.find_or_create_address(address).await?;
                withdrawals.push((address.clone(), InputRef::new(*txid, input.index)));
            }
        }

        // Stage a deposit edge per output address.
        let mut deposits = Vec::new();
        for output in &tx.outputs {
            for address in &output.addresses {
                self.store.find_or_create_address(address).await?;
                deposits.push((address.clone(), OutPoint::new(*txid, output.index)));
            }
        }

        let linked = LinkedTransaction {
            transaction: tx,
            deposits,
            withdrawals,
        };
        let saved = match self.store.save_transaction(linked).await? {
            SaveOutcome::Created(tx) => {
                self.status.add_log(format!("transaction {txid} created")).await;
                tx
            }
            SaveOutcome::AlreadyExists(winner) => {
                // A concurrent resolution won the race. Its record is
                // authoritative and our staged edges were never applied.
                tracing::debug!(%txid, "concurrent resolution won; adopting existing record");
                winner
            }
        };

        self.fetch_cache.write().await.pop(txid);
        Ok(saved)
    }

    async fn fetch_raw(&self, txid: &Txid) -> Result<RawTransaction, ImportError> {
        if let Some(raw) = self.fetch_cache.write().await.get(txid) {
            return Ok(raw.clone());
        }

        let raw = self.rpc.get_raw_transaction(txid).await?;
        self.fetch_cache.write().await.put(*txid, raw.clone());
        Ok(raw)
    }
}
