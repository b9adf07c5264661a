//! On-demand, independently-schedulable resolution.
//!
//! [`AsyncResolver::create_transaction`] submits a resolution to its own
//! tokio task and hands back the `JoinHandle`, so any number of hashes can
//! be resolved concurrently with the block scanner. The underlying walk
//! also self-heals out-of-order imports: when a hash fails on a missing
//! upstream output, the referenced transaction is resolved first and the
//! original retried. A UTXO ledger is acyclic by construction, so the walk
//! terminates; a visited set and a depth cap guard against malformed input
//! data anyway.

use std::collections::HashSet;
use std::sync::Arc;

use bitcoin::Txid;
use tokio::task::JoinHandle;

use crate::error::ImportError;
use crate::resolver::TransactionResolver;
use crate::status::StatusReporter;
use crate::types::Transaction;

/// Bounds for the ancestor walk.
#[derive(Debug, Clone)]
pub struct ResolveLimits {
    /// Maximum chain of unresolved ancestors followed from the requested
    /// hash before giving up and surfacing the unresolved reference.
    pub max_ancestor_depth: usize,
}

impl Default for ResolveLimits {
    fn default() -> Self {
        Self {
            max_ancestor_depth: 100,
        }
    }
}

pub struct AsyncResolver {
    resolver: Arc<TransactionResolver>,
    status: Arc<StatusReporter>,
    limits: ResolveLimits,
}

impl AsyncResolver {
    pub fn new(
        resolver: Arc<TransactionResolver>,
        status: Arc<StatusReporter>,
        limits: ResolveLimits,
    ) -> Self {
        Self {
            resolver,
            status,
            limits,
        }
    }

    /// Resolve `txid` on a background task, ancestors first where needed.
    ///
    /// The handle resolves to the persisted transaction or the failure that
    /// ended the attempt; either way the failure is also reported. Callers
    /// that only want the side effect may drop the handle.
    pub fn create_transaction(self: &Arc<Self>, txid: Txid) -> JoinHandle<Result<Transaction, ImportError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.resolve_with_ancestors(txid).await;
            if let Err(err) = &result {
                this.status
                    .add_error(format!("async resolution of {txid} failed: {err}"))
                    .await;
            }
            result
        })
    }

    /// Resolve `txid`, recursively resolving missing ancestors first.
    ///
    /// Depth-first over the unresolved-reference chain: each
    /// `UnresolvedReference` pushes the missing ancestor; each success pops.
    /// Returns the requested transaction once the whole chain is persisted.
    pub async fn resolve_with_ancestors(&self, txid: Txid) -> Result<Transaction, ImportError> {
        let mut stack = vec![txid];
        let mut visited = HashSet::from([txid]);

        loop {
            let current = *stack
                .last()
                .expect("the requested txid stays on the stack until it resolves");
            match self.resolver.resolve(&current).await {
                Ok(tx) => {
                    stack.pop();
                    if stack.is_empty() {
                        return Ok(tx);
                    }
                }
                Err(ImportError::UnresolvedReference { outpoint, .. })
                    if stack.len() < self.limits.max_ancestor_depth =>
                {
                    if !visited.insert(outpoint.txid) {
                        // A well-formed ledger cannot revisit an ancestor
                        // that is still unresolved.
                        return Err(ImportError::Mapping(format!(
                            "reference cycle through {}",
                            outpoint.txid
                        )));
                    }
                    stack.push(outpoint.txid);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DEFAULT_FETCH_CACHE_CAPACITY;
    use crate::rpc::mock::MockRpc;
    use crate::store::{GraphStore, MemoryStore};
    use crate::test_util::{
        coinbase_vin, make_raw_tx, paying_vout, spending_vin, txid_from_byte,
    };

    fn async_resolver_over(
        rpc: MockRpc,
        limits: ResolveLimits,
    ) -> (Arc<AsyncResolver>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(TransactionResolver::new(
            Arc::new(rpc),
            store.clone(),
            Arc::new(StatusReporter::default()),
            DEFAULT_FETCH_CACHE_CAPACITY,
        ));
        let tasks = Arc::new(AsyncResolver::new(
            resolver,
            Arc::new(StatusReporter::default()),
            limits,
        ));
        (tasks, store)
    }

    /// coinbase -> mid -> tip, all unknown to the store.
    fn three_tx_chain() -> (MockRpc, Txid) {
        let coinbase = txid_from_byte(1);
        let mid = txid_from_byte(2);
        let tip = txid_from_byte(3);
        let rpc = MockRpc::builder()
            .with_tx(make_raw_tx(
                coinbase,
                vec![coinbase_vin()],
                vec![paying_vout(0, 50.0, "a1")],
            ))
            .with_tx(make_raw_tx(
                mid,
                vec![spending_vin(coinbase, 0)],
                vec![paying_vout(0, 49.0, "a2")],
            ))
            .with_tx(make_raw_tx(
                tip,
                vec![spending_vin(mid, 0)],
                vec![paying_vout(0, 48.0, "a3")],
            ))
            .build();
        (rpc, tip)
    }

    #[tokio::test]
    async fn heals_a_missing_ancestor_chain() {
        let (rpc, tip) = three_tx_chain();
        let (tasks, store) = async_resolver_over(rpc, ResolveLimits::default());

        let tx = tasks
            .create_transaction(tip)
            .await
            .expect("task completes")
            .expect("chain heals ancestors-first");
        assert_eq!(tx.txid, tip);
        assert_eq!(
            store
                .stats()
                .await
                .expect("memory store never fails")
                .transaction_count,
            3
        );
    }

    #[tokio::test]
    async fn depth_cap_surfaces_the_unresolved_reference() {
        let (rpc, tip) = three_tx_chain();
        // Cap of 2 allows tip + mid but not the coinbase underneath.
        let (tasks, store) = async_resolver_over(
            rpc,
            ResolveLimits {
                max_ancestor_depth: 2,
            },
        );

        let err = tasks
            .resolve_with_ancestors(tip)
            .await
            .expect_err("chain is deeper than the cap");
        assert!(matches!(err, ImportError::UnresolvedReference { .. }));
        assert_eq!(
            store
                .stats()
                .await
                .expect("memory store never fails")
                .transaction_count,
            0
        );
    }

    #[tokio::test]
    async fn reference_cycle_terminates_with_an_error() {
        let a = txid_from_byte(1);
        let b = txid_from_byte(2);
        // Malformed by construction: a spends b and b spends a.
        let rpc = MockRpc::builder()
            .with_tx(make_raw_tx(
                a,
                vec![spending_vin(b, 0)],
                vec![paying_vout(0, 1.0, "a1")],
            ))
            .with_tx(make_raw_tx(
                b,
                vec![spending_vin(a, 0)],
                vec![paying_vout(0, 1.0, "a2")],
            ))
            .build();
        let (tasks, _) = async_resolver_over(rpc, ResolveLimits::default());

        let err = tasks
            .resolve_with_ancestors(a)
            .await
            .expect_err("cycle must not loop forever");
        assert!(matches!(err, ImportError::Mapping(_)));
    }

    #[tokio::test]
    async fn malformed_revisited_reference_terminates() {
        let a = txid_from_byte(1);
        let coinbase = txid_from_byte(2);
        // `a` spends an output index the coinbase does not have: the
        // ancestor resolves fine but the reference stays unresolvable.
        let rpc = MockRpc::builder()
            .with_tx(make_raw_tx(
                coinbase,
                vec![coinbase_vin()],
                vec![paying_vout(0, 50.0, "a1")],
            ))
            .with_tx(make_raw_tx(
                a,
                vec![spending_vin(coinbase, 7)],
                vec![paying_vout(0, 1.0, "a2")],
            ))
            .build();
        let (tasks, _) = async_resolver_over(rpc, ResolveLimits::default());

        let err = tasks
            .resolve_with_ancestors(a)
            .await
            .expect_err("out-of-range output index can never bind");
        assert!(matches!(err, ImportError::Mapping(_)));
    }

    #[tokio::test]
    async fn handle_returns_typed_failure() {
        let missing = txid_from_byte(9);
        let (tasks, _) = async_resolver_over(MockRpc::builder().build(), ResolveLimits::default());

        let result = tasks
            .create_transaction(missing)
            .await
            .expect("task completes");
        assert!(matches!(result, Err(ImportError::Fetch(_))));
    }
}
