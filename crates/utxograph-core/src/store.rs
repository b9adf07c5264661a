//! The graph persistence seam.
//!
//! [`GraphStore`] is the storage contract the import pipeline is written
//! against: keyed lookup and creation of transactions, outputs, addresses,
//! and blocks, with two load-bearing guarantees the resolver relies on:
//!
//! - **Transaction-id uniqueness.** `save_transaction` persists at most one
//!   record per txid. A second save of the same txid returns
//!   [`SaveOutcome::AlreadyExists`] with the winning record and applies
//!   nothing — this is how concurrent resolution races are absorbed.
//! - **All-or-nothing saves.** The transaction record and all of its staged
//!   address edges are applied as one unit; a losing or failing save leaves
//!   no edge behind.
//!
//! [`MemoryStore`] is the in-memory reference implementation. Backends with
//! real durability implement the same trait.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bitcoin::{OutPoint, Txid};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{AddressRecord, Block, BlockHeight, LinkedTransaction, Output, Transaction};

// ==============================================================================
// Trait
// ==============================================================================

/// Result of an attempted transaction save.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// The record was persisted, with all staged address edges applied.
    Created(Transaction),
    /// A record with this txid already existed; nothing was applied. Carries
    /// the winning record so the caller can treat the race as success.
    AlreadyExists(Transaction),
}

/// Entity counts for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub block_count: usize,
    pub blocks_imported: usize,
    pub transaction_count: usize,
    pub address_count: usize,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Look up a transaction by txid.
    async fn find_transaction(&self, txid: &Txid) -> Result<Option<Transaction>, StoreError>;

    /// Look up the output a spending input references. `None` when either
    /// the transaction or the output index is absent.
    async fn find_output(&self, outpoint: &OutPoint) -> Result<Option<Output>, StoreError>;

    /// Fetch the canonical record for an address, creating an empty one on
    /// first reference. There is a single record per address string.
    async fn find_or_create_address(&self, address: &str) -> Result<AddressRecord, StoreError>;

    /// Look up an address without creating it.
    async fn find_address(&self, address: &str) -> Result<Option<AddressRecord>, StoreError>;

    /// Look up a block by height.
    async fn find_block(&self, height: BlockHeight) -> Result<Option<Block>, StoreError>;

    /// The lowest block whose transactions have not all been imported yet,
    /// in ascending height order.
    async fn find_first_incomplete_block(&self) -> Result<Option<Block>, StoreError>;

    /// Height of the highest stored block, imported or not.
    async fn best_block_height(&self) -> Result<Option<BlockHeight>, StoreError>;

    /// Persist a fully-linked transaction and its address edges atomically.
    /// Enforces the txid uniqueness constraint; see [`SaveOutcome`].
    async fn save_transaction(
        &self,
        linked: LinkedTransaction,
    ) -> Result<SaveOutcome, StoreError>;

    /// Insert or update a block record.
    async fn save_block(&self, block: Block) -> Result<(), StoreError>;

    /// Entity counts.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

// ==============================================================================
// In-Memory Implementation
// ==============================================================================

#[derive(Default)]
struct GraphInner {
    blocks: BTreeMap<BlockHeight, Block>,
    transactions: HashMap<Txid, Transaction>,
    addresses: HashMap<String, AddressRecord>,
}

/// In-memory [`GraphStore`] over `tokio::sync::RwLock`-guarded maps.
///
/// `save_transaction` holds the write lock across the uniqueness check and
/// all edge application, which is what makes the resolver's
/// check-then-fetch-then-persist pattern race-safe against itself.
pub struct MemoryStore {
    inner: RwLock<GraphInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn find_transaction(&self, txid: &Txid) -> Result<Option<Transaction>, StoreError> {
        Ok(self.inner.read().await.transactions.get(txid).cloned())
    }

    async fn find_output(&self, outpoint: &OutPoint) -> Result<Option<Output>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .transactions
            .get(&outpoint.txid)
            .and_then(|tx| tx.output(outpoint.vout))
            .cloned())
    }

    async fn find_or_create_address(&self, address: &str) -> Result<AddressRecord, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .addresses
            .entry(address.to_owned())
            .or_insert_with(|| AddressRecord::new(address))
            .clone())
    }

    async fn find_address(&self, address: &str) -> Result<Option<AddressRecord>, StoreError> {
        Ok(self.inner.read().await.addresses.get(address).cloned())
    }

    async fn find_block(&self, height: BlockHeight) -> Result<Option<Block>, StoreError> {
        Ok(self.inner.read().await.blocks.get(&height).cloned())
    }

    async fn find_first_incomplete_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .blocks
            .values()
            .find(|block| !block.transactions_imported)
            .cloned())
    }

    async fn best_block_height(&self) -> Result<Option<BlockHeight>, StoreError> {
        Ok(self.inner.read().await.blocks.keys().next_back().copied())
    }

    async fn save_transaction(
        &self,
        linked: LinkedTransaction,
    ) -> Result<SaveOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let txid = linked.transaction.txid;

        if let Some(existing) = inner.transactions.get(&txid) {
            return Ok(SaveOutcome::AlreadyExists(existing.clone()));
        }

        for (address, outpoint) in linked.deposits {
            inner
                .addresses
                .entry(address.clone())
                .or_insert_with(|| AddressRecord::new(address))
                .deposits
                .insert(outpoint);
        }
        for (address, input_ref) in linked.withdrawals {
            inner
                .addresses
                .entry(address.clone())
                .or_insert_with(|| AddressRecord::new(address))
                .withdrawals
                .insert(input_ref);
        }

        inner.transactions.insert(txid, linked.transaction.clone());
        Ok(SaveOutcome::Created(linked.transaction))
    }

    async fn save_block(&self, block: Block) -> Result<(), StoreError> {
        self.inner.write().await.blocks.insert(block.height, block);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = self.inner.read().await;
        Ok(StoreStats {
            block_count: inner.blocks.len(),
            blocks_imported: inner
                .blocks
                .values()
                .filter(|b| b.transactions_imported)
                .count(),
            transaction_count: inner.transactions.len(),
            address_count: inner.addresses.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{make_block, make_transaction, txid_from_byte};
    use crate::types::InputRef;

    #[tokio::test]
    async fn save_enforces_txid_uniqueness() {
        let store = MemoryStore::new();
        let tx = make_transaction(txid_from_byte(1));

        let first = store
            .save_transaction(LinkedTransaction {
                transaction: tx.clone(),
                deposits: Vec::new(),
                withdrawals: Vec::new(),
            })
            .await
            .expect("memory store never fails");
        assert!(matches!(first, SaveOutcome::Created(_)));

        let second = store
            .save_transaction(LinkedTransaction {
                transaction: tx,
                deposits: Vec::new(),
                withdrawals: Vec::new(),
            })
            .await
            .expect("memory store never fails");
        assert!(matches!(second, SaveOutcome::AlreadyExists(_)));

        let stats = store.stats().await.expect("memory store never fails");
        assert_eq!(stats.transaction_count, 1);
    }

    #[tokio::test]
    async fn losing_save_applies_no_edges() {
        let store = MemoryStore::new();
        let tx = make_transaction(txid_from_byte(1));
        let outpoint = OutPoint::new(tx.txid, 0);

        store
            .save_transaction(LinkedTransaction {
                transaction: tx.clone(),
                deposits: vec![("winner-addr".to_owned(), outpoint)],
                withdrawals: Vec::new(),
            })
            .await
            .expect("memory store never fails");

        // Same txid with different staged edges: must be rejected wholesale.
        store
            .save_transaction(LinkedTransaction {
                transaction: tx.clone(),
                deposits: vec![("loser-addr".to_owned(), outpoint)],
                withdrawals: vec![(
                    "loser-addr".to_owned(),
                    InputRef::new(txid_from_byte(2), 0),
                )],
            })
            .await
            .expect("memory store never fails");

        let winner = store
            .find_address("winner-addr")
            .await
            .expect("memory store never fails")
            .expect("winner edges applied");
        assert!(winner.deposits.contains(&outpoint));
        assert!(store
            .find_address("loser-addr")
            .await
            .expect("memory store never fails")
            .is_none());
    }

    #[tokio::test]
    async fn find_output_requires_both_tx_and_index() {
        let store = MemoryStore::new();
        let tx = make_transaction(txid_from_byte(1));
        store
            .save_transaction(LinkedTransaction {
                transaction: tx.clone(),
                deposits: Vec::new(),
                withdrawals: Vec::new(),
            })
            .await
            .expect("memory store never fails");

        let present = store
            .find_output(&OutPoint::new(tx.txid, 0))
            .await
            .expect("memory store never fails");
        assert!(present.is_some());

        let bad_index = store
            .find_output(&OutPoint::new(tx.txid, 99))
            .await
            .expect("memory store never fails");
        assert!(bad_index.is_none());

        let bad_txid = store
            .find_output(&OutPoint::new(txid_from_byte(9), 0))
            .await
            .expect("memory store never fails");
        assert!(bad_txid.is_none());
    }

    #[tokio::test]
    async fn first_incomplete_block_is_lowest_by_height() {
        let store = MemoryStore::new();
        let mut done = make_block(3, vec![]);
        done.transactions_imported = true;
        store.save_block(done).await.expect("memory store never fails");
        store
            .save_block(make_block(7, vec![]))
            .await
            .expect("memory store never fails");
        store
            .save_block(make_block(5, vec![]))
            .await
            .expect("memory store never fails");

        let first = store
            .find_first_incomplete_block()
            .await
            .expect("memory store never fails")
            .expect("two incomplete blocks stored");
        assert_eq!(first.height, BlockHeight(5));
        assert_eq!(
            store
                .best_block_height()
                .await
                .expect("memory store never fails"),
            Some(BlockHeight(7))
        );
    }

    #[tokio::test]
    async fn address_records_are_canonical() {
        let store = MemoryStore::new();
        let first = store
            .find_or_create_address("addr")
            .await
            .expect("memory store never fails");
        assert!(first.deposits.is_empty());

        store
            .save_transaction(LinkedTransaction {
                transaction: make_transaction(txid_from_byte(1)),
                deposits: vec![("addr".to_owned(), OutPoint::new(txid_from_byte(1), 0))],
                withdrawals: Vec::new(),
            })
            .await
            .expect("memory store never fails");

        let again = store
            .find_or_create_address("addr")
            .await
            .expect("memory store never fails");
        assert_eq!(again.deposits.len(), 1);

        let stats = store.stats().await.expect("memory store never fails");
        assert_eq!(stats.address_count, 1);
    }
}
