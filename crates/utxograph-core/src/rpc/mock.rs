//! A mock Bitcoin RPC backend for tests.
//!
//! Returns canned transaction and block data from maps populated via the
//! builder pattern. Compiled unconditionally so integration tests and
//! downstream crates' tests can drive the import pipeline without a node.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};

use crate::error::RpcError;
use crate::types::BlockHeight;

use super::types::{ChainInfo, RawBlock, RawTransaction};
use super::BitcoinRpc;

pub struct MockRpc {
    transactions: HashMap<Txid, RawTransaction>,
    blocks_by_height: HashMap<u32, RawBlock>,
    blocks_by_hash: HashMap<BlockHash, RawBlock>,
    chain_info: ChainInfo,
    /// Per-txid `getrawtransaction` call counts, for asserting on fetch
    /// behavior (cache hits, idempotent short-circuits).
    fetch_counts: Mutex<HashMap<Txid, u64>>,
}

impl MockRpc {
    pub fn builder() -> MockRpcBuilder {
        MockRpcBuilder {
            transactions: HashMap::new(),
            blocks: Vec::new(),
            chain_info: ChainInfo {
                chain: "regtest".into(),
                blocks: 0,
                best_block_hash: BlockHash::all_zeros(),
                pruned: false,
            },
        }
    }

    /// How many times `get_raw_transaction` was called for `txid`.
    pub fn fetch_count(&self, txid: &Txid) -> u64 {
        self.fetch_counts
            .lock()
            .expect("fetch count mutex is never poisoned")
            .get(txid)
            .copied()
            .unwrap_or(0)
    }
}

pub struct MockRpcBuilder {
    transactions: HashMap<Txid, RawTransaction>,
    blocks: Vec<RawBlock>,
    chain_info: ChainInfo,
}

impl MockRpcBuilder {
    pub fn with_tx(mut self, tx: RawTransaction) -> Self {
        self.transactions.insert(tx.txid, tx);
        self
    }

    pub fn with_block(mut self, block: RawBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_chain_info(mut self, info: ChainInfo) -> Self {
        self.chain_info = info;
        self
    }

    pub fn build(self) -> MockRpc {
        let mut chain_info = self.chain_info;
        if let Some(tip) = self.blocks.iter().map(|b| b.height).max() {
            chain_info.blocks = u64::from(tip);
        }
        MockRpc {
            transactions: self.transactions,
            blocks_by_height: self.blocks.iter().map(|b| (b.height, b.clone())).collect(),
            blocks_by_hash: self.blocks.into_iter().map(|b| (b.hash, b)).collect(),
            chain_info,
            fetch_counts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BitcoinRpc for MockRpc {
    async fn get_raw_transaction(&self, txid: &Txid) -> Result<RawTransaction, RpcError> {
        *self
            .fetch_counts
            .lock()
            .expect("fetch count mutex is never poisoned")
            .entry(*txid)
            .or_insert(0) += 1;

        self.transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::Server {
                code: -5,
                message: "No such mempool or blockchain transaction".to_owned(),
            })
    }

    async fn get_block_count(&self) -> Result<u64, RpcError> {
        Ok(self.chain_info.blocks)
    }

    async fn get_block_hash(&self, height: BlockHeight) -> Result<BlockHash, RpcError> {
        self.blocks_by_height
            .get(&height.0)
            .map(|b| b.hash)
            .ok_or_else(|| RpcError::Server {
                code: -8,
                message: "Block height out of range".to_owned(),
            })
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<RawBlock, RpcError> {
        self.blocks_by_hash
            .get(hash)
            .cloned()
            .ok_or_else(|| RpcError::Server {
                code: -5,
                message: "Block not found".to_owned(),
            })
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcError> {
        Ok(self.chain_info.clone())
    }
}
