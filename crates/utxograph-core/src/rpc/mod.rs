//! Bitcoin Core RPC abstraction layer.
//!
//! Defines the [`BitcoinRpc`] trait and provides an HTTP JSON-RPC
//! implementation ([`HttpRpcClient`]) plus a canned-data backend
//! ([`mock::MockRpc`]) for tests.

mod http;
pub mod mock;
pub mod types;

pub use http::HttpRpcClient;
pub use types::{ChainInfo, RawBlock, RawInput, RawOutput, RawScriptPubKey, RawTransaction};

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};

use crate::error::RpcError;
use crate::types::BlockHeight;

/// Minimal trait covering the Bitcoin Core RPC methods the importer needs.
///
/// Implementations are expected to handle authentication, connection
/// management, timeouts, and response deserialization internally; callers
/// own no retry policy beyond trying again on a later cycle.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Fetch a decoded raw transaction by txid.
    async fn get_raw_transaction(&self, txid: &Txid) -> Result<RawTransaction, RpcError>;

    /// Height of the node's current chain tip.
    async fn get_block_count(&self) -> Result<u64, RpcError>;

    /// Hash of the block at the given height.
    async fn get_block_hash(&self, height: BlockHeight) -> Result<BlockHash, RpcError>;

    /// Fetch a block's header fields and transaction hash list.
    async fn get_block(&self, hash: &BlockHash) -> Result<RawBlock, RpcError>;

    /// Fetch basic chain info (network, block count, pruning status).
    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcError>;
}
