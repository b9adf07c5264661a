//! Wire types for the Bitcoin Core JSON-RPC responses the importer consumes.
//!
//! These mirror the node's JSON shapes directly (`getrawtransaction`
//! verbosity 1, `getblock` verbosity 1, `getblockchaininfo`); conversion
//! into domain types is the mapper's job.

use bitcoin::{BlockHash, Txid};
use serde::Deserialize;

// ==============================================================================
// Raw Transaction
// ==============================================================================

/// A decoded transaction as returned by `getrawtransaction` verbosity 1.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub txid: Txid,
    #[serde(default, rename = "blockhash")]
    pub block_hash: Option<BlockHash>,
    pub vin: Vec<RawInput>,
    pub vout: Vec<RawOutput>,
}

/// A transaction input. Coinbase inputs carry `coinbase` script data and no
/// `txid`/`vout`; spending inputs carry both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<Txid>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub sequence: u32,
}

/// A transaction output. `value` is in BTC, as the node reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOutput {
    pub value: f64,
    pub n: u32,
    #[serde(default, rename = "scriptPubKey")]
    pub script_pub_key: RawScriptPubKey,
}

/// The address-bearing part of an output script.
///
/// Core ≥ 22.0 reports a single `address` field; older nodes report an
/// `addresses` array. Scripts with no address form (OP_RETURN, bare
/// multisig) report neither.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScriptPubKey {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl RawScriptPubKey {
    /// The addresses paid by this script, whichever field the node used.
    pub fn addresses(&self) -> Vec<String> {
        match &self.address {
            Some(address) => vec![address.clone()],
            None => self.addresses.clone(),
        }
    }
}

// ==============================================================================
// Raw Block
// ==============================================================================

/// A block as returned by `getblock` verbosity 1: header fields plus the
/// ordered transaction hash list.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub hash: BlockHash,
    pub height: u32,
    pub tx: Vec<Txid>,
}

// ==============================================================================
// Chain Info
// ==============================================================================

/// Basic chain information from `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: BlockHash,
    pub pruned: bool,
}
