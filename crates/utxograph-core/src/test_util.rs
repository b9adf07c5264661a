//! Shared helpers for unit tests: deterministic ids and builders for raw
//! RPC payloads and domain records.

use bitcoin::hashes::Hash;
use bitcoin::{Amount, BlockHash, Txid};

use crate::rpc::{RawBlock, RawInput, RawOutput, RawScriptPubKey, RawTransaction};
use crate::types::{Block, BlockHeight, Input, Output, Transaction};

// ==============================================================================
// Deterministic Ids
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

/// Create a deterministic `BlockHash` from a single distinguishing byte.
pub fn block_hash_from_byte(b: u8) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    BlockHash::from_byte_array(bytes)
}

// ==============================================================================
// Raw Payload Builders
// ==============================================================================

/// A coinbase input (no outpoint).
pub fn coinbase_vin() -> RawInput {
    RawInput {
        coinbase: Some("04ffff001d0104".to_owned()),
        txid: None,
        vout: None,
        sequence: 0xFFFFFFFF,
    }
}

/// A spending input referencing `funding_txid:vout`.
pub fn spending_vin(funding_txid: Txid, vout: u32) -> RawInput {
    RawInput {
        coinbase: None,
        txid: Some(funding_txid),
        vout: Some(vout),
        sequence: 0xFFFFFFFE,
    }
}

/// An output of `btc` paying a single address.
pub fn paying_vout(n: u32, btc: f64, address: &str) -> RawOutput {
    RawOutput {
        value: btc,
        n,
        script_pub_key: RawScriptPubKey {
            address: Some(address.to_owned()),
            addresses: Vec::new(),
        },
    }
}

pub fn make_raw_tx(txid: Txid, vin: Vec<RawInput>, vout: Vec<RawOutput>) -> RawTransaction {
    RawTransaction {
        txid,
        block_hash: None,
        vin,
        vout,
    }
}

pub fn make_raw_block(height: u32, txids: Vec<Txid>) -> RawBlock {
    RawBlock {
        hash: block_hash_from_byte(height as u8),
        height,
        tx: txids,
    }
}

// ==============================================================================
// Domain Builders
// ==============================================================================

/// A minimal persisted coinbase transaction with one 50 000 sat output
/// paying `"addr-1"`.
pub fn make_transaction(txid: Txid) -> Transaction {
    Transaction {
        txid,
        block_hash: None,
        inputs: vec![Input {
            index: 0,
            outpoint: None,
            sequence: 0xFFFFFFFF,
            value: None,
        }],
        outputs: vec![Output {
            index: 0,
            value: Amount::from_sat(50_000),
            addresses: vec!["addr-1".to_owned()],
        }],
    }
}

/// A block record awaiting transaction import.
pub fn make_block(height: u32, tx_hashes: Vec<Txid>) -> Block {
    Block {
        height: BlockHeight(height),
        hash: block_hash_from_byte(height as u8),
        tx_hashes,
        transactions_imported: false,
    }
}
