//! Domain types for the transaction graph.
//!
//! Everything the store persists lives here: blocks, transactions with their
//! inputs and outputs, and address records with their deposit/withdrawal
//! edge sets. Entities reference each other by identifier (`Txid`,
//! `OutPoint`, [`InputRef`]) rather than by owned object graphs, so a record
//! can be cloned out of the store without dragging its neighbors along.

use std::collections::BTreeSet;

use bitcoin::{Amount, BlockHash, OutPoint, Txid};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Block Height
// ==============================================================================

/// A Bitcoin block height, wrapped for type safety.
///
/// `#[serde(transparent)]` preserves the JSON representation as a bare
/// integer, so this newtype is wire-compatible with plain `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl BlockHeight {
    /// Height of the block after this one.
    pub fn next(self) -> BlockHeight {
        BlockHeight(self.0 + 1)
    }
}

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Block
// ==============================================================================

/// A block record: its position in the chain and the ordered list of
/// transaction hashes it confirms.
///
/// Blocks are created by the block importer with `transactions_imported =
/// false`; the scanner flips the flag once every listed transaction has a
/// persisted record. Blocks are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: BlockHeight,
    pub hash: BlockHash,
    /// Transaction hashes in block order.
    pub tx_hashes: Vec<Txid>,
    /// `true` once every non-genesis transaction on this block is persisted.
    pub transactions_imported: bool,
}

// ==============================================================================
// Transaction, Input, Output
// ==============================================================================

/// A persisted transaction. Created exactly once on first successful
/// resolution and immutable thereafter; the graph is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: Txid,
    /// Hash of the confirming block, when known at resolution time.
    pub block_hash: Option<BlockHash>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// A coinbase transaction has exactly one input with no outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].outpoint.is_none()
    }

    /// The output at `vout`, if present. Output indices are contiguous, so
    /// positional lookup is equivalent to searching by `index`.
    pub fn output(&self, vout: u32) -> Option<&Output> {
        self.outputs.get(vout as usize)
    }
}

/// A transaction input.
///
/// `outpoint` is `None` for coinbase inputs. For spending inputs, `value` is
/// bound to the referenced output's value during resolution and is always
/// `Some` by the time the transaction is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    /// Position within the owning transaction's input list.
    pub index: u32,
    /// The output being spent. `None` for coinbase inputs.
    pub outpoint: Option<OutPoint>,
    pub sequence: u32,
    /// Value of the spent output, bound when the reference is resolved.
    pub value: Option<Amount>,
}

/// A transaction output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    /// Position within the owning transaction's output list.
    pub index: u32,
    pub value: Amount,
    /// Addresses paid by this output. Empty for outputs whose script has no
    /// address form (OP_RETURN, bare multisig, ...).
    pub addresses: Vec<String>,
}

// ==============================================================================
// Address Records and Edges
// ==============================================================================

/// Identifies an input by owning transaction and position, the withdrawal
/// counterpart of `OutPoint`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InputRef {
    pub txid: Txid,
    pub index: u32,
}

impl InputRef {
    pub fn new(txid: Txid, index: u32) -> Self {
        Self { txid, index }
    }
}

impl std::fmt::Display for InputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.txid, self.index)
    }
}

/// An address and its accumulated flow edges.
///
/// Deposits are outputs paying the address; withdrawals are inputs spending
/// from it. Both sets are append-only: an edge, once added, is never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecord {
    pub address: String,
    pub deposits: BTreeSet<OutPoint>,
    pub withdrawals: BTreeSet<InputRef>,
}

impl AddressRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            deposits: BTreeSet::new(),
            withdrawals: BTreeSet::new(),
        }
    }
}

// ==============================================================================
// Linked Transaction
// ==============================================================================

/// A fully-linked transaction staged for persistence: the record itself plus
/// the address edges its resolution produced.
///
/// The edges are *staged*, not yet applied — [`crate::store::GraphStore`]
/// applies them together with the transaction record in one atomic save, so
/// a resolution attempt that loses the uniqueness race leaves no edge behind.
#[derive(Debug, Clone)]
pub struct LinkedTransaction {
    pub transaction: Transaction,
    /// `(address, output)` pairs: the output pays the address.
    pub deposits: Vec<(String, OutPoint)>,
    /// `(address, input)` pairs: the input spends from the address.
    pub withdrawals: Vec<(String, InputRef)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::txid_from_byte;

    #[test]
    fn coinbase_detection() {
        let coinbase = Transaction {
            txid: txid_from_byte(1),
            block_hash: None,
            inputs: vec![Input {
                index: 0,
                outpoint: None,
                sequence: 0xFFFFFFFF,
                value: None,
            }],
            outputs: Vec::new(),
        };
        assert!(coinbase.is_coinbase());

        let spending = Transaction {
            txid: txid_from_byte(2),
            block_hash: None,
            inputs: vec![Input {
                index: 0,
                outpoint: Some(OutPoint::new(txid_from_byte(1), 0)),
                sequence: 0xFFFFFFFE,
                value: None,
            }],
            outputs: Vec::new(),
        };
        assert!(!spending.is_coinbase());
    }

    #[test]
    fn output_lookup_by_index() {
        let tx = Transaction {
            txid: txid_from_byte(3),
            block_hash: None,
            inputs: Vec::new(),
            outputs: vec![
                Output {
                    index: 0,
                    value: Amount::from_sat(1_000),
                    addresses: vec!["addr0".into()],
                },
                Output {
                    index: 1,
                    value: Amount::from_sat(2_000),
                    addresses: vec!["addr1".into()],
                },
            ],
        };
        assert_eq!(tx.output(1).map(|o| o.value), Some(Amount::from_sat(2_000)));
        assert!(tx.output(2).is_none());
    }
}
