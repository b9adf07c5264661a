//! Pure mapping from raw RPC payloads to domain transaction drafts.
//!
//! `to_domain` is deterministic and performs no I/O: two resolvers mapping
//! the same raw payload produce identical drafts, which is what lets a
//! losing resolution attempt discard its staged edges without reconciling
//! them against the winner's.

use bitcoin::{Amount, OutPoint};

use crate::error::ImportError;
use crate::rpc::RawTransaction;
use crate::types::{Input, Output, Transaction};

/// Map a raw transaction into a domain draft.
///
/// Input references stay unbound (`value: None`); the resolver binds them
/// against the store. Malformed payloads are rejected here, before anything
/// touches the store:
/// - an input carrying a referenced txid without a vout, or vice versa
/// - an input that is neither coinbase nor a spend
/// - output indices that are not contiguous from zero
/// - an output value that is not a valid amount
pub fn to_domain(raw: &RawTransaction) -> Result<Transaction, ImportError> {
    let mut inputs = Vec::with_capacity(raw.vin.len());
    for (index, vin) in raw.vin.iter().enumerate() {
        let outpoint = match (vin.txid, vin.vout) {
            (Some(txid), Some(vout)) => Some(OutPoint::new(txid, vout)),
            (None, None) => None,
            _ => {
                return Err(ImportError::Mapping(format!(
                    "input {index} of {} has a half-specified outpoint",
                    raw.txid
                )))
            }
        };
        if outpoint.is_none() && vin.coinbase.is_none() {
            return Err(ImportError::Mapping(format!(
                "input {index} of {} is neither coinbase nor a spend",
                raw.txid
            )));
        }
        inputs.push(Input {
            index: index as u32,
            outpoint,
            sequence: vin.sequence,
            value: None,
        });
    }

    let mut outputs = Vec::with_capacity(raw.vout.len());
    for (index, vout) in raw.vout.iter().enumerate() {
        if vout.n as usize != index {
            return Err(ImportError::Mapping(format!(
                "output indices of {} are not contiguous (found {} at position {index})",
                raw.txid, vout.n
            )));
        }
        let value = Amount::from_btc(vout.value).map_err(|e| {
            ImportError::Mapping(format!(
                "output {index} of {} has invalid value {}: {e}",
                raw.txid, vout.value
            ))
        })?;
        outputs.push(Output {
            index: vout.n,
            value,
            addresses: vout.script_pub_key.addresses(),
        });
    }

    Ok(Transaction {
        txid: raw.txid,
        block_hash: raw.block_hash,
        inputs,
        outputs,
    })
}
