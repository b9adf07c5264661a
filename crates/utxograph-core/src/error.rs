use bitcoin::{OutPoint, Txid};

/// Failure of a single resolution attempt.
///
/// Every variant aborts only the attempt it occurred in: nothing partial is
/// committed, the owning block is not marked imported, and a later attempt
/// (next scan cycle or a fresh async trigger) starts from a clean slate.
/// A transaction-id uniqueness conflict is deliberately *not* represented
/// here — the store reports it as `SaveOutcome::AlreadyExists` and the
/// resolver treats it as success.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The node could not deliver the raw transaction.
    #[error("transaction fetch failed: {0}")]
    Fetch(#[from] RpcError),

    /// The raw payload did not map to a well-formed transaction.
    #[error("malformed transaction payload: {0}")]
    Mapping(String),

    /// An input references an output that is not yet in the store — the
    /// out-of-order-arrival case. The caller decides whether to retry later
    /// or to resolve `outpoint.txid` first.
    #[error("input {input_index} of {txid} references missing output {outpoint}")]
    UnresolvedReference {
        txid: Txid,
        input_index: u32,
        outpoint: OutPoint,
    },

    /// The store rejected a write for a reason other than the transaction-id
    /// uniqueness constraint.
    #[error("graph store failure: {0}")]
    Persistence(#[from] StoreError),
}

/// JSON-RPC transport and protocol failures.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("invalid rpc configuration: {0}")]
    InvalidConfig(String),
}

/// Backend failure of the graph store.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);
