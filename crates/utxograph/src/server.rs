//! JSON status and query API.
//!
//! Three read-only endpoints over the graph store: import status, persisted
//! transactions, and per-address flow summaries computed by walking deposit
//! and withdrawal edges.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bitcoin::Txid;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use utxograph_core::status::{StatusReporter, StatusSnapshot};
use utxograph_core::store::{GraphStore, StoreStats};
use utxograph_core::types::{AddressRecord, Transaction};
use utxograph_core::StoreError;

pub struct AppState {
    pub store: Arc<dyn GraphStore>,
    pub status: Arc<StatusReporter>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/transactions/{txid}", get(get_transaction))
        .route("/api/addresses/{address}", get(get_address))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==============================================================================
// Error Mapping
// ==============================================================================

enum ApiError {
    BadRequest(String),
    NotFound,
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_owned()),
            Self::Store(err) => {
                tracing::error!(error = %err, "store failure serving api request");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (code, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ==============================================================================
// Handlers
// ==============================================================================

#[derive(Serialize)]
struct StatusResponse {
    stats: StoreStats,
    #[serde(flatten)]
    status: StatusSnapshot,
}

async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let stats = state.store.stats().await?;
    let status = state.status.snapshot().await;
    Ok(Json(StatusResponse { stats, status }))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(txid): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let txid: Txid = txid
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid txid `{txid}`")))?;
    state
        .store
        .find_transaction(&txid)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[derive(Serialize)]
struct AddressResponse {
    #[serde(flatten)]
    record: AddressRecord,
    /// Σ deposit output values, in satoshis.
    received_sat: u64,
    /// Σ withdrawal input values, in satoshis.
    spent_sat: u64,
    /// `received_sat - spent_sat`.
    balance_sat: u64,
}

async fn get_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<AddressResponse>, ApiError> {
    let record = state
        .store
        .find_address(&address)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut received_sat: u64 = 0;
    for outpoint in &record.deposits {
        if let Some(output) = state.store.find_output(outpoint).await? {
            received_sat = received_sat.saturating_add(output.value.to_sat());
        }
    }

    let mut spent_sat: u64 = 0;
    for input_ref in &record.withdrawals {
        if let Some(tx) = state.store.find_transaction(&input_ref.txid).await? {
            if let Some(value) = tx
                .inputs
                .get(input_ref.index as usize)
                .and_then(|input| input.value)
            {
                spent_sat = spent_sat.saturating_add(value.to_sat());
            }
        }
    }

    Ok(Json(AddressResponse {
        record,
        received_sat,
        spent_sat,
        balance_sat: received_sat.saturating_sub(spent_sat),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use bitcoin::hashes::Hash;
    use bitcoin::{Amount, OutPoint};
    use tower::ServiceExt;

    use utxograph_core::store::MemoryStore;
    use utxograph_core::types::{Input, InputRef, LinkedTransaction, Output};

    fn txid(b: u8) -> Txid {
        let mut bytes = [0u8; 32];
        bytes[0] = b;
        Txid::from_byte_array(bytes)
    }

    /// Seed a store with a coinbase paying `miner` and a spend moving 30 of
    /// its 50 coins to `alice`, then build a router over it.
    async fn seeded_router() -> (Router, Txid, Txid) {
        let store = Arc::new(MemoryStore::new());
        let miner_tx = txid(1);
        let payment_tx = txid(2);

        store
            .save_transaction(LinkedTransaction {
                transaction: Transaction {
                    txid: miner_tx,
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
                        addresses: vec!["miner".to_owned()],
                    }],
                },
                deposits: vec![("miner".to_owned(), OutPoint::new(miner_tx, 0))],
                withdrawals: Vec::new(),
            })
            .await
            .expect("memory store never fails");

        store
            .save_transaction(LinkedTransaction {
                transaction: Transaction {
                    txid: payment_tx,
                    block_hash: None,
                    inputs: vec![Input {
                        index: 0,
                        outpoint: Some(OutPoint::new(miner_tx, 0)),
                        sequence: 0xFFFFFFFE,
                        value: Some(Amount::from_sat(50_000)),
                    }],
                    outputs: vec![Output {
                        index: 0,
                        value: Amount::from_sat(30_000),
                        addresses: vec!["alice".to_owned()],
                    }],
                },
                deposits: vec![("alice".to_owned(), OutPoint::new(payment_tx, 0))],
                withdrawals: vec![("miner".to_owned(), InputRef::new(payment_tx, 0))],
            })
            .await
            .expect("memory store never fails");

        let state = Arc::new(AppState {
            store,
            status: Arc::new(StatusReporter::default()),
        });
        (build_router(state), miner_tx, payment_tx)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("static request"),
            )
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is in memory");
        let json = serde_json::from_slice(&bytes).expect("handlers emit JSON");
        (status, json)
    }

    #[tokio::test]
    async fn status_reports_store_stats() {
        let (router, _, _) = seeded_router().await;
        let (code, json) = get_json(router, "/api/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(json["stats"]["transaction_count"], 2);
        assert_eq!(json["stats"]["address_count"], 2);
    }

    #[tokio::test]
    async fn transaction_lookup_round_trips() {
        let (router, miner_tx, _) = seeded_router().await;
        let (code, json) = get_json(router.clone(), &format!("/api/transactions/{miner_tx}")).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(json["txid"], miner_tx.to_string());

        let absent = txid(99);
        let (code, _) = get_json(router.clone(), &format!("/api/transactions/{absent}")).await;
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = get_json(router, "/api/transactions/not-a-txid").await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn address_balance_walks_the_edge_sets() {
        let (router, _, _) = seeded_router().await;

        // miner: received the 50k coinbase output, spent all of it.
        let (code, json) = get_json(router.clone(), "/api/addresses/miner").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(json["received_sat"], 50_000);
        assert_eq!(json["spent_sat"], 50_000);
        assert_eq!(json["balance_sat"], 0);

        // alice: received 30k, spent nothing.
        let (code, json) = get_json(router.clone(), "/api/addresses/alice").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(json["received_sat"], 30_000);
        assert_eq!(json["balance_sat"], 30_000);

        let (code, _) = get_json(router, "/api/addresses/nobody").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
