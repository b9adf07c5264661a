//! Native JSON-RPC client for Bitcoin Core compatible endpoints.
//!
//! Implements [`BitcoinRpc`] over JSON-RPC using `reqwest`, with basic auth
//! or bitcoind cookie-file auth and optional request rate limiting.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::RpcError;
use crate::types::BlockHeight;

use super::types::{ChainInfo, RawBlock, RawTransaction};
use super::BitcoinRpc;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// ==============================================================================
// JSON-RPC Protocol
// ==============================================================================

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

// ==============================================================================
// Client
// ==============================================================================

/// Bitcoin Core JSON-RPC client over HTTP(S).
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a new client for an `http://` or `https://` URL.
    ///
    /// Authentication precedence:
    /// 1. explicit `user` + `pass`
    /// 2. cookie file (`username:password`) from `cookie_file`
    /// 3. no auth
    ///
    /// If `requests_per_second` is set, calls are rate-limited per outbound
    /// HTTP request.
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        cookie_file: Option<&Path>,
        requests_per_second: Option<u32>,
    ) -> Result<Self, RpcError> {
        let url = parse_connection(connection)?;
        let auth = resolve_auth(user, pass, cookie_file)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .expect("reqwest client builder uses valid static config");

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    RpcError::InvalidConfig("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            url,
            auth,
            limiter,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await?;
        let status = response.status();

        let body = response.text().await?;
        debug!(rpc.id = id, rpc.method = method, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;

        if let Some(err) = decoded.error {
            return Err(RpcError::Server {
                code: err.code,
                message: err.message,
            });
        }

        Ok(decoded.result.unwrap_or(serde_json::Value::Null))
    }

    fn decode<T: serde::de::DeserializeOwned>(
        method: &str,
        raw: serde_json::Value,
    ) -> Result<T, RpcError> {
        serde_json::from_value(raw)
            .map_err(|e| RpcError::InvalidResponse(format!("invalid {method} result: {e}")))
    }
}

#[async_trait]
impl BitcoinRpc for HttpRpcClient {
    async fn get_raw_transaction(&self, txid: &Txid) -> Result<RawTransaction, RpcError> {
        let raw = self
            .rpc_call(
                "getrawtransaction",
                vec![serde_json::json!(txid.to_string()), serde_json::json!(1)],
            )
            .await?;
        Self::decode("getrawtransaction", raw)
    }

    async fn get_block_count(&self) -> Result<u64, RpcError> {
        let raw = self.rpc_call("getblockcount", Vec::new()).await?;
        Self::decode("getblockcount", raw)
    }

    async fn get_block_hash(&self, height: BlockHeight) -> Result<BlockHash, RpcError> {
        let raw = self
            .rpc_call("getblockhash", vec![serde_json::json!(height.0)])
            .await?;
        Self::decode("getblockhash", raw)
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<RawBlock, RpcError> {
        let raw = self
            .rpc_call(
                "getblock",
                vec![serde_json::json!(hash.to_string()), serde_json::json!(1)],
            )
            .await?;
        Self::decode("getblock", raw)
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcError> {
        let raw = self.rpc_call("getblockchaininfo", Vec::new()).await?;
        Self::decode("getblockchaininfo", raw)
    }
}

// ==============================================================================
// Connection and Auth
// ==============================================================================

fn parse_connection(connection: &str) -> Result<String, RpcError> {
    if connection.starts_with("http://") || connection.starts_with("https://") {
        Ok(connection.to_owned())
    } else {
        Err(RpcError::InvalidConfig(format!(
            "rpc url must start with http:// or https://, got `{connection}`"
        )))
    }
}

fn resolve_auth(
    user: Option<&str>,
    pass: Option<&str>,
    cookie_file: Option<&Path>,
) -> Result<Option<(String, String)>, RpcError> {
    if let (Some(user), Some(pass)) = (user, pass) {
        return Ok(Some((user.to_owned(), pass.to_owned())));
    }

    if let Some(path) = cookie_file {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RpcError::InvalidConfig(format!("read cookie file {}: {e}", path.display()))
        })?;
        let (user, pass) = contents.trim().split_once(':').ok_or_else(|| {
            RpcError::InvalidConfig(format!(
                "cookie file {} is not in user:password form",
                path.display()
            ))
        })?;
        return Ok(Some((user.to_owned(), pass.to_owned())));
    }

    Ok(None)
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}
