use std::path::PathBuf;

use clap::Parser;

/// utxograph — Bitcoin transaction graph importer with a JSON status and
/// query API.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Bitcoin Core RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "UTXOGRAPH_RPC_URL")]
    pub rpc_url: String,

    /// RPC username.
    #[arg(long, env = "UTXOGRAPH_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password.
    #[arg(long, env = "UTXOGRAPH_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Path to bitcoind's .cookie file, used when no user/pass is given.
    #[arg(long, env = "UTXOGRAPH_RPC_COOKIE")]
    pub rpc_cookie: Option<PathBuf>,

    /// Cap outbound RPC requests per second.
    #[arg(long)]
    pub rpc_rate_limit: Option<u32>,

    /// Address to bind the API server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090")]
    pub port: u16,

    /// Seconds between scan cycles while blocks are pending.
    #[arg(long, default_value = "1")]
    pub scan_interval: u64,

    /// Seconds between scan cycles when there is nothing to do.
    #[arg(long, default_value = "10")]
    pub idle_interval: u64,

    /// Maximum unresolved-ancestor chain followed by on-demand resolution.
    #[arg(long, default_value = "100")]
    pub max_ancestor_depth: usize,

    /// Capacity of the raw transaction fetch cache.
    #[arg(long, default_value = "10000")]
    pub fetch_cache_cap: usize,

    /// Recent log/error lines retained for the status API.
    #[arg(long, default_value = "100")]
    pub status_capacity: usize,
}
