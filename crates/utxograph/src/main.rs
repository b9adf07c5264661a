mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};

use utxograph_core::async_resolver::{AsyncResolver, ResolveLimits};
use utxograph_core::blocks::{BlockImporter, ImporterConfig};
use utxograph_core::resolver::TransactionResolver;
use utxograph_core::rpc::{BitcoinRpc, HttpRpcClient};
use utxograph_core::scanner::{BlockScanner, ScannerConfig};
use utxograph_core::status::StatusReporter;
use utxograph_core::store::{GraphStore, MemoryStore};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Connect to Bitcoin Core RPC and verify the connection succeeds before
    // starting any import loop.
    let rpc: Arc<dyn BitcoinRpc> = Arc::new(
        HttpRpcClient::new(
            &args.rpc_url,
            args.rpc_user.as_deref(),
            args.rpc_pass.as_deref(),
            args.rpc_cookie.as_deref(),
            args.rpc_rate_limit,
        )
        .wrap_err("configure RPC client")?,
    );

    let chain_info = rpc.get_blockchain_info().await.map_err(|err| {
        let message = format_rpc_connect_error(&args.rpc_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to Bitcoin Core RPC")
    })?;

    tracing::info!(
        chain = %chain_info.chain,
        blocks = chain_info.blocks,
        "connected to Bitcoin Core"
    );
    if chain_info.pruned {
        tracing::warn!("node is pruned — resolving old transactions may fail");
    }

    // Wire the pipeline: store, resolver, async resolver, block importer,
    // block scanner.
    let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
    let status = Arc::new(StatusReporter::new(args.status_capacity));
    let resolver = Arc::new(TransactionResolver::new(
        rpc.clone(),
        store.clone(),
        status.clone(),
        args.fetch_cache_cap,
    ));
    let tasks = Arc::new(AsyncResolver::new(
        resolver.clone(),
        status.clone(),
        ResolveLimits {
            max_ancestor_depth: args.max_ancestor_depth,
        },
    ));
    let importer = BlockImporter::new(
        rpc.clone(),
        store.clone(),
        status.clone(),
        ImporterConfig::default(),
    );
    let scanner = BlockScanner::new(
        store.clone(),
        resolver,
        tasks,
        status.clone(),
        ScannerConfig {
            poll_interval: Duration::from_secs(args.scan_interval),
            idle_interval: Duration::from_secs(args.idle_interval),
        },
    );

    tokio::spawn(async move { importer.run().await });
    tokio::spawn(async move { scanner.run().await });

    let state = Arc::new(server::AppState { store, status });
    let router = server::build_router(state);

    let bind_addr = format!("{}:{}", args.bind, args.port);
    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 — it is accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .wrap_err("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("run HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}

fn format_rpc_connect_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to RPC endpoint `{rpc_url}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("tls")
        || source_error.contains("certificate")
        || source_error.contains("SSL")
    {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                .into(),
        );
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push(
            "hint: authentication failed; verify --rpc-user/--rpc-pass or --rpc-cookie".into(),
        );
    } else if source_error.contains("error sending request for url") {
        lines.push(
            "hint: request could not be sent; verify URL format, network access, and endpoint reachability"
                .into(),
        );
    }

    lines.join("\n")
}
