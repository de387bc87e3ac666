// Copyright (c) 2026 Hena Token Developers. MIT License.
// See LICENSE for details.

//! # Hena Ledger Node
//!
//! Entry point for the `hena-node` binary. Parses CLI arguments, initializes
//! logging and metrics, restores or constructs the ledger, and serves the
//! HTTP/WS API until a shutdown signal arrives.
//!
//! The binary supports three subcommands:
//!
//! - `run`:     start the ledger node
//! - `init`:    write a template genesis file into a data directory
//! - `version`: print build version information

mod api;
mod cli;
mod events;
mod logging;
mod metrics;
mod rpc;
mod snapshot;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use hena_token::clock::SystemClock;
use hena_token::config::{TokenConfig, LEDGER_VERSION};
use hena_token::service::TokenService;
use hena_token::types::Address;

use cli::{Commands, HenaNodeCli};
use events::{BroadcastSink, EVENT_CHANNEL_CAPACITY};
use logging::LogFormat;
use metrics::TokenMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HenaNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: restores or builds the ledger, then serves the API and
/// metrics endpoints until shutdown, when the snapshot is written back.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVES, args.log_format);

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting hena-node"
    );

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;

    // --- Metrics ---
    let token_metrics = Arc::new(TokenMetrics::new().context("failed to register metrics")?);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let sink = Box::new(BroadcastSink::new(event_tx.clone(), Arc::clone(&token_metrics)));

    // --- Ledger ---
    let snapshot_path = snapshot::snapshot_path(&args.data_dir);
    let service = match snapshot::load(&snapshot_path)? {
        Some(state) => {
            tracing::info!(path = %snapshot_path.display(), "ledger restored from snapshot");
            TokenService::restore(state, sink)
        }
        None => {
            let genesis_path = args.genesis_path();
            let config = snapshot::load_genesis(&genesis_path)?;
            tracing::info!(path = %genesis_path.display(), "constructing ledger from genesis");
            TokenService::new(config, sink).context("failed to construct ledger")?
        }
    };
    token_metrics.set_total_supply(service.total_supply(), service.decimals());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!("{} (ledger {})", env!("CARGO_PKG_VERSION"), LEDGER_VERSION),
        service: Arc::new(RwLock::new(service)),
        clock: Arc::new(SystemClock),
        event_tx,
        metrics: Arc::clone(&token_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&token_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        res = shutdown_signal() => {
            res?;
            tracing::info!("shutdown signal received, writing snapshot");
        }
    }

    let service = app_state.service.read().await;
    snapshot::save(&snapshot_path, service.state())?;
    tracing::info!("hena-node stopped");
    Ok(())
}

/// Writes a template genesis file into the data directory.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("hena_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let genesis_path = data_dir.join("genesis.json");
    if genesis_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            genesis_path.display()
        );
    }

    let owner = Address::new(args.owner.as_str()).context("invalid --owner address")?;
    let manager = match args.manager.as_deref() {
        Some(raw) => Address::new(raw).context("invalid --manager address")?,
        None => owner.clone(),
    };
    let config = TokenConfig::new(args.name, args.symbol, owner, manager);
    config.validate().context("invalid token parameters")?;
    snapshot::write_genesis(&genesis_path, &config)?;

    tracing::info!(path = %genesis_path.display(), "genesis template written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Genesis file   : {}", genesis_path.display());
    println!("  Token          : {} ({})", config.name, config.symbol);
    println!("  Owner          : {}", config.owner);

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("hena-node {}", env!("CARGO_PKG_VERSION"));
    println!("ledger    {}", LEDGER_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
