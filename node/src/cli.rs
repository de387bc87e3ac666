//! # CLI Interface
//!
//! Defines the command-line argument structure for `hena-node` using
//! `clap` derive. Supports three subcommands: `run`, `init` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hena_token::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};

use crate::logging::LogFormat;

/// Hena token ledger node.
///
/// Hosts a single token ledger, serves the JSON-RPC and REST API, streams
/// ledger events over WebSocket and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "hena-node",
    about = "Hena token ledger node",
    version,
    propagate_version = true
)]
pub struct HenaNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Hena node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ledger node.
    Run(RunArgs),
    /// Initialize a data directory with a template genesis file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the genesis file (JSON token configuration).
    ///
    /// Only read when the data directory holds no snapshot yet. Defaults to
    /// `genesis.json` in the data directory.
    #[arg(long, short = 'g', env = "HENA_GENESIS")]
    pub genesis: Option<PathBuf>,

    /// Path to the node data directory where snapshots are stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "HENA_DATA_DIR", default_value = ".hena")]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "HENA_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HENA_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "HENA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl RunArgs {
    /// Genesis path, falling back to `genesis.json` in the data directory.
    pub fn genesis_path(&self) -> PathBuf {
        self.genesis
            .clone()
            .unwrap_or_else(|| self.data_dir.join("genesis.json"))
    }
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "HENA_DATA_DIR", default_value = ".hena")]
    pub data_dir: PathBuf,

    /// Owner address written into the template.
    #[arg(long)]
    pub owner: String,

    /// Manager address written into the template. Defaults to the owner.
    #[arg(long)]
    pub manager: Option<String>,

    /// Token name.
    #[arg(long, default_value = "Hena")]
    pub name: String,

    /// Token symbol.
    #[arg(long, default_value = "HENA")]
    pub symbol: String,

    /// Overwrite an existing genesis file.
    #[arg(long)]
    pub force: bool,
}
