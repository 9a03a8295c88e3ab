//! ChainTrace CLI: decode EVM transactions from a fixture bundle or a
//! configured node and inspect the semantics store.
//!
//! # Commands
//! ```text
//! chaintrace decode     --fixture <bundle.json> [--tx <hash>...] [--chain <slug>] [--json]
//! chaintrace semantics  --address <addr> [--fixture <bundle.json>] [--chain <slug>] [--raw]
//! chaintrace invalidate --address <addr> [--chain <slug>]
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd_decode;
mod cmd_semantics;
mod config;
mod services;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "chaintrace",
    about = "EVM transaction trace decoder",
    long_about = "
ChainTrace CLI: turn a transaction's call trace and logs into labelled calls,
events, transfers and balance changes.

ENVIRONMENT VARIABLES:
  CHAINTRACE_ETHERSCAN_KEY   Etherscan API key (overrides the config file)
",
    version
)]
struct Cli {
    /// Path to chaintrace.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one or more transactions
    Decode {
        /// Fixture bundle with transactions, receipts, blocks and traces
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Transaction hash; repeatable. Defaults to every bundled transaction
        #[arg(long)]
        tx: Vec<String>,
        /// Chain slug
        #[arg(long, default_value = "mainnet")]
        chain: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve and print what is known about an address
    Semantics {
        #[arg(long)]
        address: String,
        #[arg(long)]
        fixture: Option<PathBuf>,
        #[arg(long, default_value = "mainnet")]
        chain: String,
        /// Print only what is persisted, without resolving
        #[arg(long)]
        raw: bool,
    },

    /// Forget the persisted semantics of an address
    Invalidate {
        #[arg(long)]
        address: String,
        #[arg(long, default_value = "mainnet")]
        chain: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.verbose {
        config.log.level = "debug".into();
    }
    chaintrace_observability::init_tracing(&config.log).context("initialising logging")?;

    match cli.command {
        Commands::Decode { fixture, tx, chain, json } => {
            cmd_decode::run(&config, fixture.as_deref(), &tx, &chain, json).await
        }

        Commands::Semantics { address, fixture, chain, raw } => {
            cmd_semantics::show(&config, fixture.as_deref(), &chain, &address, raw).await
        }

        Commands::Invalidate { address, chain } => cmd_semantics::invalidate(&config, &chain, &address),
    }
}
