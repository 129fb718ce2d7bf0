//! # Stateless CLI
//!
//! Command-line interface for producing and checking proof bundles.
//!
//! Usage:
//!   stateless group <block.json>
//!   stateless attach --genesis <genesis.json> --block <block.json> [--out <file>]
//!   stateless verify --bundle <bundle.json> --root <hash> --coinbase <addr>
//!   stateless verify-block --bundles <bundles.json> --coinbase <addr>
//!
//! Examples:
//!   stateless attach --genesis genesis.json --block block.json --out bundles.json
//!   stateless -v verify-block --bundles bundles.json --coinbase 0x...cb

mod input;

use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stateless_client::{
    attach_bundles, group_transactions, verify_block_bundles, verify_bundle,
    verify_confirmed_bundle, BlockBundles, TransactionBundle,
};
use stateless_error::{Error, Result};
use stateless_state::{ChainConfig, Env};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::input::{load_config, read_json, BlockFile, Genesis};

#[derive(Parser)]
#[command(name = "stateless")]
#[command(author, version, about = "Stateless client - merkle proof bundles for transactions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Chain constants JSON (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a block's transactions into conflict-free groups
    Group {
        /// Path to the block JSON file
        block: PathBuf,
    },
    /// Execute a block on a genesis state and attach a bundle to every transaction
    Attach {
        #[arg(long)]
        genesis: PathBuf,

        #[arg(long)]
        block: PathBuf,

        /// Write the bundles here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Verify one transaction bundle against a trusted state root
    Verify {
        #[arg(long)]
        bundle: PathBuf,

        #[arg(long)]
        root: B256,

        #[arg(long)]
        coinbase: Address,
    },
    /// Verify every bundle attached to a block
    VerifyBlock {
        #[arg(long)]
        bundles: PathBuf,

        #[arg(long)]
        coinbase: Address,

        /// Trusted parent root (defaults to the one in the file)
        #[arg(long)]
        root: Option<B256>,
    },
}

#[derive(Serialize)]
struct GroupSummary {
    transactions: Vec<B256>,
    accounts: Vec<Address>,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        Error::serialization_failed(e.to_string())
            .with_operation("cli::to_json")
            .set_source(e)
    })
}

fn run_group(block: &Path) -> Result<String> {
    let block: BlockFile = read_json(block)?;
    let groups = group_transactions(&block.transactions);

    let summary: Vec<GroupSummary> = groups
        .iter()
        .map(|group| GroupSummary {
            transactions: group.transactions().iter().map(|tx| tx.hash()).collect(),
            accounts: group.accounts().iter().copied().collect(),
        })
        .collect();

    to_json(&summary)
}

fn run_attach(config: Option<&Path>, genesis: &Path, block: &Path) -> Result<BlockBundles> {
    let genesis: Genesis = read_json(genesis)?;
    let block: BlockFile = read_json(block)?;

    let config = match (config, genesis.config) {
        (Some(path), Some(_)) => {
            return Err(Error::invalid_argument(
                "chain config given both in the genesis file and with --config",
            )
            .with_operation("cli::attach")
            .with_context("config", path.display().to_string()))
        }
        (None, Some(config)) => config,
        (path, None) => load_config(path)?,
    };

    let (mut db, genesis_root) = genesis.build()?;
    info!(root = %genesis_root, accounts = genesis.alloc.len(), "built genesis state");

    let block_number = block.parent_number.checked_add(1).ok_or_else(|| {
        Error::invalid_argument("parent block number out of range").with_operation("cli::attach")
    })?;
    let env = Env::new(config, block.coinbase, block_number);
    attach_bundles(&mut db, &env, genesis_root, block.parent_number, &block.transactions)
}

fn run_verify(config: ChainConfig, bundle: &Path, root: B256, coinbase: Address) -> Result<bool> {
    let bundle: TransactionBundle = read_json(bundle)?;
    let block_number = u64::try_from(bundle.blk_number).unwrap_or_default() + 1;
    let env = Env::new(config, coinbase, block_number);

    if bundle.is_confirmed() {
        verify_confirmed_bundle(&env, root, coinbase, &bundle)
    } else {
        verify_bundle(&env, root, coinbase, &bundle)
    }
}

fn run_verify_block(
    config: ChainConfig,
    bundles: &Path,
    coinbase: Address,
    root: Option<B256>,
) -> Result<bool> {
    let block: BlockBundles = read_json(bundles)?;
    let Some(block_number) = block.block_number() else {
        warn!(parent = block.parent_number, "block bundles rejected: parent number out of range");
        return Ok(false);
    };
    let env = Env::new(config, coinbase, block_number);
    verify_block_bundles(&env, root.unwrap_or(block.parent_root), coinbase, &block)
}

fn run(cli: Cli) -> Result<bool> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Group { block } => {
            println!("{}", run_group(&block)?);
            Ok(true)
        }
        Commands::Attach {
            genesis,
            block,
            out,
        } => {
            let attached = run_attach(config, &genesis, &block)?;
            let json = attached.to_json()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).map_err(|e| {
                        Error::from(e).with_context("path", path.display().to_string())
                    })?;
                    info!(path = %path.display(), bundles = attached.bundles.len(), "wrote bundles");
                }
                None => println!("{}", json),
            }
            Ok(true)
        }
        Commands::Verify {
            bundle,
            root,
            coinbase,
        } => {
            let valid = run_verify(load_config(config)?, &bundle, root, coinbase)?;
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(valid)
        }
        Commands::VerifyBlock {
            bundles,
            coinbase,
            root,
        } => {
            let valid = run_verify_block(load_config(config)?, &bundles, coinbase, root)?;
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(valid)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
