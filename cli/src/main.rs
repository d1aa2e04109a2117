use std::fmt::Display;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use snb_ledger::{BatchBlock, BatchingLedger};
use snb_network::{NetworkConfig, NetworkType};
use snb_rewards::{calculate_rewards, Address, BatchPayment, ServiceNodeInfo, ServiceNodeSnapshot};

/// Service-node reward batching ledger CLI
#[derive(Parser)]
#[command(name = "snb", version, about = "Service-node reward batching ledger")]
struct Cli {
    /// Path to the batching database
    #[arg(long, global = true, default_value = "batching.redb")]
    db: PathBuf,

    /// Network preset (mainnet, testnet, devnet, fakechain)
    #[arg(long, global = true, default_value = "mainnet")]
    network: NetworkType,

    /// Network config file (JSON, or TOML by extension); replaces the preset
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if missing and print the tracked height
    Init,

    /// Print height, accrual count, total owed and state root
    Status,

    /// Print the accrued balance of an address
    Balance {
        #[arg(long)]
        address: String,
    },

    /// Print the payouts due in the coinbase at a height
    Due {
        #[arg(long)]
        height: u64,
    },

    /// Print the payouts confirmed at a height
    Paid {
        #[arg(long)]
        height: u64,
    },

    /// Split a reward over a service node read from a JSON file
    Split {
        /// Hard fork version selecting the reward rule
        #[arg(long)]
        hf: u8,

        /// Amount to distribute, in atomic units
        #[arg(long)]
        amount: u64,

        /// Path to a ServiceNodeInfo JSON file
        #[arg(long)]
        node: PathBuf,
    },

    /// Overwrite the tracked height (resync)
    SetHeight {
        #[arg(long)]
        height: u64,
    },

    /// Apply a block read from JSON against a service-node snapshot
    AddBlock {
        /// Path to a BatchBlock JSON file
        #[arg(long)]
        block: PathBuf,

        /// Path to a ServiceNodeSnapshot JSON file
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Roll back the tip block read from JSON
    PopBlock {
        #[arg(long)]
        block: PathBuf,
    },

    /// Check coinbase payouts read from JSON against what is due
    Validate {
        #[arg(long)]
        height: u64,

        /// Path to a JSON list of {address, amount} payouts
        #[arg(long)]
        coinbase: PathBuf,

        /// Settle the payouts when they match
        #[arg(long)]
        save: bool,
    },

    /// Print version information
    Version,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init => cmd_init(&cli),
        Commands::Status => cmd_status(&cli),
        Commands::Balance { address } => cmd_balance(&cli, address),
        Commands::Due { height } => cmd_due(&cli, *height),
        Commands::Paid { height } => cmd_paid(&cli, *height),
        Commands::Split { hf, amount, node } => cmd_split(*hf, *amount, node),
        Commands::SetHeight { height } => cmd_set_height(&cli, *height),
        Commands::AddBlock { block, snapshot } => cmd_add_block(&cli, block, snapshot),
        Commands::PopBlock { block } => cmd_pop_block(&cli, block),
        Commands::Validate {
            height,
            coinbase,
            save,
        } => cmd_validate(&cli, *height, coinbase, *save),
        Commands::Version => cmd_version(),
    }
}

fn or_exit<T, E: Display>(result: Result<T, E>, context: &str) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("{context}: {e}");
        std::process::exit(1);
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> T {
    let text = or_exit(
        std::fs::read_to_string(path),
        &format!("Error reading {}", path.display()),
    );
    or_exit(
        serde_json::from_str(&text),
        &format!("Invalid JSON in {}", path.display()),
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", or_exit(serde_json::to_string_pretty(value), "Error encoding output"));
}

fn network_config(cli: &Cli) -> NetworkConfig {
    match &cli.config {
        Some(path) => or_exit(NetworkConfig::from_file(path), "Error reading network config"),
        None => NetworkConfig::preset(cli.network),
    }
}

fn open_ledger(cli: &Cli) -> BatchingLedger {
    or_exit(
        BatchingLedger::open(&cli.db, network_config(cli)),
        "Error opening batching database",
    )
}

fn cmd_init(cli: &Cli) {
    let ledger = open_ledger(cli);
    let height = or_exit(ledger.current_height(), "Error reading height");
    println!("Batching database ready: {}", cli.db.display());
    println!("  Network: {}", ledger.config().network);
    println!("  Height: {height}");
}

fn cmd_status(cli: &Cli) {
    let ledger = open_ledger(cli);
    let inspector = ledger.inspect();
    let snapshot = or_exit(inspector.snapshot(), "Error reading ledger");
    let owed = or_exit(inspector.total_owed(), "Error reading ledger");
    let root = or_exit(snapshot.state_root_hex(), "Error hashing ledger");
    let config = ledger.config();

    println!("Batching ledger status");
    println!("  Network: {}", config.network);
    println!("  Height: {}", snapshot.height);
    println!("  Batching interval: {}", config.batching_interval);
    println!("  Minimum payout: {}", config.min_batch_payment);
    println!("  Accruing addresses: {}", snapshot.accrued.len());
    println!("  Total owed: {owed}");
    println!("  State root: {root}");
}

fn cmd_balance(cli: &Cli, address: &str) {
    let ledger = open_ledger(cli);
    let balance = or_exit(
        ledger.inspect().balance_of(&Address::from(address)),
        "Error reading balance",
    );
    println!("{address}: {}", balance.unwrap_or(0));
}

fn cmd_due(cli: &Cli, height: u64) {
    let ledger = open_ledger(cli);
    let due = or_exit(ledger.get_sn_payments(height), "Error computing payouts");
    print_json(&due);
}

fn cmd_paid(cli: &Cli, height: u64) {
    let ledger = open_ledger(cli);
    let paid = or_exit(ledger.get_paid_payments(height), "Error reading paid payouts");
    print_json(&paid);
}

fn cmd_split(hf: u8, amount: u64, node_path: &Path) {
    let node: ServiceNodeInfo = read_json(node_path);
    let split = or_exit(calculate_rewards(hf, amount, &node), "Error splitting reward");
    print_json(&split);
}

fn cmd_set_height(cli: &Cli, height: u64) {
    let mut ledger = open_ledger(cli);
    or_exit(ledger.update_height(height), "Error updating height");
    println!("Height set to {height}");
}

fn cmd_add_block(cli: &Cli, block_path: &Path, snapshot_path: &Path) {
    let block: BatchBlock = read_json(block_path);
    let snapshot: ServiceNodeSnapshot = read_json(snapshot_path);
    let mut ledger = open_ledger(cli);
    or_exit(ledger.add_block(&block, &snapshot), "Error adding block");
    let due = or_exit(ledger.get_sn_payments(block.height), "Error computing payouts");
    println!("Added block {}", block.height);
    println!("  Payouts due: {}", due.len());
}

fn cmd_pop_block(cli: &Cli, block_path: &Path) {
    let block: BatchBlock = read_json(block_path);
    let mut ledger = open_ledger(cli);
    or_exit(ledger.pop_block(&block), "Error popping block");
    println!("Popped block {}", block.height);
}

fn cmd_validate(cli: &Cli, height: u64, coinbase_path: &Path, save: bool) {
    let coinbase: Vec<BatchPayment> = read_json(coinbase_path);
    let mut ledger = open_ledger(cli);
    let expected = or_exit(ledger.get_sn_payments(height), "Error computing payouts");
    let valid = or_exit(
        ledger.validate_batch_payment(&coinbase, &expected, height, save),
        "Error validating payouts",
    );
    if !valid {
        eprintln!("Coinbase payouts at height {height} do not match");
        std::process::exit(1);
    }
    println!("Coinbase payouts at height {height} are valid");
}

fn cmd_version() {
    println!(
        "snb {} (service-node batching ledger CLI)",
        env!("CARGO_PKG_VERSION")
    );
}
