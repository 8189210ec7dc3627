//! Toncoin wallet - command-line front end for the wallet core.
//!
//! This is the main entry point for the toncoin-wallet binary.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use toncoin_wallet::{
    Cursor, HttpTransport, JsonFileStore, NodeClient, PublicKeyExport, StaticFeeSchedule,
    TransferRequest, WalletAccount, WalletSettings,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::CliConfig;

/// TON wallet command-line client.
#[derive(Parser, Debug)]
#[command(name = "toncoin-wallet")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "toncoin-wallet.toml")]
    config: PathBuf,

    /// Use testnet addresses and explorer links
    #[arg(long)]
    testnet: bool,

    /// Node API base URL
    #[arg(long)]
    node_url: Option<String>,

    /// Wallet data file
    #[arg(long)]
    store: Option<PathBuf>,

    /// Hex-encoded seed
    #[arg(long)]
    seed: Option<String>,

    /// Hex-encoded public key (read-only commands)
    #[arg(long)]
    public_key: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the wallet address
    Address,
    /// Print the public key export
    PublicKey,
    /// Print the private key (requires --seed)
    PrivateKey,
    /// Synchronize and print the balance
    Balance,
    /// Estimate the fee of a transfer
    Fee(TransferArgs),
    /// Print the largest transferable amount
    Max {
        /// Destination address
        #[arg(long)]
        to: String,
        /// Comment attached to the transfer
        #[arg(long)]
        memo: Option<String>,
        /// Asset price used for the platform fee minimum
        #[arg(long)]
        price: Option<f64>,
    },
    /// Validate, sign and submit a transfer (requires --seed)
    Send(TransferArgs),
    /// Print a page of history
    History {
        /// Logical time of the cursor record
        #[arg(long, requires = "hash")]
        lt: Option<String>,
        /// Hash of the cursor record
        #[arg(long, requires = "lt")]
        hash: Option<String>,
    },
    /// Print the canonical form of an address
    Unalias {
        /// Address to canonicalize
        address: String,
    },
}

#[derive(clap::Args, Debug)]
struct TransferArgs {
    /// Destination address
    #[arg(long)]
    to: String,
    /// Amount in base units
    #[arg(long)]
    amount: u128,
    /// Comment attached to the transfer
    #[arg(long)]
    memo: Option<String>,
    /// Asset price used for the platform fee minimum
    #[arg(long)]
    price: Option<f64>,
}

impl TransferArgs {
    fn request(&self) -> TransferRequest {
        TransferRequest {
            address: self.to.clone(),
            amount: self.amount,
            price: self.price,
            memo: self.memo.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = CliConfig::load(&args.config, &args)?;
    info!("Node: {}", config.node_url);

    if let Command::Unalias { address } = &args.command {
        return print_json(&toncoin_wallet::canonicalize(address));
    }

    let seed = args
        .seed
        .as_deref()
        .map(|seed| hex::decode(seed.trim()).context("Seed is not valid hex"))
        .transpose()?;

    let wallet = open_wallet(&config, &args, seed.as_deref())?;

    match &args.command {
        Command::Address => println!("{}", wallet.address()?),
        Command::PublicKey => print_json(&wallet.public_key()?)?,
        Command::PrivateKey => {
            let seed = require_seed(seed.as_deref())?;
            print_json(&wallet.private_key(seed)?)?;
        }
        Command::Balance => {
            wallet.load().await?;
            println!("{}", wallet.balance());
            if wallet.config().asset.is_token() {
                println!("native: {}", wallet.native_balance());
            }
        }
        Command::Fee(transfer) => {
            wallet.load().await?;
            let request = transfer.request();
            wallet.validate_address(&request.address)?;
            println!("{}", wallet.estimate_transaction_fee(&request).await?);
        }
        Command::Max { to, memo, price } => {
            wallet.load().await?;
            wallet.validate_address(to)?;
            println!(
                "{}",
                wallet.estimate_max_amount(to, memo.as_deref(), *price).await?
            );
        }
        Command::Send(transfer) => {
            let seed = require_seed(seed.as_deref())?;
            wallet.load().await?;
            let request = transfer.request();
            wallet.validate_address(&request.address)?;
            wallet.validate_meta(&request.meta())?;
            wallet.validate_amount(&request).await?;
            let id = wallet.create_transaction(&request, seed).await?;
            println!("{}", id);
        }
        Command::History { lt, hash } => {
            let cursor = match (lt, hash) {
                (Some(lt), Some(hash)) => Some(Cursor {
                    lt: lt.clone(),
                    hash: hash.clone(),
                }),
                _ => None,
            };
            let page = wallet.load_transactions(cursor.as_ref()).await?;
            print_json(&page.records)?;
            if let (true, Some(next)) = (page.has_more, page.next_cursor) {
                eprintln!("next: --lt {} --hash {}", next.lt, next.hash);
            }
        }
        Command::Unalias { .. } => {}
    }

    wallet.cleanup();
    Ok(())
}

fn open_wallet(config: &CliConfig, args: &Args, seed: Option<&[u8]>) -> Result<WalletAccount> {
    let transport = HttpTransport::new(&config.node_url, Duration::from_secs(config.timeout_secs))?;
    let store = JsonFileStore::open(&config.store_path)?;
    let wallet = WalletAccount::new(
        config.wallet.clone(),
        NodeClient::new(Arc::new(transport)),
        Arc::new(store),
    )
    .with_fee_schedule(Arc::new(StaticFeeSchedule(config.fee_schedule.clone())));

    match (seed, &args.public_key) {
        (Some(seed), _) => wallet.create(seed)?,
        (None, Some(public_key)) => wallet.open(&PublicKeyExport {
            settings: WalletSettings {
                bip44: config.wallet.derivation_path.clone(),
            },
            data: public_key.clone(),
        })?,
        (None, None) => bail!("Either --seed or --public-key is required"),
    }
    Ok(wallet)
}

fn require_seed(seed: Option<&[u8]>) -> Result<&[u8]> {
    seed.context("This command requires --seed")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
