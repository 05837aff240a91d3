//! EVM Wallet CLI
//!
//! Command-line interface for managing accounts and networks and sending transfers.

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};
use evm_wallet::chain::{balance, AlloyConnector, Connector};
use evm_wallet::{
    units, Account, Config, Error, Network, Result, SubmitOptions, Transaction,
    TransactionSubmitter, TransferJournal, Wallet,
};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "wallet")]
#[command(about = "Local wallet for EVM chains")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the wallet database (overrides config and environment)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Manage networks
    #[command(subcommand)]
    Network(NetworkCommand),

    /// Send native currency from the selected account on the selected network
    Send {
        /// Recipient address
        #[arg(short, long)]
        to: String,

        /// Amount in smallest units, or in display units with --ether
        #[arg(short, long)]
        amount: String,

        /// Interpret the amount in display units (1 = 10^18 smallest units)
        #[arg(long)]
        ether: bool,

        /// Stop waiting for the receipt after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Generate a new account and select it
    Create {
        #[arg(short, long)]
        label: String,
    },

    /// Import an existing private key and select it
    Import {
        #[arg(short, long)]
        label: String,

        /// Hex private key, with or without 0x prefix
        #[arg(short = 'k', long)]
        private_key: String,
    },

    /// List accounts
    List {
        /// Print private keys as well
        #[arg(long)]
        show_keys: bool,
    },

    /// Remove an account
    Rm {
        #[arg(short, long)]
        label: String,
    },

    /// Select an account
    Select {
        #[arg(short, long)]
        label: String,
    },

    /// Native balance of the selected account on the selected network
    Balance,

    /// Track an ERC-20 token for an account
    AddToken {
        #[arg(short, long)]
        label: String,

        /// Token contract address
        #[arg(short, long)]
        token: String,
    },

    /// Balances of the selected account's tracked tokens
    Tokens,
}

#[derive(Subcommand)]
enum NetworkCommand {
    /// Add a network and select it
    Add {
        #[arg(short, long)]
        label: String,

        /// HTTP(S) JSON-RPC endpoint
        #[arg(short, long)]
        rpc_url: String,

        #[arg(short, long)]
        chain_id: u64,

        /// Native currency symbol
        #[arg(short, long)]
        symbol: String,
    },

    /// List networks
    List,

    /// Remove a network
    Rm {
        #[arg(short, long)]
        label: String,
    },

    /// Select a network
    Select {
        #[arg(short, long)]
        label: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Config first so WALLET_DEBUG can raise the log level
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Initialize logging
    let filter = if cli.verbose || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::debug!(data_dir = %config.data_dir.display(), "Opening wallet");
    let wallet = Wallet::open(&config)?;

    match cli.command {
        Commands::Account(command) => run_account(&wallet, command).await?,
        Commands::Network(command) => run_network(&wallet, command)?,
        Commands::Send {
            to,
            amount,
            ether,
            timeout,
        } => run_send(&wallet, &config, &to, &amount, ether, timeout).await?,
    }

    Ok(())
}

async fn run_account(wallet: &Wallet, command: AccountCommand) -> Result<()> {
    match command {
        AccountCommand::Create { label } => {
            let account = wallet.create_account(&label)?;
            println!("Created account '{}': {}", account.label, account.public_address);
        }
        AccountCommand::Import { label, private_key } => {
            let account = wallet.import_account(&label, &private_key)?;
            println!("Imported account '{}': {}", account.label, account.public_address);
        }
        AccountCommand::List { show_keys } => {
            for account in wallet.list_accounts()? {
                print_account(&account, show_keys);
            }
        }
        AccountCommand::Rm { label } => {
            wallet.remove_account(&label)?;
            println!("Removed account '{}'", label);
        }
        AccountCommand::Select { label } => {
            let account = wallet.select_account(&label)?;
            println!("Selected account '{}': {}", account.label, account.public_address);
        }
        AccountCommand::Balance => {
            let account = wallet.selected_account()?;
            let network = wallet.selected_network()?;
            let owner = parse_address(&account.public_address)?;

            let client = AlloyConnector.connect(&network).await?;
            let wei = balance::native_balance(&client, owner)
                .await
                .map_err(Error::Rpc)?;
            println!(
                "{} ({}): {} {}",
                account.label,
                network.label,
                units::to_display(wei),
                network.symbol
            );
        }
        AccountCommand::AddToken { label, token } => {
            let account = wallet.add_token(&label, &token)?;
            println!("Account '{}' tracks {} token(s)", account.label, account.tokens.len());
        }
        AccountCommand::Tokens => {
            let account = wallet.selected_account()?;
            let network = wallet.selected_network()?;
            let owner = parse_address(&account.public_address)?;

            if account.tokens.is_empty() {
                println!("No tokens tracked for '{}'", account.label);
                return Ok(());
            }

            let client = AlloyConnector.connect(&network).await?;
            for token in &account.tokens {
                let token_address = parse_address(token)?;
                let query = async {
                    let amount = balance::token_balance(&client, token_address, owner).await?;
                    let decimals = balance::token_decimals(&client, token_address).await?;
                    Ok::<_, evm_wallet::RpcError>(units::format_units(amount, decimals))
                };
                match query.await {
                    Ok(amount) => println!("  {}: {}", token, amount),
                    Err(e) => {
                        tracing::warn!(token = %token, error = %e, "Token balance query failed");
                        println!("  {}: unavailable", token);
                    }
                }
            }
        }
    }
    Ok(())
}

fn run_network(wallet: &Wallet, command: NetworkCommand) -> Result<()> {
    match command {
        NetworkCommand::Add {
            label,
            rpc_url,
            chain_id,
            symbol,
        } => {
            let network = wallet.add_network(Network::new(label, chain_id, symbol, rpc_url))?;
            println!("Added network '{}' ({})", network.label, network.rpc_url);
        }
        NetworkCommand::List => {
            for network in wallet.list_networks()? {
                print_network(&network);
            }
        }
        NetworkCommand::Rm { label } => {
            wallet.remove_network(&label)?;
            println!("Removed network '{}'", label);
        }
        NetworkCommand::Select { label } => {
            let network = wallet.select_network(&label)?;
            println!("Selected network '{}' ({})", network.label, network.rpc_url);
        }
    }
    Ok(())
}

async fn run_send(
    wallet: &Wallet,
    config: &Config,
    to: &str,
    amount: &str,
    ether: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let account = wallet.selected_account()?;
    let network = wallet.selected_network()?;
    let to = parse_address(to)?;
    let amount: U256 = if ether {
        units::from_display(amount)?
    } else {
        units::parse_smallest(amount)?
    };

    let mut options = SubmitOptions::from_config(&config.receipt);
    if let Some(secs) = timeout {
        options.timeout = Some(Duration::from_secs(secs));
    }

    let submitter = TransactionSubmitter::new(AlloyConnector, options)
        .with_journal(TransferJournal::new(config.journal_path()));

    // Ctrl-C abandons the receipt wait; the transfer itself may still be mined
    let cancel = submitter.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, no longer waiting for the receipt");
            cancel.cancel();
        }
    });

    tracing::info!(
        from = %account.public_address,
        to = %to,
        amount = %amount,
        network = %network.label,
        "Sending transfer"
    );

    let tx = submitter
        .send(account.private_key(), to, amount, &network)
        .await?;
    print_transaction(&tx);
    Ok(())
}

fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| Error::Validation(format!("invalid address '{}': {}", value, e)))
}

fn print_account(account: &Account, show_key: bool) {
    let marker = if account.selected { "*" } else { " " };
    println!("{} {} {}", marker, account.label, account.public_address);
    if show_key {
        println!("    key: {}", account.private_key().expose_secret());
    }
    for token in &account.tokens {
        println!("    token: {}", token);
    }
}

fn print_network(network: &Network) {
    let marker = if network.selected { "*" } else { " " };
    println!(
        "{} {} chain={} symbol={} {}",
        marker, network.label, network.chain_id, network.symbol, network.rpc_url
    );
}

fn print_transaction(tx: &Transaction) {
    if tx.succeeded {
        println!("Transfer CONFIRMED");
    } else {
        println!("Transfer REVERTED");
    }
    println!("  Hash:      {}", tx.hash);
    println!("  Network:   {}", tx.network.label);
    println!("  From:      {}", tx.from);
    println!("  To:        {}", tx.to);
    println!(
        "  Amount:    {} {}",
        units::to_display(tx.amount),
        tx.network.symbol
    );
    println!("  Gas used:  {}", tx.gas_used);
    println!("  Gas price: {}", tx.gas_price);
    println!(
        "  Fee:       {} {}",
        units::to_display(tx.fee()),
        tx.network.symbol
    );
}
