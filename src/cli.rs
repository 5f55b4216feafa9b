use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;

use crate::blockchain::{self, LedgerApi, TronGridClient, Watcher};
use crate::codec;
use crate::config::AppConfig;
use crate::cursor::{Cursor, SqliteCursor};
use crate::error::Result;
use crate::logging::LogContext;
use crate::network::{Network, NetworkParams};

#[derive(Parser, Debug)]
#[command(name = "watcher")]
#[command(about = "Watches a TRON network for native and token transfers")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to $CONFIG_FILE or ./config.toml)
    #[arg(long, short, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the chain and print one JSON line per transfer
    Watch {
        /// Network to watch (mainnet, testnet/shasta)
        #[arg(long)]
        network: Option<Network>,

        /// Start height; overrides the stored cursor
        #[arg(long)]
        from: Option<u64>,

        /// Only report transfers touching these addresses
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
    /// Native balance of an address
    Balance { address: String },
    /// Token balance of an address
    TokenBalance { address: String },
    /// Base58check form of a hex address (20 or 21 bytes)
    EncodeAddress { hex: String },
    /// ABI word for an address argument
    AbiAddress { address: String },
    /// ABI word for an unsigned integer argument
    AbiUint { value: u128 },
    /// Print a sample configuration file
    Config,
}

/// Executes parsed commands against the loaded configuration
pub struct CliHandler {
    config: AppConfig,
}

impl CliHandler {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, command: &Commands) -> Result<()> {
        match command {
            Commands::Watch { network, from, addresses } => self.watch(*network, *from, addresses).await,
            Commands::Balance { address } => self.balance(address).await,
            Commands::TokenBalance { address } => self.token_balance(address).await,
            Commands::EncodeAddress { hex } => {
                println!("{}", self.encode_address(hex)?);
                Ok(())
            }
            Commands::AbiAddress { address } => {
                println!("{}", codec::abi_encode_address(address)?);
                Ok(())
            }
            Commands::AbiUint { value } => {
                println!("{}", codec::abi_encode_uint(*value));
                Ok(())
            }
            Commands::Config => {
                println!("{}", AppConfig::generate_sample_config()?);
                Ok(())
            }
        }
    }

    fn params(&self) -> Result<NetworkParams> {
        Ok(self.config.network.params()?)
    }

    fn client(&self, params: &NetworkParams) -> Result<TronGridClient> {
        Ok(TronGridClient::from_config(&self.config.api, params)?)
    }

    async fn watch(&self, network: Option<Network>, from: Option<u64>, addresses: &[String]) -> Result<()> {
        let mut config = self.config.clone();
        if let Some(network) = network {
            config.network.network = network;
        }
        let params = config.network.params()?;

        for address in addresses {
            codec::decode_address(address)?;
        }
        let filter = if addresses.is_empty() {
            blockchain::accept_all()
        } else {
            blockchain::watch_addresses(addresses.iter().cloned())
        };

        let api: Arc<dyn LedgerApi> = Arc::new(TronGridClient::from_config(&config.api, &params)?);

        let start = match from.or(config.cursor.start_height) {
            Some(height) => height,
            None => api.head().await?,
        };
        let cursor = SqliteCursor::open(&config.cursor.path, params.network.as_str(), start)?;
        if let Some(height) = from {
            cursor.reset_to(height)?;
        }

        LogContext::new("cli", "watch")
            .with_metadata("network", json!(params.network.as_str()))
            .with_metadata("cursor_path", json!(config.cursor.path))
            .with_metadata("position", json!(cursor.position()?))
            .with_metadata("watched_addresses", json!(addresses.len()))
            .info("Starting watch");

        let (handle, mut events) = Watcher::spawn(api, Arc::new(cursor), filter, params, config.watcher.clone());

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => LogContext::new("cli", "watch")
                            .with_transaction_hash(&event.hash)
                            .error(&format!("Failed to serialize event: {}", e)),
                    },
                    None => break,
                },
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        LogContext::new("cli", "watch").error(&format!("Unable to listen for shutdown signal: {}", e));
                    }
                    handle.stop();
                }
            }
        }

        handle.join().await
    }

    async fn balance(&self, address: &str) -> Result<()> {
        let params = self.params()?;
        let balance = self.client(&params)?.balance(address).await?;

        println!(
            "{}",
            json!({ "address": address, "currency": params.native_symbol, "balance": balance.to_string() })
        );
        Ok(())
    }

    async fn token_balance(&self, address: &str) -> Result<()> {
        let params = self.params()?;
        let balance = self
            .client(&params)?
            .token_balance(address, &params.token_contract)
            .await?;

        println!(
            "{}",
            json!({ "address": address, "currency": params.token_symbol, "balance": balance.to_string() })
        );
        Ok(())
    }

    /// Bare 20-byte payloads get the network version byte; 21-byte input keeps its own
    fn encode_address(&self, hex: &str) -> Result<String> {
        let normalized = codec::normalize_hex(hex);
        let versioned = if normalized.len() == codec::ADDRESS_LEN * 2 {
            format!("{:02x}{}", self.params()?.version_byte, normalized)
        } else {
            normalized
        };

        Ok(codec::decode_versioned_hex(&versioned)?)
    }
}
