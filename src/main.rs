//! woofi-swap - token swaps through WooFi routers
//!
//! Swaps on a single EVM network through the on-chain router, or across
//! networks through the cross-chain router and its LayerZero bridge.

use anyhow::{Context, Result};
use clap::Parser;
use ethers::utils::{format_ether, format_units};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

mod chain;
mod cli;
mod config;
mod error;
mod swap;
mod tx;

use chain::NetworkRegistry;
use cli::{Cli, Command, OrderArgs};
use config::{LoggingConfig, Settings};
use error::SubmissionError;
use swap::{SwapOrder, Swapper};
use tx::Credential;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::load(cli.config.as_deref())?;

    init_logging(&settings.logging)?;
    info!("Starting woofi-swap v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command, settings).await {
        match e.downcast_ref::<SubmissionError>() {
            Some(err) => {
                error!("{}", err.cause());
                if err.is_on_chain() {
                    warn!("The transaction was broadcast; check it before retrying");
                }
            }
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Command, settings: Settings) -> Result<()> {
    let registry = Arc::new(NetworkRegistry::from_settings(&settings)?);
    info!("Configured networks: {}", registry.keys().join(", "));

    match command {
        Command::Balance { network, address } => {
            let network = registry.get(&network)?;
            let address = match address {
                Some(address) => address,
                None => Credential::from_env(&settings.wallet.private_key_env)?.address(),
            };

            let balance = network.client.get_balance(address).await?;
            info!("Balance of {:?} on {}", address, network.config.name);
            println!("{} ETH", format_ether(balance));
        }

        Command::GasPrice { network } => {
            let network = registry.get(&network)?;
            let price = network.client.get_gas_price().await?;
            let gwei = format_units(price, "gwei").context("Failed to format gas price")?;
            println!("{} gwei", gwei);
        }

        Command::OnChain { network, order } => {
            let swapper = swapper(registry, &settings)?;
            let order = swap_order(order, &settings);
            let outcome = swapper.on_chain_swap(&network, &order).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::CrossChain {
            from_network,
            to_network,
            order,
        } => {
            let swapper = swapper(registry, &settings)?;
            let order = swap_order(order, &settings);
            let outcome = swapper
                .cross_chain_swap(&from_network, &to_network, &order)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn swapper(registry: Arc<NetworkRegistry>, settings: &Settings) -> Result<Swapper> {
    let credential = Credential::from_env(&settings.wallet.private_key_env)?;
    info!("Using wallet {:?}", credential.address());
    Ok(Swapper::new(registry, credential, settings.swap.clone()))
}

fn swap_order(args: OrderArgs, settings: &Settings) -> SwapOrder {
    SwapOrder {
        token_in: args.from,
        token_out: args.to,
        amount: args.amount,
        slippage_percent: args
            .slippage
            .unwrap_or(settings.swap.default_slippage_percent),
    }
}

fn log_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::new(format!("{},hyper=warn", level))
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(&config.level));

    // The file keeps its own level, so it can hold debug output under a quiet console
    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(log_filter(&config.file_level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(console_filter))
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_filter_is_independent_of_console() {
        let config = LoggingConfig {
            level: "info".to_string(),
            file: Some("swap.log".into()),
            ..LoggingConfig::default()
        };

        let file = log_filter(&config.file_level).to_string();
        let console = log_filter(&config.level).to_string();
        assert!(file.contains("debug"), "{}", file);
        assert!(!console.contains("debug"), "{}", console);
    }
}
