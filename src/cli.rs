//! Command line interface

use clap::{Args, Parser, Subcommand};
use ethers::types::Address;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "woofi-swap", version, about = "Token swaps through WooFi routers")]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "WOOFI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Native balance of an address, in ether
    Balance {
        #[arg(long)]
        network: String,
        /// Defaults to the configured wallet
        #[arg(long, value_parser = parse_address)]
        address: Option<Address>,
    },

    /// Current gas price, in gwei
    GasPrice {
        #[arg(long)]
        network: String,
    },

    /// Swap on a single network
    OnChain {
        #[arg(long)]
        network: String,
        #[command(flatten)]
        order: OrderArgs,
    },

    /// Swap across two networks through the bridge
    CrossChain {
        #[arg(long)]
        from_network: String,
        #[arg(long)]
        to_network: String,
        #[command(flatten)]
        order: OrderArgs,
    },
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Token to sell: a symbol from the network's token table or an address
    #[arg(long)]
    pub from: String,
    /// Token to buy
    #[arg(long)]
    pub to: String,
    /// Decimal amount of the sold token
    #[arg(long)]
    pub amount: String,
    /// Slippage in percent; defaults to `swap.default_slippage_percent`
    #[arg(long)]
    pub slippage: Option<f64>,
}

fn parse_address(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|e| format!("invalid address {:?}: {}", value, e))
}
