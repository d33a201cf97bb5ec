//! Configuration management for woofi-swap
//!
//! Loads the network, router and token tables from a TOML file with
//! environment variable substitution. The result is immutable and passed
//! explicitly to everything that needs it.

use crate::error::{SubmissionError, SubmissionResult};

use anyhow::{Context, Result};
use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config location when neither `--config` nor `WOOFI_CONFIG` is set
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub swap: SwapConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    /// Slippage used when the command line does not give one
    pub default_slippage_percent: f64,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    pub gas_limit_buffer_percent: u64,
    pub gas_price_buffer_percent: u64,
    /// Read the current allowance and skip `approve` when it already covers the swap
    #[serde(default)]
    pub reuse_existing_allowance: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Console filter, overridden by `RUST_LOG`
    pub level: String,
    pub file: Option<PathBuf>,
    /// Filter for the log file, independent of the console
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

fn default_file_level() -> String {
    "debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            file_level: default_file_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// Chain id the bridge uses for this network, if it differs from `chain_id`
    pub bridge_chain_id: Option<u16>,
    pub rpc_urls: Vec<String>,
    pub on_chain_router: Address,
    pub cross_chain_router: Address,
    #[serde(default)]
    pub bridge_token: Address,
    #[serde(default)]
    pub tokens: HashMap<String, Address>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NetworkConfig {
    /// Resolve a token symbol from the table, or accept a raw address
    pub fn token(&self, symbol_or_address: &str) -> SubmissionResult<Address> {
        if symbol_or_address.starts_with("0x") {
            return Address::from_str(symbol_or_address).map_err(|e| {
                SubmissionError::Config(format!(
                    "Invalid token address {}: {}",
                    symbol_or_address, e
                ))
            });
        }

        self.tokens
            .get(&symbol_or_address.to_lowercase())
            .copied()
            .ok_or_else(|| SubmissionError::UnknownToken {
                network: self.name.clone(),
                token: symbol_or_address.to_string(),
            })
    }

    /// Chain id to put in the bridge's destination parameters
    pub fn destination_bridge_id(&self) -> SubmissionResult<u16> {
        match self.bridge_chain_id {
            Some(id) => Ok(id),
            None => u16::try_from(self.chain_id).map_err(|_| {
                SubmissionError::Config(format!(
                    "Chain {} needs a bridge_chain_id: {} does not fit uint16",
                    self.name, self.chain_id
                ))
            }),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to `WOOFI_CONFIG` and then the default path
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => env::var("WOOFI_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_networks().is_empty() {
            anyhow::bail!("At least one network must be enabled");
        }

        let slippage = self.swap.default_slippage_percent;
        if !(0.0..100.0).contains(&slippage) {
            anyhow::bail!("default_slippage_percent must be in [0, 100), got {}", slippage);
        }
        if self.swap.receipt_timeout_secs == 0 || self.swap.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Receipt timeout and poll interval must be non-zero");
        }
        if self.wallet.private_key_env.is_empty() {
            anyhow::bail!("wallet.private_key_env must name an environment variable");
        }

        let mut chain_ids = HashSet::new();
        for (key, network) in self.enabled_networks() {
            if network.rpc_urls.is_empty() {
                anyhow::bail!("Network {} has no RPC URLs configured", key);
            }
            if !chain_ids.insert(network.chain_id) {
                anyhow::bail!("Chain id {} is configured more than once", network.chain_id);
            }
            if network.tokens.is_empty() {
                tracing::warn!("Network {} has no tokens configured", key);
            }
        }

        Ok(())
    }

    /// Get list of enabled networks
    pub fn enabled_networks(&self) -> Vec<(&String, &NetworkConfig)> {
        self.networks.iter().filter(|(_, n)| n.enabled).collect()
    }
}

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
