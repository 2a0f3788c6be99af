//! Configuration management for the Pontis publisher
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::felt::{deserialize_felt, Felt};
use crate::tx::{FeeEstimator, DEFAULT_FEE_SAFETY_MARGIN};

use anyhow::{Context, Result};
use serde::Deserialize;
use starknet::macros::felt;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub submitter: SubmitterConfig,
    pub publisher: PublisherConfig,
    pub gateway: GatewayConfig,
    pub wallet: WalletConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

/// Transaction submission engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitterConfig {
    /// Network name, e.g. "testnet"
    pub network: String,
    /// Chain identifier as a short string, e.g. "SN_GOERLI"
    pub chain_id: String,
    /// Account contract that signs and sends transactions
    #[serde(deserialize_with = "deserialize_felt")]
    pub account_address: Felt,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    #[serde(default = "default_fee_safety_margin")]
    pub fee_safety_margin: f64,
    /// Applied when a caller does not pass its own ceiling
    #[serde(default)]
    pub max_fee_ceiling: Option<u128>,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub publisher_name: String,
    #[serde(deserialize_with = "deserialize_felt")]
    pub oracle_controller_address: Felt,
    #[serde(deserialize_with = "deserialize_felt")]
    pub publisher_registry_address: Felt,
    /// ERC20 token fees are paid in; defaults to ETH
    #[serde(
        default = "default_fee_token_address",
        deserialize_with = "deserialize_felt"
    )]
    pub fee_token_address: Felt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub rpc_urls: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub private_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_fee_safety_margin() -> f64 {
    DEFAULT_FEE_SAFETY_MARGIN
}

fn default_fee_token_address() -> Felt {
    felt!("0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7")
}

impl SubmitterConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Settings {
    /// Load settings from the file named by `PONTIS_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("PONTIS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings for a specific environment
    pub fn load_env(env_name: &str) -> Result<Self> {
        Self::load_from(&PathBuf::from(format!("config/{}.toml", env_name)))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references first
    pub fn parse(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.gateway.rpc_urls.is_empty() {
            anyhow::bail!("No RPC URLs configured");
        }

        // Same basis-point rounding the submitter applies at startup
        FeeEstimator::new(self.submitter.fee_safety_margin)
            .context("Invalid fee_safety_margin")?;

        if self.submitter.confirmation_timeout_secs == 0 {
            anyhow::bail!("confirmation_timeout_secs must be positive");
        }

        if self.submitter.max_retries == 0 {
            tracing::warn!("max_retries is 0 - transient gateway faults will not be retried");
        }

        if self.submitter.account_address == Felt::ZERO {
            anyhow::bail!("account_address is not configured");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
