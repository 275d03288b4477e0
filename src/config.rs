//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (or the path in `TRADER_CONFIG`) and deserializes
//! into strongly-typed structs. The signing key is referenced by env-var
//! name in the config and resolved at runtime, never stored in the file.

use anyhow::{bail, Context, Result};
use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::watchdog::WatchdogConfig;
use crate::strategy::StrategyParams;

/// Env var overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "TRADER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub strategy: StrategyConfig,
    pub watchdog: WatchdogSettings,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_endpoint: String,
    pub chain_id: u64,
    pub ticket_contract: Address,
    pub auction_contract: Address,
    /// Account whose balance is checked. Defaults to the signer's address.
    #[serde(default)]
    pub account_address: Option<Address>,
    /// Name of the env var holding the hex private key.
    pub signing_key_env: String,
    #[serde(default = "default_block_poll_interval_ms")]
    pub block_poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Blocks to wait for before a swap counts as confirmed.
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StrategyConfig {
    /// Decimal amount in token units, e.g. "0.3".
    pub trade_amount: String,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
    pub slippage_percent: u32,
    pub window_size: usize,
    pub threshold_multiplier_percent: u32,
    #[serde(default = "default_true")]
    pub enforce_balance_check: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchdogSettings {
    pub liveness_timeout_ms: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Confirmation poll interval and below-threshold pause.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

fn default_block_poll_interval_ms() -> u64 {
    1_000
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_confirmations() -> usize {
    1
}

fn default_token_decimals() -> u32 {
    18
}

fn default_true() -> bool {
    true
}

fn default_grace_period_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Load from `TRADER_CONFIG` if set, otherwise `config.toml`.
    pub fn load_default() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.strategy.window_size == 0 {
            bail!("strategy.window_size must be at least 1");
        }
        if self.strategy.slippage_percent > 100 {
            bail!(
                "strategy.slippage_percent must be 0-100, got {}",
                self.strategy.slippage_percent
            );
        }
        if self.watchdog.liveness_timeout_ms == 0 {
            bail!("watchdog.liveness_timeout_ms must be positive");
        }
        if self.watchdog.poll_interval_ms == 0 {
            bail!("watchdog.poll_interval_ms must be positive");
        }
        if self.trade_amount()?.is_zero() {
            bail!("strategy.trade_amount must be nonzero");
        }
        Ok(())
    }

    /// Trade amount in base units.
    pub fn trade_amount(&self) -> Result<U256> {
        let parsed = parse_units(&self.strategy.trade_amount, self.strategy.token_decimals)
            .with_context(|| {
                format!(
                    "strategy.trade_amount is not a decimal amount: {}",
                    self.strategy.trade_amount
                )
            })?;
        Ok(parsed.into())
    }

    pub fn strategy_params(&self) -> Result<StrategyParams> {
        Ok(StrategyParams {
            trade_amount: self.trade_amount()?,
            token_decimals: self.strategy.token_decimals,
            slippage_percent: self.strategy.slippage_percent,
            window_size: self.strategy.window_size,
            threshold_multiplier_percent: self.strategy.threshold_multiplier_percent,
            enforce_balance_check: self.strategy.enforce_balance_check,
        })
    }

    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            timeout: Duration::from_millis(self.watchdog.liveness_timeout_ms),
            grace_period: Duration::from_secs(self.watchdog.grace_period_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog.poll_interval_ms)
    }

    /// Resolve the signing key from the environment.
    pub fn signing_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.chain.signing_key_env).map(SecretString::new)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
