//! Configuration loading for the modelmart CLI.
//!
//! The configuration is stored in TOML format and defines:
//! - Network settings (RPC endpoint, polling and timeouts)
//! - The two contract addresses and their interface descriptors
//! - Wallet settings (enabled, preferred account)

use std::path::{Path, PathBuf};
use std::time::Duration;

use modelmart_client::{Address, ConfirmationPolicy, RpcOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Receipt polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for a transaction to be mined.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Timeout of a single RPC request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_confirmation_timeout_secs() -> u64 {
    120
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Deployed contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Address of the token contract.
    pub token_address: Address,

    /// Address of the marketplace contract.
    pub marketplace_address: Address,

    /// Compiled artifact of the token contract.
    #[serde(default)]
    pub token_descriptor: Option<PathBuf>,

    /// Compiled artifact of the marketplace contract.
    #[serde(default)]
    pub marketplace_descriptor: Option<PathBuf>,

    /// Symbol shown next to token amounts.
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
}

fn default_token_symbol() -> String {
    "MTKL".to_string()
}

/// Wallet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// `false` runs as if no wallet were installed.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Account to use when the wallet authorizes several.
    #[serde(default)]
    pub account: Option<Address>,
}

const fn default_enabled() -> bool {
    true
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            account: None,
        }
    }
}

/// Complete modelmart configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelmartConfig {
    /// Network settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Contract addresses and descriptors.
    pub contracts: ContractsConfig,

    /// Wallet settings.
    #[serde(default)]
    pub wallet: WalletConfig,
}

impl ModelmartConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ModelmartConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "network.rpc_url must not be empty".to_string(),
            ));
        }
        if self.network.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "network.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.network.confirmation_timeout_secs == 0 || self.network.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "network timeouts must be greater than zero".to_string(),
            ));
        }
        if self.contracts.token_address == self.contracts.marketplace_address {
            return Err(ConfigError::ValidationError(format!(
                "token and marketplace share the address {}",
                self.contracts.token_address
            )));
        }
        if self.contracts.token_address.is_zero() || self.contracts.marketplace_address.is_zero() {
            return Err(ConfigError::ValidationError(
                "contract addresses must not be the zero address".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the RPC endpoint, e.g. from the command line.
    pub fn override_rpc_url(&mut self, rpc_url: Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = rpc_url {
            self.network.rpc_url = url;
            self.validate()?;
        }
        Ok(())
    }

    /// Receipt polling settings.
    #[must_use]
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.network.poll_interval_ms),
            timeout: Duration::from_secs(self.network.confirmation_timeout_secs),
        }
    }

    /// Settings for an RPC-backed client.
    #[must_use]
    pub fn rpc_options(&self) -> RpcOptions {
        RpcOptions {
            rpc_url: self.network.rpc_url.clone(),
            token_address: self.contracts.token_address,
            marketplace_address: self.contracts.marketplace_address,
            wallet_enabled: self.wallet.enabled,
            account: self.wallet.account,
            request_timeout: Duration::from_secs(self.network.request_timeout_secs),
            confirmation: self.confirmation_policy(),
        }
    }
}
