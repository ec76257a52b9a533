//! Configuration types for the seed discovery engine
//!
//! Manages global configuration including network settings, the Esplora
//! endpoint used for history probing, and scan tuning (gap limit, retries,
//! timeouts).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub bitcoin: BitcoinConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Bitcoin network and blockchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinConfig {
    pub network: NetworkType,
    pub esplora_url: String,
}

/// Scan tuning for the discovery orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of consecutive external addresses probed per account
    pub gap_limit: u32,

    /// Upper bound on accounts scanned per wallet kind
    pub max_accounts: u32,

    /// Timeout applied to every prober call, in seconds
    pub probe_timeout_secs: u64,

    /// Retries after the first failed prober call of a batch
    pub max_retries: u32,

    /// Base backoff between retries, doubled on every attempt
    pub retry_backoff_ms: u64,

    /// Capacity of the event channel between a task and its caller
    pub event_buffer: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            gap_limit: 20,
            max_accounts: 100,
            probe_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            event_buffer: 64,
        }
    }
}

impl ScanConfig {
    /// Timeout for a single prober call
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Backoff before retry number `attempt` (0-based)
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Bitcoin network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Regtest,
    Signet,
    Testnet,
    Mainnet,
}

impl NetworkType {
    /// Map to the `bitcoin` crate network
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            NetworkType::Mainnet => bitcoin::Network::Bitcoin,
            NetworkType::Testnet => bitcoin::Network::Testnet,
            NetworkType::Signet => bitcoin::Network::Signet,
            NetworkType::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// BIP-44 coin type: 0 for mainnet, 1 for every test network
    pub fn coin_type(self) -> u32 {
        match self {
            NetworkType::Mainnet => 0,
            NetworkType::Testnet | NetworkType::Signet | NetworkType::Regtest => 1,
        }
    }
}

impl std::str::FromStr for NetworkType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regtest" => Ok(NetworkType::Regtest),
            "signet" => Ok(NetworkType::Signet),
            "testnet" => Ok(NetworkType::Testnet),
            "mainnet" | "bitcoin" => Ok(NetworkType::Mainnet),
            other => Err(ConfigError::InvalidNetwork(other.to_string())),
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Regtest => write!(f, "regtest"),
            NetworkType::Signet => write!(f, "signet"),
            NetworkType::Testnet => write!(f, "testnet"),
            NetworkType::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl DiscoveryConfig {
    /// Create default configuration for a network
    pub fn for_network(network: NetworkType) -> Self {
        Self {
            bitcoin: BitcoinConfig {
                network,
                esplora_url: default_esplora_url(network),
            },
            scan: ScanConfig::default(),
        }
    }

    /// Create default configuration for regtest
    pub fn default_regtest() -> Self {
        Self::for_network(NetworkType::Regtest)
    }

    /// Create default configuration for signet
    pub fn default_signet() -> Self {
        Self::for_network(NetworkType::Signet)
    }

    /// Create default configuration for testnet
    pub fn default_testnet() -> Self {
        Self::for_network(NetworkType::Testnet)
    }

    /// Create default configuration for mainnet
    pub fn default_mainnet() -> Self {
        Self::for_network(NetworkType::Mainnet)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::default_mainnet()
    }
}

/// Get default Esplora URL for a given network
///
/// # Returns
///
/// - Regtest: `http://localhost:3002`
/// - Signet: `https://mempool.space/signet/api`
/// - Testnet: `https://mempool.space/testnet/api`
/// - Mainnet: `https://mempool.space/api`
pub fn default_esplora_url(network: NetworkType) -> String {
    match network {
        NetworkType::Regtest => "http://localhost:3002".to_string(),
        NetworkType::Signet => "https://mempool.space/signet/api".to_string(),
        NetworkType::Testnet => "https://mempool.space/testnet/api".to_string(),
        NetworkType::Mainnet => "https://mempool.space/api".to_string(),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Config directory not found")]
    DirectoryNotFound,
}

/// Configuration overrides from CLI arguments or environment variables
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub network: Option<NetworkType>,
    pub esplora_url: Option<String>,
    pub gap_limit: Option<u32>,
    pub probe_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Create overrides from environment variables
    ///
    /// Unparseable values are ignored rather than reported.
    pub fn from_env() -> Self {
        Self {
            network: std::env::var("BITCOIN_NETWORK")
                .ok()
                .and_then(|s| s.parse().ok()),
            esplora_url: std::env::var("ESPLORA_URL").ok(),
            gap_limit: std::env::var("DISCOVERY_GAP_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok()),
            probe_timeout_secs: std::env::var("DISCOVERY_PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Merge with another set of overrides (other takes precedence)
    pub fn merge(mut self, other: Self) -> Self {
        if other.network.is_some() {
            self.network = other.network;
        }
        if other.esplora_url.is_some() {
            self.esplora_url = other.esplora_url;
        }
        if other.gap_limit.is_some() {
            self.gap_limit = other.gap_limit;
        }
        if other.probe_timeout_secs.is_some() {
            self.probe_timeout_secs = other.probe_timeout_secs;
        }
        self
    }
}

/// Get the default configuration directory path
///
/// Returns: `~/.vault-seed-discovery/`
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".vault-seed-discovery"))
        .ok_or(ConfigError::DirectoryNotFound)
}

/// Get the default configuration file path
///
/// Returns: `~/.vault-seed-discovery/config.json`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("config.json"))
}

/// Load configuration from file with overrides
///
/// # Priority (highest to lowest):
/// 1. CLI overrides (passed as argument)
/// 2. Environment variables
/// 3. Config file
/// 4. Network defaults
///
/// # Example
///
/// ```ignore
/// use vault_seed_discovery::config::{load_config, ConfigOverrides, NetworkType};
///
/// let mut cli_overrides = ConfigOverrides::new();
/// cli_overrides.network = Some(NetworkType::Signet);
///
/// let config = load_config(None, cli_overrides)?;
/// ```
pub fn load_config(
    config_path: Option<&Path>,
    cli_overrides: ConfigOverrides,
) -> Result<DiscoveryConfig, ConfigError> {
    load_config_with_env(config_path, ConfigOverrides::from_env(), cli_overrides)
}

/// Load configuration with explicit environment overrides
///
/// Same precedence as [`load_config`]; lets callers (and tests) supply the
/// environment layer instead of reading the process environment.
pub fn load_config_with_env(
    config_path: Option<&Path>,
    env_overrides: ConfigOverrides,
    cli_overrides: ConfigOverrides,
) -> Result<DiscoveryConfig, ConfigError> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let mut config = if path.exists() {
        log::debug!("Loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents)?
    } else {
        let network = cli_overrides
            .network
            .or(env_overrides.network)
            .unwrap_or(NetworkType::Mainnet);
        DiscoveryConfig::for_network(network)
    };

    apply_overrides(&mut config, env_overrides);
    apply_overrides(&mut config, cli_overrides);
    validate_config(&config)?;

    Ok(config)
}

/// Save configuration to file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &DiscoveryConfig, config_path: Option<&Path>) -> Result<(), ConfigError> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;

    Ok(())
}

/// Apply configuration overrides (internal helper)
fn apply_overrides(config: &mut DiscoveryConfig, overrides: ConfigOverrides) {
    if let Some(network) = overrides.network {
        if config.bitcoin.network != network {
            config.bitcoin.network = network;
            // Keep the endpoint consistent with the network unless it is overridden too
            if overrides.esplora_url.is_none() {
                config.bitcoin.esplora_url = default_esplora_url(network);
            }
        }
    }

    if let Some(url) = overrides.esplora_url {
        config.bitcoin.esplora_url = url;
    }
    if let Some(gap_limit) = overrides.gap_limit {
        config.scan.gap_limit = gap_limit;
    }
    if let Some(secs) = overrides.probe_timeout_secs {
        config.scan.probe_timeout_secs = secs;
    }
}

fn validate_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.scan.gap_limit == 0 {
        return Err(ConfigError::Invalid("gap_limit must be at least 1".to_string()));
    }
    if config.scan.probe_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "probe_timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.scan.max_accounts == 0 {
        return Err(ConfigError::Invalid(
            "max_accounts must be at least 1".to_string(),
        ));
    }
    if config.scan.event_buffer == 0 {
        return Err(ConfigError::Invalid(
            "event_buffer must be at least 1".to_string(),
        ));
    }
    Ok(())
}
