//! Config command implementations

use std::path::Path;

use crate::config::{default_config_path, save_config, ConfigError, DiscoveryConfig, NetworkType};

/// Initialize configuration file with network-specific defaults
pub fn init(network: Option<String>, config_path: Option<&Path>) -> Result<(), ConfigError> {
    let network_type = match network.as_deref() {
        Some(n) => n.parse::<NetworkType>()?,
        None => NetworkType::Mainnet,
    };

    let config = DiscoveryConfig::for_network(network_type);
    save_config(&config, config_path)?;

    let written_to = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    println!("✓ Configuration initialized for {}", network_type);
    println!("  Config file: {}", written_to.display());
    println!("  Esplora:     {}", config.bitcoin.esplora_url);
    println!("  Gap limit:   {}", config.scan.gap_limit);

    Ok(())
}
