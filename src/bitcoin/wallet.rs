//! Watch-only BDK wallet built from a discovered wallet's descriptors

use crate::config::NetworkType;
use crate::types::DiscoveredWallet;
use bdk_wallet::{KeychainKind, Wallet};

/// Errors that can occur while building a watch-only wallet
#[derive(Debug, thiserror::Error)]
pub enum WatchOnlyWalletError {
    #[error("BDK create error: {0}")]
    Create(String),

    #[error("Wallet {0} has no descriptors (single-address watch-only)")]
    NoDescriptors(String),
}

/// In-memory watch-only wallet around BDK
///
/// Used to cross-check derived addresses and to hand discovered accounts
/// to a descriptor-based wallet without any private key material.
pub struct WatchOnlyWallet {
    /// BDK wallet without persistence
    wallet: Wallet,

    /// Network type
    network: NetworkType,
}

impl WatchOnlyWallet {
    /// Create a watch-only wallet from an external descriptor
    ///
    /// The change descriptor is obtained by replacing `/0/*` with `/1/*`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let descriptor = "wpkh([73c5da0a/84'/0'/0']xpub.../0/*)";
    /// let wallet = WatchOnlyWallet::new(descriptor, NetworkType::Mainnet)?;
    /// ```
    pub fn new(descriptor: &str, network: NetworkType) -> Result<Self, WatchOnlyWalletError> {
        let change_descriptor = descriptor.replace("/0/*", "/1/*");
        Self::with_change(descriptor, &change_descriptor, network)
    }

    /// Create a watch-only wallet from explicit external and change descriptors
    pub fn with_change(
        descriptor: &str,
        change_descriptor: &str,
        network: NetworkType,
    ) -> Result<Self, WatchOnlyWalletError> {
        let wallet = Wallet::create(descriptor.to_string(), change_descriptor.to_string())
            .network(network.to_bitcoin())
            .create_wallet_no_persist()
            .map_err(|e| WatchOnlyWalletError::Create(format!("Failed to create wallet: {}", e)))?;

        Ok(Self { wallet, network })
    }

    /// Build the wallet of a discovered HD or xpub account
    pub fn from_discovered(discovered: &DiscoveredWallet) -> Result<Self, WatchOnlyWalletError> {
        let (descriptor, change_descriptor) = discovered
            .descriptors()
            .ok_or_else(|| WatchOnlyWalletError::NoDescriptors(discovered.id.to_string()))?;
        Self::with_change(descriptor, change_descriptor, discovered.network)
    }

    /// Get the network type
    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// Receive address at `index`, without revealing it
    pub fn peek_address(&self, index: u32) -> bitcoin::Address {
        self.wallet.peek_address(KeychainKind::External, index).address
    }

    /// First `count` receive addresses
    pub fn list_addresses(&self, count: u32) -> Vec<bitcoin::Address> {
        (0..count).map(|index| self.peek_address(index)).collect()
    }

    /// First `count` change addresses
    pub fn list_change_addresses(&self, count: u32) -> Vec<bitcoin::Address> {
        (0..count)
            .map(|index| self.wallet.peek_address(KeychainKind::Internal, index).address)
            .collect()
    }
}

impl std::fmt::Debug for WatchOnlyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchOnlyWallet")
            .field("network", &self.network)
            .finish()
    }
}
