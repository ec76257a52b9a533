//! Vault Seed Discovery
//!
//! Seed import and wallet discovery engine for a Bitcoin wallet: validates
//! BIP39 phrases, derives the standard account templates, probes address
//! history and streams discovered wallets back to the caller.

pub mod bitcoin;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod seed;
pub mod types;

pub use config::{DiscoveryConfig, NetworkType};
pub use discovery::{Discovery, DiscoveryError, DiscoveryEvent, DiscoveryOptions, DiscoveryResult, Task};
pub use types::{DiscoveredWallet, WalletId, WalletKind, WalletTemplate};
