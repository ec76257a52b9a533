//! Bitcoin network layer
//!
//! Address history probing against Esplora and watch-only BDK wallets for
//! discovered accounts

pub mod network;
pub mod prober;
pub mod wallet;

pub use network::{EsploraClient, HistorySummary, NetworkError};
pub use prober::{AddressProber, EsploraProber, ProbeError};
pub use wallet::{WatchOnlyWallet, WatchOnlyWalletError};
