//! CLI argument definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::types::WalletKind;

#[derive(Parser, Debug)]
#[command(
    name = "vault-discover",
    version,
    about = "Vault seed discovery - validate seed phrases and discover the wallets behind them",
    long_about = None
)]
pub struct Cli {
    /// Network to use: regtest, signet, testnet, mainnet (overrides config)
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    /// Esplora server URL (overrides config)
    #[arg(long, global = true)]
    pub esplora_url: Option<String>,

    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Addresses probed per account before it counts as unused (overrides config)
    #[arg(long, global = true)]
    pub gap_limit: Option<u32>,

    /// Timeout of a single history probe, in seconds (overrides config)
    #[arg(long, global = true)]
    pub probe_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize or manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check a seed phrase against the BIP39 word list and checksum
    Validate {
        /// Seed phrase (quote it)
        phrase: String,
    },

    /// Derive the addresses of one wallet kind and account
    Derive {
        /// Seed phrase (quote it)
        #[arg(short, long)]
        phrase: String,

        /// Wallet kind to derive
        #[arg(short, long, value_enum, default_value = "segwit")]
        kind: KindArg,

        /// Account index
        #[arg(short, long, default_value = "0")]
        account: u32,

        /// Number of receive addresses to show
        #[arg(short, long, default_value = "5")]
        count: u32,

        /// BIP39 passphrase
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Discover the wallets behind a seed phrase, backup, xpub or address
    Discover {
        /// Seed phrase, encrypted backup, account xpub or address (quote it)
        #[arg(short, long)]
        phrase: String,

        /// Prompt for a BIP39 passphrase
        #[arg(long)]
        ask_passphrase: bool,

        /// Only scan account 0 of every wallet kind
        #[arg(long)]
        no_account_search: bool,

        /// Skip history probing and list the default wallets
        #[arg(long)]
        offline: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encrypted seed backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize configuration file with defaults
    Init {
        /// Network to initialize for (defaults to mainnet)
        #[arg(short, long)]
        network: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupAction {
    /// Encrypt a seed phrase with a password
    Encrypt {
        /// Seed phrase (quote it)
        #[arg(short, long)]
        phrase: String,

        /// Password protecting the backup
        #[arg(long)]
        password: String,
    },

    /// Decrypt a backup and print the seed phrase
    Decrypt {
        /// Hex-encoded backup
        #[arg(short, long)]
        backup: String,

        /// Password protecting the backup
        #[arg(long)]
        password: String,
    },
}

/// HD wallet kinds selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    /// BIP84 native segwit
    Segwit,
    /// BIP44 legacy
    Legacy,
    /// BIP86 taproot
    Taproot,
    /// BIP49 nested segwit
    SegwitP2sh,
}

impl From<KindArg> for WalletKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Segwit => WalletKind::SegwitBech32,
            KindArg::Legacy => WalletKind::LegacyP2pkh,
            KindArg::Taproot => WalletKind::Taproot,
            KindArg::SegwitP2sh => WalletKind::SegwitP2sh,
        }
    }
}
