//! Wallet discovery engine
//!
//! [`Discovery::start`] classifies and validates the input, then spawns the
//! orchestrator on the current Tokio runtime and hands back a [`Task`].
//!
//! ```ignore
//! let discovery = Discovery::new(config, Arc::new(prober));
//! let mut task = discovery.start(phrase, DiscoveryOptions::default())?;
//! while let Some(event) = task.next_event().await {
//!     // show progress, collect wallets, answer password requests
//! }
//! let result = task.finish().await?;
//! ```

pub mod events;
pub mod flow;
pub mod orchestrator;
pub mod task;

pub use events::{
    BranchFailure, BranchFailureReason, DiscoveryEvent, DiscoveryResult, DiscoveryState,
    PasswordRequest,
};
pub use flow::ImportFlow;
pub use orchestrator::{BACKUP_PASSWORD_TITLE, PASSPHRASE_TITLE};
pub use task::{DiscoveryListener, Task};

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bitcoin::{AddressProber, EsploraClient, EsploraProber};
use crate::config::DiscoveryConfig;
use crate::seed::input::{ImportInput, InputError};
use crate::seed::mnemonic::{MnemonicError, SeedPhrase};
use crate::types::WalletTemplate;
use orchestrator::{Orchestrator, RunSettings, Source};

/// Errors that end a run without a result
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(#[from] MnemonicError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Input belongs to another network: {0}")]
    NetworkMismatch(String),

    #[error("Password request declined")]
    PasswordDeclined,

    #[error("Backup decryption failed: {0}")]
    BackupDecryption(String),

    #[error("Discovery task aborted: {0}")]
    TaskAborted(String),
}

impl From<InputError> for DiscoveryError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Empty => DiscoveryError::InvalidMnemonic(MnemonicError::WordCount(0)),
            InputError::NetworkMismatch(..) => DiscoveryError::NetworkMismatch(err.to_string()),
            InputError::InvalidExtendedKey(_) => DiscoveryError::InvalidInput(err.to_string()),
        }
    }
}

/// Per-run options
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Ask for a BIP39 passphrase before scanning the HD kinds
    pub ask_passphrase: bool,

    /// Keep scanning later accounts while accounts have history
    pub search_accounts: bool,

    /// Skip probing and offer the account-0 wallet of every kind
    pub offline: bool,

    /// Replaces the default template table when set
    pub templates: Option<Vec<WalletTemplate>>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            ask_passphrase: false,
            search_accounts: true,
            offline: false,
            templates: None,
        }
    }
}

impl DiscoveryOptions {
    fn template_table(&self) -> Vec<WalletTemplate> {
        self.templates
            .clone()
            .unwrap_or_else(|| WalletTemplate::default_table(self.ask_passphrase))
    }
}

/// Entry point that starts discovery runs
#[derive(Clone)]
pub struct Discovery {
    config: DiscoveryConfig,
    prober: Arc<dyn AddressProber>,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig, prober: Arc<dyn AddressProber>) -> Self {
        Self { config, prober }
    }

    /// Discovery probing the configured Esplora server
    pub fn with_esplora(config: DiscoveryConfig) -> Self {
        let client = EsploraClient::with_timeout(
            &config.bitcoin.esplora_url,
            config.bitcoin.network,
            config.scan.probe_timeout(),
        );
        Self::new(config, Arc::new(EsploraProber::new(client)))
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Start a run in the background and return its handle immediately
    ///
    /// Seed phrases are validated before anything is spawned, so an invalid
    /// phrase fails here without emitting a single event. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self, input: &str, options: DiscoveryOptions) -> Result<Task, DiscoveryError> {
        let network = self.config.bitcoin.network;
        let classified = ImportInput::classify(input, network)?;
        log::debug!("Import input classified as {}", classified.describe());

        let source = match classified {
            ImportInput::Mnemonic(words) => Source::Phrase(SeedPhrase::parse(&words)?),
            ImportInput::EncryptedBackup(backup) => Source::EncryptedBackup(backup),
            ImportInput::ExtendedPublicKey { xpub, script } => {
                Source::ExtendedPublicKey { xpub, script }
            }
            ImportInput::Address(address) => Source::Address(address),
        };

        let settings = RunSettings {
            network,
            scan: self.config.scan.clone(),
            templates: options.template_table(),
            search_accounts: options.search_accounts,
            offline: options.offline,
        };

        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::channel(self.config.scan.event_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(DiscoveryState::Idle);
        let cancel = CancellationToken::new();

        let orchestrator = Orchestrator::new(
            id,
            settings,
            Arc::clone(&self.prober),
            event_tx,
            state_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(orchestrator.run(source));

        Ok(Task::new(id, event_rx, state_rx, cancel, handle))
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
