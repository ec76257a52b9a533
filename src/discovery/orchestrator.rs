//! Discovery state machine
//!
//! Runs on its own Tokio task. Walks the wallet template table in order,
//! scans each kind account by account, and streams events to the task
//! handle. Cancellation is observed before every batch, while waiting for a
//! password, during retry backoff and while delivering events.

use std::collections::HashSet;
use std::sync::Arc;

use bitcoin::bip32::Xpub;
use bitcoin::Address;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::events::{
    BranchFailure, BranchFailureReason, DiscoveryEvent, DiscoveryResult, DiscoveryState,
    PasswordRequest,
};
use super::DiscoveryError;
use crate::bitcoin::{AddressProber, HistorySummary, ProbeError};
use crate::config::{NetworkType, ScanConfig};
use crate::seed::backup::{decrypt_mnemonic, BackupError};
use crate::seed::derivation::{AccountKeys, DerivationError, Seed, EXTERNAL_CHAIN};
use crate::seed::mnemonic::SeedPhrase;
use crate::types::{DiscoveredWallet, ScriptKind, WalletId, WalletKind, WalletTemplate};

pub const BACKUP_PASSWORD_TITLE: &str = "Encrypted backup";
pub const PASSPHRASE_TITLE: &str = "BIP39 passphrase";

/// What a run starts from, after classification and validation
pub(crate) enum Source {
    Phrase(SeedPhrase),
    EncryptedBackup(String),
    ExtendedPublicKey { xpub: Xpub, script: ScriptKind },
    Address(Address),
}

/// Why a run stopped early
enum Halt {
    Cancelled,
    Failed(DiscoveryError),
}

/// Outcome of a probe after retries
enum ProbeOutcome {
    Summary(HistorySummary),
    Exhausted { attempts: u32, last_error: ProbeError },
}

/// Receive-chain scan of one account
enum AccountScan {
    /// Windows probed until one came back empty
    Complete(HistorySummary),
    /// History seen, then a later window failed
    Partial(HistorySummary),
    Failed,
}

/// Passphrase negotiation state, shared by all templates of a run
enum Passphrase {
    NotAsked,
    Accepted(Seed),
    Declined,
}

/// Per-run settings copied out of the discovery options
pub(crate) struct RunSettings {
    pub network: NetworkType,
    pub scan: ScanConfig,
    pub templates: Vec<WalletTemplate>,
    pub search_accounts: bool,
    pub offline: bool,
}

pub(crate) struct Orchestrator {
    id: Uuid,
    settings: RunSettings,
    prober: Arc<dyn AddressProber>,
    events: mpsc::Sender<DiscoveryEvent>,
    state: watch::Sender<DiscoveryState>,
    cancel: CancellationToken,
    emitted: HashSet<WalletId>,
    wallets: Vec<DiscoveredWallet>,
    failures: Vec<BranchFailure>,
    started_at: DateTime<Utc>,
}

/// BIP39 seed stretching (PBKDF2, 2048 rounds) on the blocking pool
async fn stretch(phrase: &Arc<SeedPhrase>, passphrase: Zeroizing<String>) -> Result<Seed, Halt> {
    let phrase = Arc::clone(phrase);
    tokio::task::spawn_blocking(move || Seed::from_phrase(&phrase, &passphrase))
        .await
        .map_err(|e| Halt::Failed(DiscoveryError::TaskAborted(e.to_string())))
}

impl Orchestrator {
    pub(crate) fn new(
        id: Uuid,
        settings: RunSettings,
        prober: Arc<dyn AddressProber>,
        events: mpsc::Sender<DiscoveryEvent>,
        state: watch::Sender<DiscoveryState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            settings,
            prober,
            events,
            state,
            cancel,
            emitted: HashSet::new(),
            wallets: Vec::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Drive the run to its terminal state
    pub(crate) async fn run(mut self, source: Source) -> Result<DiscoveryResult, DiscoveryError> {
        log::info!("Discovery {} started on {}", self.id, self.settings.network);

        let outcome = match source {
            Source::Phrase(phrase) => self.scan_seed(phrase).await,
            Source::EncryptedBackup(backup) => match self.unlock_backup(&backup).await {
                Ok(phrase) => self.scan_seed(phrase).await,
                Err(halt) => Err(halt),
            },
            Source::ExtendedPublicKey { xpub, script } => {
                let keys = AccountKeys::from_xpub(xpub, script, self.settings.network);
                self.set_state(DiscoveryState::Scanning);
                self.scan_watch_only_xpub(&keys).await
            }
            Source::Address(address) => {
                self.set_state(DiscoveryState::Scanning);
                self.scan_watch_only_address(&address).await
            }
        };

        match outcome {
            Ok(()) => Ok(self.into_result(false)),
            Err(Halt::Cancelled) => Ok(self.into_result(true)),
            Err(Halt::Failed(err)) => {
                log::warn!("Discovery {} failed: {}", self.id, err);
                self.set_state(DiscoveryState::Failed);
                Err(err)
            }
        }
    }

    /// Ask for the backup password and decrypt the phrase
    async fn unlock_backup(&mut self, backup: &str) -> Result<SeedPhrase, Halt> {
        self.set_state(DiscoveryState::AwaitingPassphrase);
        let password = self
            .request_secret(BACKUP_PASSWORD_TITLE, "Enter the password used to encrypt this backup")
            .await?
            .ok_or(Halt::Failed(DiscoveryError::PasswordDeclined))?;

        self.set_state(DiscoveryState::Validating);
        let backup = backup.to_string();
        // PBKDF2 with 600k rounds, kept off the async workers
        let decrypted = tokio::task::spawn_blocking(move || decrypt_mnemonic(&backup, &password))
            .await
            .map_err(|e| Halt::Failed(DiscoveryError::TaskAborted(e.to_string())))?;

        match decrypted {
            Ok(phrase) => Ok(phrase),
            Err(BackupError::Mnemonic(err)) => Err(Halt::Failed(DiscoveryError::InvalidMnemonic(err))),
            Err(err) => Err(Halt::Failed(DiscoveryError::BackupDecryption(err.to_string()))),
        }
    }

    async fn scan_seed(&mut self, phrase: SeedPhrase) -> Result<(), Halt> {
        self.set_state(DiscoveryState::Validating);
        let phrase = Arc::new(phrase);
        let plain_seed = stretch(&phrase, Zeroizing::new(String::new())).await?;

        let templates = self.settings.templates.clone();
        let mut passphrase = Passphrase::NotAsked;

        for template in templates {
            self.check_cancelled()?;

            if template.requires_passphrase && matches!(passphrase, Passphrase::NotAsked) {
                self.set_state(DiscoveryState::AwaitingPassphrase);
                let answer = self
                    .request_secret(
                        PASSPHRASE_TITLE,
                        "Enter the passphrase protecting this seed, if any",
                    )
                    .await?;
                passphrase = match answer {
                    Some(secret) => Passphrase::Accepted(stretch(&phrase, secret).await?),
                    None => Passphrase::Declined,
                };
            }

            let seed = if template.requires_passphrase {
                match &passphrase {
                    Passphrase::Accepted(seed) => seed,
                    _ => {
                        log::info!("Skipping {}: passphrase declined", template.kind);
                        self.record_failure(template.kind, 0, BranchFailureReason::PassphraseDeclined);
                        continue;
                    }
                }
            } else {
                &plain_seed
            };

            self.set_state(DiscoveryState::Scanning);
            self.scan_kind(seed, template.kind).await?;
        }

        Ok(())
    }

    /// Scan one HD kind account by account
    async fn scan_kind(&mut self, seed: &Seed, kind: WalletKind) -> Result<(), Halt> {
        for account in 0..self.settings.scan.max_accounts {
            self.check_cancelled()?;

            let keys = match AccountKeys::derive(seed, kind, self.settings.network, account) {
                Ok(keys) => keys,
                Err(err) => {
                    self.record_derivation_failure(kind, account, err);
                    return Ok(());
                }
            };

            if self.settings.offline {
                return self.emit_account(&keys, HistorySummary::default()).await;
            }

            self.progress(format!("Scanning {} account {}", kind, account));
            let (summary, complete) = match self.probe_account(&keys).await? {
                AccountScan::Complete(summary) => (summary, true),
                AccountScan::Partial(summary) => (summary, false),
                AccountScan::Failed => return Ok(()),
            };

            if summary.has_transactions {
                self.emit_account(&keys, summary).await?;
                if !complete || !self.settings.search_accounts {
                    return Ok(());
                }
            } else {
                // an empty first account is still offered so a fresh seed stays importable
                if account == 0 {
                    self.emit_account(&keys, summary).await?;
                }
                return Ok(());
            }
        }

        log::debug!("{}: reached the account limit", kind);
        Ok(())
    }

    async fn scan_watch_only_xpub(&mut self, keys: &AccountKeys) -> Result<(), Halt> {
        self.check_cancelled()?;
        if self.settings.offline {
            return self.emit_account(keys, HistorySummary::default()).await;
        }

        self.progress(format!("Scanning {}", keys.kind()));
        match self.probe_account(keys).await? {
            AccountScan::Complete(summary) | AccountScan::Partial(summary) => {
                self.emit_account(keys, summary).await
            }
            AccountScan::Failed => Ok(()),
        }
    }

    async fn scan_watch_only_address(&mut self, address: &Address) -> Result<(), Halt> {
        self.check_cancelled()?;
        let network = self.settings.network;
        if self.settings.offline {
            return self.emit(DiscoveredWallet::from_address(address, network, false)).await;
        }

        self.progress(format!("Scanning address {}", address));
        match self.probe_with_retry(std::slice::from_ref(address)).await? {
            ProbeOutcome::Summary(summary) => {
                let wallet = DiscoveredWallet::from_address(address, network, summary.has_transactions);
                self.emit(wallet).await
            }
            ProbeOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                self.record_failure(
                    WalletKind::WatchOnlyAddress,
                    0,
                    BranchFailureReason::Network {
                        attempts,
                        last_error,
                    },
                );
                Ok(())
            }
        }
    }

    /// Probe the receive chain of an account in gap-limit windows
    ///
    /// Each window starts one past the last used address seen so far; the
    /// scan ends at the first window without history. Failures are recorded.
    async fn probe_account(&mut self, keys: &AccountKeys) -> Result<AccountScan, Halt> {
        let kind = keys.kind();
        let account = keys.account();
        let gap_limit = self.settings.scan.gap_limit;
        let mut found = HistorySummary::default();
        let mut start: u32 = 0;

        let interrupted = |found: HistorySummary| {
            if found.has_transactions {
                AccountScan::Partial(found)
            } else {
                AccountScan::Failed
            }
        };

        loop {
            let end = start.saturating_add(gap_limit);
            let addresses = match keys.addresses(EXTERNAL_CHAIN, start..end) {
                Ok(addresses) => addresses,
                Err(err) => {
                    self.record_derivation_failure(kind, account, err);
                    return Ok(interrupted(found));
                }
            };

            if start > 0 {
                self.progress(format!("Scanning {} account {} from index {}", kind, account, start));
            }

            match self.probe_with_retry(&addresses).await? {
                ProbeOutcome::Summary(window) if !window.has_transactions => {
                    return Ok(AccountScan::Complete(found));
                }
                ProbeOutcome::Summary(window) => {
                    found = HistorySummary {
                        has_transactions: true,
                        next_unused_index: start + window.next_unused_index,
                    };
                    start = found.next_unused_index;
                }
                ProbeOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    log::warn!(
                        "{} account {}: giving up after {} attempts: {}",
                        kind,
                        account,
                        attempts,
                        last_error
                    );
                    self.record_failure(
                        kind,
                        account,
                        BranchFailureReason::Network {
                            attempts,
                            last_error,
                        },
                    );
                    return Ok(interrupted(found));
                }
            }
        }
    }

    /// Call the prober with a timeout, retrying with exponential backoff
    async fn probe_with_retry(&self, addresses: &[Address]) -> Result<ProbeOutcome, Halt> {
        let scan = &self.settings.scan;
        let mut attempt: u32 = 0;

        loop {
            let result = match tokio::time::timeout(scan.probe_timeout(), self.prober.probe(addresses)).await {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout),
            };

            // results that land after a cancel are discarded
            self.check_cancelled()?;

            let err = match result {
                Ok(summary) => return Ok(ProbeOutcome::Summary(summary)),
                Err(err) => err,
            };

            attempt += 1;
            if attempt > scan.max_retries {
                return Ok(ProbeOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }

            let delay = scan.retry_backoff(attempt - 1);
            log::debug!("Probe attempt {} failed ({}), retrying in {:?}", attempt, err, delay);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Send a password request and wait for the answer or a cancel
    async fn request_secret(
        &self,
        title: &str,
        prompt: &str,
    ) -> Result<Option<Zeroizing<String>>, Halt> {
        self.check_cancelled()?;
        let (request, reply) = PasswordRequest::new(title, prompt);
        self.deliver(DiscoveryEvent::PasswordRequest(request)).await?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            // a dropped request counts as declined
            answer = reply => Ok(answer.ok().flatten()),
        }
    }

    async fn emit_account(&mut self, keys: &AccountKeys, summary: HistorySummary) -> Result<(), Halt> {
        match DiscoveredWallet::from_account(keys, summary.has_transactions, summary.next_unused_index) {
            Ok(wallet) => self.emit(wallet).await,
            Err(err) => {
                self.record_derivation_failure(keys.kind(), keys.account(), err);
                Ok(())
            }
        }
    }

    /// Deliver a wallet unless its id was already emitted in this run
    async fn emit(&mut self, wallet: DiscoveredWallet) -> Result<(), Halt> {
        if !self.emitted.insert(wallet.id.clone()) {
            log::debug!("Suppressing duplicate wallet {}", wallet.id);
            return Ok(());
        }

        log::info!(
            "Found {} account {} (history: {})",
            wallet.kind,
            wallet.account,
            wallet.has_history
        );
        self.deliver(DiscoveryEvent::Wallet(wallet.clone())).await?;
        self.wallets.push(wallet);
        Ok(())
    }

    /// Deliver an event that must not be dropped
    ///
    /// Waits for buffer space; a gone receiver is not an error.
    async fn deliver(&self, event: DiscoveryEvent) -> Result<(), Halt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            sent = self.events.send(event) => {
                if sent.is_err() {
                    log::debug!("Discovery {}: event receiver dropped", self.id);
                }
                Ok(())
            }
        }
    }

    /// Best-effort progress line
    fn progress(&self, text: String) {
        log::debug!("{}", text);
        if let Err(mpsc::error::TrySendError::Full(_)) = self.events.try_send(DiscoveryEvent::Progress(text)) {
            log::trace!("Progress dropped: event buffer full");
        }
    }

    fn check_cancelled(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: DiscoveryState) {
        self.state.send_replace(state);
    }

    fn record_derivation_failure(&mut self, kind: WalletKind, account: u32, err: DerivationError) {
        log::error!("{} account {}: derivation failed: {}", kind, account, err);
        self.record_failure(
            kind,
            account,
            BranchFailureReason::Derivation {
                message: err.to_string(),
            },
        );
    }

    fn record_failure(&mut self, kind: WalletKind, account: u32, reason: BranchFailureReason) {
        self.failures.push(BranchFailure {
            kind,
            account,
            reason,
        });
    }

    fn into_result(self, cancelled: bool) -> DiscoveryResult {
        let state = if cancelled {
            DiscoveryState::Cancelled
        } else {
            DiscoveryState::Completed
        };
        self.set_state(state);

        log::info!(
            "Discovery {} {}: {} wallets, {} failed branches",
            self.id,
            if cancelled { "cancelled" } else { "completed" },
            self.wallets.len(),
            self.failures.len()
        );

        DiscoveryResult {
            cancelled,
            wallets: self.wallets,
            failures: self.failures,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
