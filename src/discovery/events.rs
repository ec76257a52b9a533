//! Events, states and results of a discovery run

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use zeroize::Zeroizing;

use crate::bitcoin::ProbeError;
use crate::types::{DiscoveredWallet, WalletKind};

/// Event delivered to the caller while a run is in progress
#[derive(Debug)]
pub enum DiscoveryEvent {
    /// Short status line; may be dropped under load
    Progress(String),

    /// A wallet was found (or offered as the default account-0 candidate)
    Wallet(DiscoveredWallet),

    /// The run needs a secret from the user
    PasswordRequest(PasswordRequest),
}

/// Pending request for a password or BIP39 passphrase
///
/// Answer with [`answer`](Self::answer) or refuse with
/// [`decline`](Self::decline). Dropping the request declines it.
pub struct PasswordRequest {
    title: String,
    prompt: String,
    reply: oneshot::Sender<Option<Zeroizing<String>>>,
}

impl PasswordRequest {
    pub(crate) fn new(
        title: impl Into<String>,
        prompt: impl Into<String>,
    ) -> (Self, oneshot::Receiver<Option<Zeroizing<String>>>) {
        let (reply, receiver) = oneshot::channel();
        let request = Self {
            title: title.into(),
            prompt: prompt.into(),
            reply,
        };
        (request, receiver)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Supply the secret
    pub fn answer(self, secret: impl Into<String>) {
        // the run may already be gone
        let _ = self.reply.send(Some(Zeroizing::new(secret.into())));
    }

    /// Refuse the request; the affected branch is skipped
    pub fn decline(self) {
        let _ = self.reply.send(None);
    }
}

impl std::fmt::Debug for PasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordRequest")
            .field("title", &self.title)
            .field("prompt", &self.prompt)
            .finish()
    }
}

/// Lifecycle of a discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    Idle,
    Validating,
    AwaitingPassphrase,
    Scanning,
    Completed,
    Cancelled,
    Failed,
}

impl DiscoveryState {
    /// Completed, cancelled or failed
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DiscoveryState::Completed | DiscoveryState::Cancelled | DiscoveryState::Failed
        )
    }
}

/// Why a wallet kind's branch was abandoned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BranchFailureReason {
    /// Prober kept failing after every retry
    Network { attempts: u32, last_error: ProbeError },

    /// Key derivation failed for the branch
    Derivation { message: String },

    /// The user declined the passphrase request
    PassphraseDeclined,
}

/// A wallet kind that could not be scanned to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub kind: WalletKind,

    /// Account being scanned when the branch stopped
    pub account: u32,

    pub reason: BranchFailureReason,
}

impl std::fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            BranchFailureReason::Network {
                attempts,
                last_error,
            } => write!(
                f,
                "{} account {}: gave up after {} attempts ({})",
                self.kind, self.account, attempts, last_error
            ),
            BranchFailureReason::Derivation { message } => {
                write!(f, "{} account {}: derivation failed ({})", self.kind, self.account, message)
            }
            BranchFailureReason::PassphraseDeclined => {
                write!(f, "{}: passphrase declined", self.kind)
            }
        }
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResult {
    pub cancelled: bool,

    /// Wallets in emission order, unique by id
    pub wallets: Vec<DiscoveredWallet>,

    pub failures: Vec<BranchFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DiscoveryResult {
    /// True when at least one emitted wallet has on-chain history
    pub fn found_history(&self) -> bool {
        self.wallets.iter().any(|wallet| wallet.has_history)
    }

    /// Wallets of one kind, in account order
    pub fn wallets_of(&self, kind: WalletKind) -> impl Iterator<Item = &DiscoveredWallet> {
        self.wallets.iter().filter(move |wallet| wallet.kind == kind)
    }
}
