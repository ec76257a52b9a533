//! Caller-facing handle of a running discovery

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use super::events::{DiscoveryEvent, DiscoveryResult, DiscoveryState};
use super::DiscoveryError;
use crate::types::DiscoveredWallet;

/// Callback-style consumer of discovery events
///
/// Used with [`Task::run_with`] by callers that prefer callbacks over
/// pulling events from the task.
#[async_trait]
pub trait DiscoveryListener: Send + Sync {
    fn on_progress(&self, _text: &str) {}

    fn on_wallet(&self, wallet: &DiscoveredWallet);

    /// Return `None` to decline
    async fn on_password_request(&self, title: &str, prompt: &str) -> Option<String>;
}

/// Handle of one background discovery run
///
/// Dropping the handle cancels the run.
pub struct Task {
    id: Uuid,
    events: mpsc::Receiver<DiscoveryEvent>,
    state: watch::Receiver<DiscoveryState>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<DiscoveryResult, DiscoveryError>>,
    guard: DropGuard,
}

impl Task {
    pub(crate) fn new(
        id: Uuid,
        events: mpsc::Receiver<DiscoveryEvent>,
        state: watch::Receiver<DiscoveryState>,
        cancel: CancellationToken,
        handle: JoinHandle<Result<DiscoveryResult, DiscoveryError>>,
    ) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            id,
            events,
            state,
            cancel,
            handle,
            guard,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cooperative cancellation; calling it again is harmless
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() && !self.state().is_terminal() {
            log::info!("Cancelling discovery {}", self.id);
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this run, for callers that outlive the handle
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> DiscoveryState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn state_watcher(&self) -> watch::Receiver<DiscoveryState> {
        self.state.clone()
    }

    /// Next event, or `None` once the run has stopped emitting
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        self.events.recv().await
    }

    /// Wait for the terminal result
    ///
    /// Events not yet consumed are discarded and later password requests
    /// are declined. The run keeps going unless cancelled.
    pub async fn finish(self) -> Result<DiscoveryResult, DiscoveryError> {
        let Task {
            id,
            events,
            handle,
            guard,
            ..
        } = self;
        drop(events);

        let joined = handle.await;
        // disarm only after the run has resolved; dropping this future early still cancels
        drop(guard.disarm());

        joined.map_err(|e| {
            log::error!("Discovery {} aborted: {}", id, e);
            DiscoveryError::TaskAborted(e.to_string())
        })?
    }

    /// Pump every event into `listener`, then return the result
    ///
    /// A pending password callback is abandoned (and the request declined)
    /// once the run is cancelled.
    pub async fn run_with<L>(mut self, listener: &L) -> Result<DiscoveryResult, DiscoveryError>
    where
        L: DiscoveryListener + ?Sized,
    {
        while let Some(event) = self.events.recv().await {
            match event {
                DiscoveryEvent::Progress(text) => listener.on_progress(&text),
                DiscoveryEvent::Wallet(wallet) => listener.on_wallet(&wallet),
                DiscoveryEvent::PasswordRequest(request) => {
                    // a listener that never answers must not outlive a cancel
                    let answer = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => None,
                        answer = listener.on_password_request(request.title(), request.prompt()) => answer,
                    };
                    match answer {
                        Some(secret) => request.answer(secret),
                        None => request.decline(),
                    }
                }
            }
        }
        self.finish().await
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
