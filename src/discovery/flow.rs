//! One active discovery per import flow

use tokio_util::sync::CancellationToken;

use super::task::Task;
use super::{Discovery, DiscoveryError, DiscoveryOptions};

/// Import flow that owns at most one running discovery
///
/// Starting again (for example when the user retries) cancels the run
/// started before it.
#[derive(Debug)]
pub struct ImportFlow {
    discovery: Discovery,
    current: Option<CancellationToken>,
}

impl ImportFlow {
    pub fn new(discovery: Discovery) -> Self {
        Self {
            discovery,
            current: None,
        }
    }

    /// Cancel the previous run of this flow, then start a new one
    pub fn start(&mut self, input: &str, options: DiscoveryOptions) -> Result<Task, DiscoveryError> {
        self.cancel_current();
        let task = self.discovery.start(input, options)?;
        self.current = Some(task.cancel_token());
        Ok(task)
    }

    /// Cancel the run started last, if any
    pub fn cancel_current(&mut self) {
        if let Some(token) = self.current.take() {
            if !token.is_cancelled() {
                log::info!("Cancelling previous discovery of this import flow");
            }
            token.cancel();
        }
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }
}

impl Drop for ImportFlow {
    fn drop(&mut self) {
        self.cancel_current();
    }
}
