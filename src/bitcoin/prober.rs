//! Address history probing capability
//!
//! The discovery engine only sees [`AddressProber`]; the Esplora-backed
//! implementation runs the blocking client on Tokio's blocking pool.

use async_trait::async_trait;
use bitcoin::Address;
use serde::Serialize;
use std::sync::Arc;

use super::network::{EsploraClient, HistorySummary, NetworkError};

/// Probe failures; every variant is retryable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Probe timed out")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,
}

impl From<NetworkError> for ProbeError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::RateLimited => ProbeError::RateLimited,
            other => ProbeError::Network(other.to_string()),
        }
    }
}

/// Looks up whether a batch of addresses has on-chain history
#[async_trait]
pub trait AddressProber: Send + Sync {
    async fn probe(&self, addresses: &[Address]) -> Result<HistorySummary, ProbeError>;
}

/// Prober backed by an Esplora server
#[derive(Debug, Clone)]
pub struct EsploraProber {
    client: Arc<EsploraClient>,
}

impl EsploraProber {
    pub fn new(client: EsploraClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl AddressProber for EsploraProber {
    async fn probe(&self, addresses: &[Address]) -> Result<HistorySummary, ProbeError> {
        let client = Arc::clone(&self.client);
        let batch = addresses.to_vec();

        tokio::task::spawn_blocking(move || client.history_summary(&batch))
            .await
            .map_err(|e| ProbeError::Network(format!("Probe task failed: {}", e)))?
            .map_err(ProbeError::from)
    }
}
