//! Esplora access for address history lookups

use crate::config::NetworkType;
use bdk_esplora::esplora_client::{self, BlockingClient};
use bitcoin::Address;
use std::time::Duration;

/// HTTP status Esplora servers answer with when throttling
const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Errors that can occur during network operations
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Esplora client error: {0}")]
    Esplora(esplora_client::Error),

    #[error("Rate limited by Esplora server")]
    RateLimited,

    #[error("Network request failed: {0}")]
    Request(String),
}

impl From<esplora_client::Error> for NetworkError {
    fn from(err: esplora_client::Error) -> Self {
        match err {
            esplora_client::Error::HttpResponse { status, .. } if status == HTTP_TOO_MANY_REQUESTS => {
                NetworkError::RateLimited
            }
            other => NetworkError::Esplora(other),
        }
    }
}

/// Usage of a batch of addresses, by position in the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
    /// At least one address in the batch has a transaction
    pub has_transactions: bool,

    /// One past the last used position (0 when nothing is used)
    pub next_unused_index: u32,
}

impl HistorySummary {
    /// Summarize per-address usage flags
    pub fn from_usage(used: &[bool]) -> Self {
        let next_unused_index = used
            .iter()
            .rposition(|used| *used)
            .map(|position| position as u32 + 1)
            .unwrap_or(0);
        Self {
            has_transactions: next_unused_index > 0,
            next_unused_index,
        }
    }
}

/// Esplora client wrapper for address history queries
///
/// Blocking interface; callers on the async side go through
/// [`EsploraProber`](super::prober::EsploraProber).
pub struct EsploraClient {
    /// Underlying Esplora blocking client
    client: BlockingClient,

    /// Network type
    network: NetworkType,

    /// Esplora server URL
    url: String,
}

impl EsploraClient {
    /// Create a new Esplora client with custom URL
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = EsploraClient::new("https://mempool.space/api", NetworkType::Mainnet);
    /// ```
    pub fn new(url: &str, network: NetworkType) -> Self {
        let builder = esplora_client::Builder::new(url);
        Self {
            client: BlockingClient::from_builder(builder),
            network,
            url: url.to_string(),
        }
    }

    /// Create a new Esplora client with a request timeout
    pub fn with_timeout(url: &str, network: NetworkType, timeout: Duration) -> Self {
        let builder = esplora_client::Builder::new(url).timeout(timeout.as_secs());
        Self {
            client: BlockingClient::from_builder(builder),
            network,
            url: url.to_string(),
        }
    }

    /// Get the network type
    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// Get the Esplora server URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether an address has ever appeared in a transaction
    pub fn address_used(&self, address: &Address) -> Result<bool, NetworkError> {
        let txs = self
            .client
            .scripthash_txs(&address.script_pubkey(), None)?;
        Ok(!txs.is_empty())
    }

    /// Query every address of a batch, in order
    ///
    /// Stops at the first failing request; a partially probed batch is
    /// never reported.
    pub fn history_summary(&self, addresses: &[Address]) -> Result<HistorySummary, NetworkError> {
        let mut used = Vec::with_capacity(addresses.len());
        for address in addresses {
            used.push(self.address_used(address)?);
        }

        let summary = HistorySummary::from_usage(&used);
        log::debug!(
            "Probed {} addresses on {}: used={}, next_unused={}",
            addresses.len(),
            self.network,
            summary.has_transactions,
            summary.next_unused_index
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for EsploraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsploraClient")
            .field("network", &self.network)
            .field("url", &self.url)
            .finish()
    }
}
