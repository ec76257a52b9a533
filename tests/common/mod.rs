//! Common test utilities for the discovery engine tests
//!
//! This module provides shared test infrastructure including:
//! - A scriptable in-memory address prober that counts its calls
//! - Known-answer phrases and address helpers
//! - Event draining helpers that answer or decline password requests

#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::Address;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vault_seed_discovery::bitcoin::{AddressProber, HistorySummary, ProbeError};
use vault_seed_discovery::config::{DiscoveryConfig, NetworkType};
use vault_seed_discovery::discovery::{DiscoveryEvent, DiscoveryResult, Task};
use vault_seed_discovery::seed::{AccountKeys, Seed, SeedPhrase};
use vault_seed_discovery::types::{DiscoveredWallet, WalletKind};
use vault_seed_discovery::DiscoveryError;

/// BIP39 test vector used by BIP44/49/84/86
pub const TEST_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Another valid 12-word phrase (BIP39 test vector)
pub const OTHER_PHRASE: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

/// Gap limit used by the discovery tests
pub const TEST_GAP_LIMIT: u32 = 5;

/// Mainnet config tuned for tests: small gap limit, short backoff
pub fn test_config() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::for_network(NetworkType::Mainnet);
    config.scan.gap_limit = TEST_GAP_LIMIT;
    config.scan.max_accounts = 10;
    config.scan.probe_timeout_secs = 2;
    config.scan.max_retries = 3;
    config.scan.retry_backoff_ms = 10;
    config.scan.event_buffer = 16;
    config
}

/// Account keys of `kind` for a phrase and passphrase on mainnet
pub fn account_keys(phrase: &str, passphrase: &str, kind: WalletKind, account: u32) -> AccountKeys {
    let phrase = SeedPhrase::parse(phrase).expect("Test phrase should be valid");
    let seed = Seed::from_phrase(&phrase, passphrase);
    AccountKeys::derive(&seed, kind, NetworkType::Mainnet, account)
        .expect("Failed to derive test account")
}

/// Receive address `index` of `kind`/`account` for the test phrase
pub fn receive_address(kind: WalletKind, account: u32, index: u32) -> String {
    account_keys(TEST_PHRASE, "", kind, account)
        .address(0, index)
        .expect("Failed to derive test address")
        .to_string()
}

/// In-memory prober driven by a set of used addresses
///
/// Failures can be scripted per address (every batch containing one of
/// them fails) or for the first N calls. A hanging prober never answers.
pub struct MockProber {
    used: HashSet<String>,
    failing: HashSet<String>,
    error: ProbeError,
    transient_failures: AtomicU32,
    hang: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MockProber {
    /// Prober that reports no history for anything
    pub fn empty() -> Self {
        Self {
            used: HashSet::new(),
            failing: HashSet::new(),
            error: ProbeError::Network("connection refused".to_string()),
            transient_failures: AtomicU32::new(0),
            hang: false,
            delay: None,
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Prober that never answers a call
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::empty()
        }
    }

    pub fn with_used<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.used.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn failing_on<I, S>(mut self, addresses: I, error: ProbeError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(addresses.into_iter().map(Into::into));
        self.error = error;
        self
    }

    pub fn with_transient_failures(self, count: u32, error: ProbeError) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        Self { error, ..self }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of probe calls so far, including failed ones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every batch received, in call order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().expect("batches lock poisoned").clone()
    }
}

#[async_trait]
impl AddressProber for MockProber {
    async fn probe(&self, addresses: &[Address]) -> Result<HistorySummary, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let batch: Vec<String> = addresses.iter().map(ToString::to_string).collect();
        self.batches
            .lock()
            .expect("batches lock poisoned")
            .push(batch.clone());

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if transient.is_ok() {
            return Err(self.error.clone());
        }
        if batch.iter().any(|address| self.failing.contains(address)) {
            return Err(self.error.clone());
        }

        let used: Vec<bool> = batch.iter().map(|address| self.used.contains(address)).collect();
        Ok(HistorySummary::from_usage(&used))
    }
}

/// Everything a run delivered, in order
#[derive(Debug, Default)]
pub struct Collected {
    pub wallets: Vec<DiscoveredWallet>,
    pub progress: Vec<String>,
    pub password_titles: Vec<String>,
}

/// Drain every event of a task, answering password requests with `answer`
/// (declining when `None`), then wait for the result
pub async fn drain(
    mut task: Task,
    answer: Option<&str>,
) -> (Collected, Result<DiscoveryResult, DiscoveryError>) {
    let mut collected = Collected::default();
    while let Some(event) = task.next_event().await {
        match event {
            DiscoveryEvent::Progress(text) => collected.progress.push(text),
            DiscoveryEvent::Wallet(wallet) => collected.wallets.push(wallet),
            DiscoveryEvent::PasswordRequest(request) => {
                collected.password_titles.push(request.title().to_string());
                match answer {
                    Some(secret) => request.answer(secret),
                    None => request.decline(),
                }
            }
        }
    }
    let result = task.finish().await;
    (collected, result)
}
