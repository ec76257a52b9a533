//! Cooperative cancellation and task lifecycle

use crate::common::{drain, receive_address, test_config, MockProber, TEST_PHRASE};
use std::sync::Arc;
use std::time::Duration;
use vault_seed_discovery::discovery::{Discovery, DiscoveryEvent, DiscoveryOptions, DiscoveryState};
use vault_seed_discovery::types::WalletKind;

#[tokio::test(start_paused = true)]
async fn test_cancel_right_after_start_resolves_as_cancelled() {
    let prober = Arc::new(MockProber::hanging());
    let discovery = Discovery::new(test_config(), prober.clone());

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    task.cancel();

    let result = tokio::time::timeout(Duration::from_secs(10), task.finish())
        .await
        .expect("A cancelled task must resolve")
        .expect("Cancellation is not an error");

    assert!(result.cancelled);
    assert!(result.wallets.is_empty());
    assert_eq!(prober.calls(), 0, "No batch starts after a cancel");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_a_silent_probe_resolves_within_the_probe_timeout() {
    let prober = Arc::new(MockProber::hanging());
    let discovery = Discovery::new(test_config(), prober.clone());

    let mut task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");

    // The progress line is sent right before the first batch
    match task.next_event().await {
        Some(DiscoveryEvent::Progress(_)) => {}
        other => panic!("Expected a progress event, got {:?}", other),
    }
    task.cancel();

    let timeout = test_config().scan.probe_timeout() + Duration::from_secs(1);
    let result = tokio::time::timeout(timeout, task.finish())
        .await
        .expect("Task should resolve once the in-flight probe times out")
        .expect("Cancellation is not an error");

    assert!(result.cancelled);
    assert!(result.wallets.is_empty());
    assert!(result.failures.is_empty(), "The discarded batch is not a failure");
    assert!(prober.calls() <= 1, "Nothing is retried after a cancel");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_scan_keeps_already_emitted_wallets() {
    let prober = Arc::new(
        MockProber::empty()
            .with_used([receive_address(WalletKind::SegwitBech32, 0, 0)])
            .with_delay(Duration::from_millis(100)),
    );
    let discovery = Discovery::new(test_config(), prober);

    let mut task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");

    let first_wallet = loop {
        match task.next_event().await {
            Some(DiscoveryEvent::Wallet(wallet)) => break wallet,
            Some(_) => continue,
            None => panic!("Run ended before emitting a wallet"),
        }
    };
    task.cancel();
    task.cancel();

    let result = task.finish().await.expect("Cancellation is not an error");
    assert!(result.cancelled);
    assert_eq!(result.wallets.first(), Some(&first_wallet));
    assert!(
        result.wallets.len() < 4,
        "Kinds after the cancel point are not scanned"
    );
}

#[tokio::test]
async fn test_dropping_the_task_cancels_the_run() {
    let discovery = Discovery::new(test_config(), Arc::new(MockProber::hanging()));

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let token = task.cancel_token();
    drop(task);

    assert!(token.is_cancelled(), "Dropping the handle should cancel");
}

#[tokio::test]
async fn test_finish_without_reading_events_still_completes() {
    let mut config = test_config();
    config.scan.event_buffer = 1;
    let discovery = Discovery::new(config, Arc::new(MockProber::empty()));

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    assert!(!task.is_cancelled());

    let result = task.finish().await.expect("Run should complete");
    assert!(!result.cancelled);
    assert_eq!(result.wallets.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_reports_cancelled_state() {
    let discovery = Discovery::new(test_config(), Arc::new(MockProber::hanging()));

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let watcher = task.state_watcher();
    task.cancel();
    let (_, result) = drain(task, None).await;

    assert!(result.expect("Cancellation is not an error").cancelled);
    assert_eq!(*watcher.borrow(), DiscoveryState::Cancelled);
}
