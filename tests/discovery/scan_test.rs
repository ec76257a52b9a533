//! Account scanning: gap rule, default wallets, ordering, dedup, offline mode

use crate::common::{drain, receive_address, test_config, MockProber, TEST_PHRASE};
use std::sync::Arc;
use vault_seed_discovery::discovery::{Discovery, DiscoveryOptions, DiscoveryState};
use vault_seed_discovery::types::{WalletKind, WalletTemplate};
use vault_seed_discovery::DiscoveryError;

fn discovery_with(prober: Arc<MockProber>) -> Discovery {
    Discovery::new(test_config(), prober)
}

#[tokio::test]
async fn test_history_on_accounts_zero_and_one_emits_two_wallets_in_order() {
    let prober = Arc::new(MockProber::empty().with_used([
        receive_address(WalletKind::SegwitBech32, 0, 0),
        receive_address(WalletKind::SegwitBech32, 1, 3),
    ]));
    let discovery = discovery_with(prober.clone());

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let (collected, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    let segwit: Vec<_> = result.wallets_of(WalletKind::SegwitBech32).collect();
    assert_eq!(segwit.len(), 2, "Accounts 0 and 1 have history, account 2 is the gap");
    assert_eq!(segwit[0].account, 0, "Account 0 should be emitted first");
    assert_eq!(segwit[1].account, 1, "Account 1 should follow account 0");
    assert!(segwit.iter().all(|wallet| wallet.has_history));
    assert_eq!(segwit[0].next_unused_index, 1);
    assert_eq!(segwit[1].next_unused_index, 4);

    // segwit: two windows for accounts 0 and 1, one for account 2; every other kind: one
    assert_eq!(prober.calls(), 8, "Scanning should stop at the first empty account");
    assert!(!result.cancelled);
    assert!(result.failures.is_empty());
    assert_eq!(
        collected.wallets, result.wallets,
        "Result should list wallets in emission order"
    );
}

#[tokio::test]
async fn test_no_history_still_offers_one_default_wallet_per_kind() {
    let prober = Arc::new(MockProber::empty());
    let discovery = discovery_with(prober.clone());

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    let kinds: Vec<WalletKind> = result.wallets.iter().map(|wallet| wallet.kind).collect();
    assert_eq!(
        kinds,
        WalletKind::HD_PRIORITY.to_vec(),
        "One wallet per kind, in priority order"
    );
    for wallet in &result.wallets {
        assert_eq!(wallet.account, 0, "Default wallet should be account 0");
        assert!(!wallet.has_history);
        assert_eq!(wallet.next_unused_index, 0);
    }
    assert!(!result.cancelled);
    assert!(!result.found_history(), "A true negative reports no history");
    assert_eq!(prober.calls(), 4);
}

#[tokio::test]
async fn test_default_wallets_match_known_first_addresses() {
    let prober = Arc::new(MockProber::empty());
    let discovery = discovery_with(prober);

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    let first_addresses: Vec<&str> = result
        .wallets
        .iter()
        .map(|wallet| wallet.first_address.as_str())
        .collect();
    assert_eq!(
        first_addresses,
        vec![
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu",
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA",
            "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr",
            "37VucYSaXLCAsxYyAPfbSi9eh4iEcbShgf",
        ]
    );
    assert_eq!(
        result.wallets[0].derivation_path(),
        Some("m/84'/0'/0'"),
        "Segwit wallet should carry its account path"
    );
}

#[tokio::test]
async fn test_account_search_disabled_stops_after_first_account_with_history() {
    let prober = Arc::new(MockProber::empty().with_used([
        receive_address(WalletKind::SegwitBech32, 0, 0),
        receive_address(WalletKind::SegwitBech32, 1, 0),
    ]));
    let discovery = discovery_with(prober.clone());

    let options = DiscoveryOptions {
        search_accounts: false,
        ..DiscoveryOptions::default()
    };
    let task = discovery
        .start(TEST_PHRASE, options)
        .expect("Valid phrase should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert_eq!(result.wallets_of(WalletKind::SegwitBech32).count(), 1);
    // segwit account 0 takes a second, empty window; account 1 is never probed
    assert_eq!(prober.calls(), 5, "Only account 0 of each kind without account search");
}

#[tokio::test]
async fn test_history_beyond_gap_limit_is_not_seen() {
    // Index 5 is outside the first gap-limit batch (0..5)
    let prober = Arc::new(
        MockProber::empty().with_used([receive_address(WalletKind::SegwitBech32, 0, 5)]),
    );
    let discovery = discovery_with(prober);

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert!(!result.found_history());
}

#[tokio::test]
async fn test_offline_mode_never_probes_and_emits_defaults() {
    let prober = Arc::new(MockProber::empty().with_used([receive_address(
        WalletKind::SegwitBech32,
        0,
        0,
    )]));
    let discovery = discovery_with(prober.clone());

    let options = DiscoveryOptions {
        offline: true,
        ..DiscoveryOptions::default()
    };
    let task = discovery
        .start(TEST_PHRASE, options)
        .expect("Valid phrase should start a run");
    let (collected, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert_eq!(prober.calls(), 0, "Offline runs must not touch the prober");
    assert_eq!(result.wallets.len(), 4, "One default wallet per kind");
    assert!(result.wallets.iter().all(|wallet| !wallet.has_history && wallet.account == 0));
    assert!(collected.progress.is_empty(), "No batches, no progress lines");
}

#[tokio::test]
async fn test_duplicate_templates_emit_each_wallet_once() {
    let prober = Arc::new(MockProber::empty());
    let discovery = discovery_with(prober.clone());

    let options = DiscoveryOptions {
        templates: Some(vec![
            WalletTemplate::new(WalletKind::SegwitBech32, false),
            WalletTemplate::new(WalletKind::SegwitBech32, false),
        ]),
        ..DiscoveryOptions::default()
    };
    let task = discovery
        .start(TEST_PHRASE, options)
        .expect("Valid phrase should start a run");
    let (collected, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert_eq!(prober.calls(), 2, "Both templates are scanned");
    assert_eq!(collected.wallets.len(), 1, "The second emission is suppressed");
    assert_eq!(result.wallets.len(), 1);
}

#[tokio::test]
async fn test_invalid_phrase_is_rejected_before_any_event() {
    let prober = Arc::new(MockProber::empty());
    let discovery = discovery_with(prober.clone());

    let bad_checksum =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
    let err = discovery
        .start(bad_checksum, DiscoveryOptions::default())
        .expect_err("Checksum mismatch should be rejected");
    assert!(matches!(err, DiscoveryError::InvalidMnemonic(_)));

    let err = discovery
        .start("   ", DiscoveryOptions::default())
        .expect_err("Empty input should be rejected");
    assert!(matches!(err, DiscoveryError::InvalidMnemonic(_)));

    assert_eq!(prober.calls(), 0);
}

#[tokio::test]
async fn test_batches_cover_the_first_gap_limit_receive_addresses() {
    let prober = Arc::new(MockProber::empty());
    let discovery = discovery_with(prober.clone());

    let options = DiscoveryOptions {
        templates: Some(vec![WalletTemplate::new(WalletKind::SegwitBech32, false)]),
        ..DiscoveryOptions::default()
    };
    let task = discovery
        .start(TEST_PHRASE, options)
        .expect("Valid phrase should start a run");
    let (_, result) = drain(task, None).await;
    result.expect("Run should complete");

    let batches = prober.batches();
    assert_eq!(batches.len(), 1);
    let expected: Vec<String> = (0..5)
        .map(|index| receive_address(WalletKind::SegwitBech32, 0, index))
        .collect();
    assert_eq!(batches[0], expected);
}

#[tokio::test]
async fn test_state_reaches_completed_after_run() {
    let discovery = discovery_with(Arc::new(MockProber::empty()));

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let watcher = task.state_watcher();
    let (_, result) = drain(task, None).await;
    result.expect("Run should complete");

    assert_eq!(*watcher.borrow(), DiscoveryState::Completed);
    assert!(watcher.borrow().is_terminal());
}

#[tokio::test]
async fn test_state_passes_through_validating_before_scanning() {
    let discovery = discovery_with(Arc::new(MockProber::empty()));

    let task = discovery
        .start(TEST_PHRASE, DiscoveryOptions::default())
        .expect("Valid phrase should start a run");
    let mut watcher = task.state_watcher();
    assert_eq!(*watcher.borrow_and_update(), DiscoveryState::Idle);
    assert!(!DiscoveryState::Idle.is_terminal());

    watcher.changed().await.expect("Run should publish a state");
    assert_eq!(
        *watcher.borrow_and_update(),
        DiscoveryState::Validating,
        "Seed stretching is published as validating"
    );

    let (_, result) = drain(task, None).await;
    result.expect("Run should complete");
    assert_eq!(*watcher.borrow(), DiscoveryState::Completed);
}

#[tokio::test]
async fn test_history_past_the_first_window_moves_the_next_unused_index() {
    let used: Vec<String> = (0..=6)
        .map(|index| receive_address(WalletKind::SegwitBech32, 0, index))
        .collect();
    let prober = Arc::new(MockProber::empty().with_used(used));
    let discovery = discovery_with(prober.clone());

    let options = DiscoveryOptions {
        templates: Some(vec![WalletTemplate::new(WalletKind::SegwitBech32, false)]),
        search_accounts: false,
        ..DiscoveryOptions::default()
    };
    let task = discovery
        .start(TEST_PHRASE, options)
        .expect("Valid phrase should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert_eq!(result.wallets.len(), 1);
    assert!(result.wallets[0].has_history);
    assert_eq!(
        result.wallets[0].next_unused_index, 7,
        "Addresses 0 through 6 are used"
    );

    let batches = prober.batches();
    assert_eq!(batches.len(), 3, "Windows 0..5, 5..10 and the empty 7..12");
    let window = |range: std::ops::Range<u32>| -> Vec<String> {
        range
            .map(|index| receive_address(WalletKind::SegwitBech32, 0, index))
            .collect()
    };
    assert_eq!(batches[1], window(5..10));
    assert_eq!(batches[2], window(7..12));
}
