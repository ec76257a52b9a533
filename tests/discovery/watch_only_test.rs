//! Watch-only imports: single addresses and account extended public keys

use crate::common::{account_keys, drain, receive_address, test_config, MockProber, TEST_PHRASE};
use bitcoin::base58;
use std::sync::Arc;
use vault_seed_discovery::discovery::{Discovery, DiscoveryOptions};
use vault_seed_discovery::types::{ScriptKind, WalletKind, WalletOrigin};
use vault_seed_discovery::DiscoveryError;

/// Re-encode an xpub with SLIP-132 zpub version bytes
fn to_zpub(xpub: &str) -> String {
    let mut data = base58::decode_check(xpub).expect("Invalid xpub");
    data[..4].copy_from_slice(&[0x04, 0xB2, 0x47, 0x46]);
    base58::encode_check(&data)
}

#[tokio::test]
async fn test_address_import_probes_only_that_address() {
    let address = receive_address(WalletKind::SegwitBech32, 0, 0);
    let prober = Arc::new(MockProber::empty().with_used([address.clone()]));
    let discovery = Discovery::new(test_config(), prober.clone());

    let task = discovery
        .start(&address, DiscoveryOptions::default())
        .expect("Address should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert_eq!(result.wallets.len(), 1);
    let wallet = &result.wallets[0];
    assert_eq!(wallet.kind, WalletKind::WatchOnlyAddress);
    assert_eq!(wallet.first_address, address);
    assert!(wallet.has_history);
    assert!(wallet.descriptors().is_none(), "A lone address has no descriptor");
    assert_eq!(prober.batches(), vec![vec![address]]);
}

#[tokio::test]
async fn test_zpub_import_derives_the_same_addresses_as_the_seed() {
    let keys = account_keys(TEST_PHRASE, "", WalletKind::SegwitBech32, 0);
    let zpub = to_zpub(&keys.xpub().to_string());
    assert_eq!(
        zpub,
        "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs",
        "BIP84 account 0 zpub"
    );

    let discovery = Discovery::new(test_config(), Arc::new(MockProber::empty()));
    let options = DiscoveryOptions {
        offline: true,
        ..DiscoveryOptions::default()
    };
    let task = discovery.start(&zpub, options).expect("zpub should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    assert_eq!(result.wallets.len(), 1);
    let wallet = &result.wallets[0];
    assert_eq!(wallet.kind, WalletKind::WatchOnlyXpub(ScriptKind::P2wpkh));
    assert_eq!(wallet.first_address, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
    match &wallet.origin {
        WalletOrigin::WatchOnlyXpub { descriptor, .. } => {
            assert!(descriptor.starts_with("wpkh(xpub"), "Descriptor: {}", descriptor);
            assert!(descriptor.ends_with("/0/*)"));
        }
        other => panic!("Expected a watch-only xpub origin, got {:?}", other),
    }
}

#[tokio::test]
async fn test_xpub_import_with_history_reports_next_unused_index() {
    let keys = account_keys(TEST_PHRASE, "", WalletKind::LegacyP2pkh, 0);
    let prober = Arc::new(
        MockProber::empty().with_used([receive_address(WalletKind::LegacyP2pkh, 0, 2)]),
    );
    let discovery = Discovery::new(test_config(), prober);

    let task = discovery
        .start(&keys.xpub().to_string(), DiscoveryOptions::default())
        .expect("xpub should start a run");
    let (_, result) = drain(task, None).await;
    let result = result.expect("Run should complete");

    let wallet = &result.wallets[0];
    assert_eq!(wallet.kind, WalletKind::WatchOnlyXpub(ScriptKind::P2pkh));
    assert_eq!(wallet.first_address, "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
    assert!(wallet.has_history);
    assert_eq!(wallet.next_unused_index, 3);
}

#[tokio::test]
async fn test_inputs_for_another_network_are_rejected() {
    let discovery = Discovery::new(test_config(), Arc::new(MockProber::empty()));

    let err = discovery
        .start(
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
            DiscoveryOptions::default(),
        )
        .expect_err("Testnet address on mainnet should be rejected");
    assert!(matches!(err, DiscoveryError::NetworkMismatch(_)));
}

#[tokio::test]
async fn test_watch_only_ids_differ_from_seed_ids() {
    let discovery = Discovery::new(test_config(), Arc::new(MockProber::empty()));
    let options = DiscoveryOptions {
        offline: true,
        ..DiscoveryOptions::default()
    };

    let keys = account_keys(TEST_PHRASE, "", WalletKind::SegwitBech32, 0);
    let zpub = to_zpub(&keys.xpub().to_string());
    let task = discovery.start(&zpub, options.clone()).expect("zpub should start a run");
    let (_, watch_only) = drain(task, None).await;

    let task = discovery.start(TEST_PHRASE, options).expect("Phrase should start a run");
    let (_, seeded) = drain(task, None).await;

    let watch_only = watch_only.expect("Run should complete");
    let seeded = seeded.expect("Run should complete");
    assert_eq!(watch_only.wallets[0].first_address, seeded.wallets[0].first_address);
    assert_ne!(watch_only.wallets[0].id, seeded.wallets[0].id);
}
