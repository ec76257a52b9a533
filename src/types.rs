//! Shared types for the discovery engine
//!
//! Wallet kinds, the ordered template table, and the discovered-wallet
//! record emitted to callers.

use blake2::{Blake2s256, Digest};
use serde::{Deserialize, Serialize};

use crate::config::NetworkType;
use crate::seed::derivation::{AccountKeys, DerivationError, EXTERNAL_CHAIN, INTERNAL_CHAIN};

/// Output script template used to encode addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// Native segwit v0 (bech32)
    P2wpkh,

    /// Legacy pay-to-pubkey-hash
    P2pkh,

    /// Segwit v0 nested in P2SH
    P2shP2wpkh,

    /// Taproot key-path spend (bech32m)
    P2tr,
}

/// Wallet kinds the engine can discover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    /// BIP84, m/84'/coin'/account'
    SegwitBech32,

    /// BIP44, m/44'/coin'/account'
    LegacyP2pkh,

    /// BIP86, m/86'/coin'/account'
    Taproot,

    /// BIP49, m/49'/coin'/account' (import only)
    SegwitP2sh,

    /// A single watched address
    WatchOnlyAddress,

    /// A watched account-level extended public key
    WatchOnlyXpub(ScriptKind),
}

impl WalletKind {
    /// HD kinds in discovery priority order
    pub const HD_PRIORITY: [WalletKind; 4] = [
        WalletKind::SegwitBech32,
        WalletKind::LegacyP2pkh,
        WalletKind::Taproot,
        WalletKind::SegwitP2sh,
    ];

    /// BIP43 purpose constant (HD kinds only)
    pub fn purpose(self) -> Option<u32> {
        match self {
            WalletKind::SegwitBech32 => Some(84),
            WalletKind::LegacyP2pkh => Some(44),
            WalletKind::Taproot => Some(86),
            WalletKind::SegwitP2sh => Some(49),
            WalletKind::WatchOnlyAddress | WalletKind::WatchOnlyXpub(_) => None,
        }
    }

    /// Script template of the kind's addresses
    pub fn script(self) -> Option<ScriptKind> {
        match self {
            WalletKind::SegwitBech32 => Some(ScriptKind::P2wpkh),
            WalletKind::LegacyP2pkh => Some(ScriptKind::P2pkh),
            WalletKind::Taproot => Some(ScriptKind::P2tr),
            WalletKind::SegwitP2sh => Some(ScriptKind::P2shP2wpkh),
            WalletKind::WatchOnlyXpub(script) => Some(script),
            WalletKind::WatchOnlyAddress => None,
        }
    }

    /// Stable tag used for content hashing
    pub fn tag(self) -> &'static str {
        match self {
            WalletKind::SegwitBech32 => "hd_segwit_bech32",
            WalletKind::LegacyP2pkh => "hd_legacy_p2pkh",
            WalletKind::Taproot => "hd_taproot",
            WalletKind::SegwitP2sh => "hd_segwit_p2sh",
            WalletKind::WatchOnlyAddress => "watch_only_address",
            WalletKind::WatchOnlyXpub(ScriptKind::P2wpkh) => "watch_only_xpub_p2wpkh",
            WalletKind::WatchOnlyXpub(ScriptKind::P2pkh) => "watch_only_xpub_p2pkh",
            WalletKind::WatchOnlyXpub(ScriptKind::P2shP2wpkh) => "watch_only_xpub_p2sh_p2wpkh",
            WalletKind::WatchOnlyXpub(ScriptKind::P2tr) => "watch_only_xpub_p2tr",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            WalletKind::SegwitBech32 => "HD Segwit (Bech32)",
            WalletKind::LegacyP2pkh => "HD Legacy",
            WalletKind::Taproot => "HD Taproot",
            WalletKind::SegwitP2sh => "HD Segwit (P2SH)",
            WalletKind::WatchOnlyAddress => "Watch-only address",
            WalletKind::WatchOnlyXpub(_) => "Watch-only xpub",
        }
    }
}

impl std::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the ordered discovery table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTemplate {
    pub kind: WalletKind,

    /// Ask the caller for a BIP39 passphrase before scanning this kind
    pub requires_passphrase: bool,
}

impl WalletTemplate {
    pub fn new(kind: WalletKind, requires_passphrase: bool) -> Self {
        Self {
            kind,
            requires_passphrase,
        }
    }

    /// The default HD table: bech32, legacy, taproot, then the P2SH import variant
    pub fn default_table(ask_passphrase: bool) -> Vec<WalletTemplate> {
        WalletKind::HD_PRIORITY
            .iter()
            .map(|kind| WalletTemplate::new(*kind, ask_passphrase))
            .collect()
    }
}

/// Content hash identifying a discovered wallet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    /// BLAKE2s-256 over length-prefixed parts
    pub fn compute(parts: &[&str]) -> Self {
        let mut hasher = Blake2s256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        WalletId(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a discovered wallet's addresses come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletOrigin {
    /// Derived from the imported seed
    Derived {
        derivation_path: String,
        master_fingerprint: String,
        xpub: String,
        descriptor: String,
        change_descriptor: String,
    },

    /// Imported account xpub
    WatchOnlyXpub {
        xpub: String,
        descriptor: String,
        change_descriptor: String,
    },

    /// Imported single address
    WatchOnlyAddress { address: String },
}

/// A wallet found (or offered by default) during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredWallet {
    pub id: WalletId,
    pub kind: WalletKind,
    pub network: NetworkType,
    pub account: u32,
    pub origin: WalletOrigin,
    pub first_address: String,
    pub has_history: bool,

    /// Receive index after the last used address of the probed window
    pub next_unused_index: u32,
}

impl DiscoveredWallet {
    /// Record for a derived or watch-only xpub account
    pub fn from_account(
        keys: &AccountKeys,
        has_history: bool,
        next_unused_index: u32,
    ) -> Result<Self, DerivationError> {
        let kind = keys.kind();
        let xpub = keys.xpub().to_string();
        let descriptor = keys.descriptor(EXTERNAL_CHAIN);
        let change_descriptor = keys.descriptor(INTERNAL_CHAIN);

        let (id, origin) = match (keys.path(), keys.master_fingerprint()) {
            (Some(path), Some(fingerprint)) => {
                let derivation_path = path.to_string();
                let master_fingerprint = fingerprint.to_string();
                let id = WalletId::compute(&[kind.tag(), &derivation_path, &master_fingerprint]);
                let origin = WalletOrigin::Derived {
                    derivation_path,
                    master_fingerprint,
                    xpub,
                    descriptor,
                    change_descriptor,
                };
                (id, origin)
            }
            _ => {
                let id = WalletId::compute(&[kind.tag(), &xpub]);
                let origin = WalletOrigin::WatchOnlyXpub {
                    xpub,
                    descriptor,
                    change_descriptor,
                };
                (id, origin)
            }
        };

        Ok(Self {
            id,
            kind,
            network: keys.network(),
            account: keys.account(),
            origin,
            first_address: keys.address(EXTERNAL_CHAIN, 0)?.to_string(),
            has_history,
            next_unused_index,
        })
    }

    /// Record for a single watched address
    pub fn from_address(address: &bitcoin::Address, network: NetworkType, has_history: bool) -> Self {
        let address = address.to_string();
        let kind = WalletKind::WatchOnlyAddress;
        Self {
            id: WalletId::compute(&[kind.tag(), &address]),
            kind,
            network,
            account: 0,
            origin: WalletOrigin::WatchOnlyAddress {
                address: address.clone(),
            },
            first_address: address,
            has_history,
            next_unused_index: u32::from(has_history),
        }
    }

    /// Derivation path of a seed-derived wallet
    pub fn derivation_path(&self) -> Option<&str> {
        match &self.origin {
            WalletOrigin::Derived {
                derivation_path, ..
            } => Some(derivation_path),
            _ => None,
        }
    }

    /// External and change descriptors, when the wallet has them
    pub fn descriptors(&self) -> Option<(&str, &str)> {
        match &self.origin {
            WalletOrigin::Derived {
                descriptor,
                change_descriptor,
                ..
            }
            | WalletOrigin::WatchOnlyXpub {
                descriptor,
                change_descriptor,
                ..
            } => Some((descriptor, change_descriptor)),
            WalletOrigin::WatchOnlyAddress { .. } => None,
        }
    }
}
