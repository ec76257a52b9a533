//! BIP32 key derivation and address generation
//!
//! Turns a validated seed phrase (plus optional passphrase) into account-level
//! extended keys along the BIP44/49/84/86 templates, and encodes receive and
//! change addresses for each script template.

use bitcoin::bip32::{ChildNumber, Fingerprint, Xpriv, Xpub};
use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use bitcoin::{Address, CompressedPublicKey, XOnlyPublicKey};
use std::ops::Range;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::config::NetworkType;
use crate::seed::mnemonic::SeedPhrase;
use crate::types::{ScriptKind, WalletKind};

/// First index of the hardened range (2^31)
pub const HARDENED_OFFSET: u32 = 1 << 31;

/// External (receive) chain
pub const EXTERNAL_CHAIN: u32 = 0;

/// Internal (change) chain
pub const INTERNAL_CHAIN: u32 = 1;

/// Key derivation errors
#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error("Child index {0} is outside the 2^31 range")]
    IndexOverflow(u32),

    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("Wallet kind {0} has no derivation template")]
    NotDerivable(WalletKind),

    #[error("BIP32 derivation error: {0}")]
    Bip32(#[from] bitcoin::bip32::Error),
}

/// One step of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub index: u32,
    pub hardened: bool,
}

impl PathSegment {
    pub fn hardened(index: u32) -> Self {
        Self {
            index,
            hardened: true,
        }
    }

    pub fn normal(index: u32) -> Self {
        Self {
            index,
            hardened: false,
        }
    }

    /// Convert to a BIP32 child number, rejecting indices past 2^31 - 1
    pub fn to_child_number(self) -> Result<ChildNumber, DerivationError> {
        if self.index >= HARDENED_OFFSET {
            return Err(DerivationError::IndexOverflow(self.index));
        }
        let child = if self.hardened {
            ChildNumber::from_hardened_idx(self.index)?
        } else {
            ChildNumber::from_normal_idx(self.index)?
        };
        Ok(child)
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// Ordered derivation path from the master key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    segments: Vec<PathSegment>,
}

impl DerivationPath {
    /// The empty path (`m`)
    pub fn master() -> Self {
        Self::default()
    }

    /// Account-level path `m/purpose'/coin_type'/account'`
    pub fn account(purpose: u32, coin_type: u32, account: u32) -> Self {
        Self {
            segments: vec![
                PathSegment::hardened(purpose),
                PathSegment::hardened(coin_type),
                PathSegment::hardened(account),
            ],
        }
    }

    /// Account-level path for an HD wallet kind
    pub fn for_kind(
        kind: WalletKind,
        network: NetworkType,
        account: u32,
    ) -> Result<Self, DerivationError> {
        let purpose = kind.purpose().ok_or(DerivationError::NotDerivable(kind))?;
        Ok(Self::account(purpose, network.coin_type(), account))
    }

    /// Extend the path by one segment
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_master(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path without the leading `m/`, as used inside descriptor key origins
    pub fn origin_suffix(&self) -> String {
        self.segments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl std::fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_master() {
            write!(f, "m")
        } else {
            write!(f, "m/{}", self.origin_suffix())
        }
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    /// Parse `m/84'/0'/0'` (also accepts `h`/`H` as the hardened marker)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => return Err(DerivationError::InvalidPath(s.to_string())),
        }

        let mut segments = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix(|c: char| matches!(c, '\'' | 'h' | 'H')) {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| DerivationError::InvalidPath(s.to_string()))?;
            if index >= HARDENED_OFFSET {
                return Err(DerivationError::IndexOverflow(index));
            }
            segments.push(PathSegment { index, hardened });
        }

        Ok(Self { segments })
    }
}

/// BIP39 seed bytes, wiped on drop
pub struct Seed {
    bytes: Zeroizing<[u8; 64]>,
}

impl Seed {
    /// Stretch a phrase and passphrase into the 64-byte BIP39 seed
    pub fn from_phrase(phrase: &SeedPhrase, passphrase: &str) -> Self {
        Self {
            bytes: phrase.to_seed(passphrase),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// BIP32 master key for a network
    pub fn master_key(&self, network: NetworkType) -> Result<Xpriv, DerivationError> {
        Ok(Xpriv::new_master(network.to_bitcoin(), self.bytes.as_slice())?)
    }

    /// Fingerprint of the master public key
    pub fn fingerprint(&self, network: NetworkType) -> Result<Fingerprint, DerivationError> {
        let secp = Secp256k1::new();
        Ok(self.master_key(network)?.fingerprint(&secp))
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// Derive the extended private key at `path`
///
/// Walks the path one segment at a time, using hardened or normal child
/// derivation as flagged on each segment.
///
/// # Example
///
/// ```ignore
/// let seed = Seed::from_phrase(&phrase, "");
/// let path: DerivationPath = "m/84'/0'/0'".parse()?;
/// let account_xprv = derive_account(&seed, NetworkType::Mainnet, &path)?;
/// ```
pub fn derive_account(
    seed: &Seed,
    network: NetworkType,
    path: &DerivationPath,
) -> Result<Xpriv, DerivationError> {
    let secp = Secp256k1::new();
    let mut key = seed.master_key(network)?;
    for segment in path.segments() {
        let child = segment.to_child_number()?;
        key = key.derive_priv(&secp, &[child])?;
    }
    Ok(key)
}

/// Account-level public key material for one wallet kind
///
/// Holds only public data; addresses for any `(change, index)` pair are
/// derived from the account xpub with normal (non-hardened) steps.
#[derive(Debug, Clone)]
pub struct AccountKeys {
    kind: WalletKind,
    script: ScriptKind,
    network: NetworkType,
    account: u32,
    origin: Option<(Fingerprint, DerivationPath)>,
    xpub: Xpub,
    secp: Secp256k1<VerifyOnly>,
}

impl AccountKeys {
    /// Derive the account keys of an HD wallet kind
    pub fn derive(
        seed: &Seed,
        kind: WalletKind,
        network: NetworkType,
        account: u32,
    ) -> Result<Self, DerivationError> {
        let script = kind.script().ok_or(DerivationError::NotDerivable(kind))?;
        let path = DerivationPath::for_kind(kind, network, account)?;

        let signing = Secp256k1::new();
        let master = seed.master_key(network)?;
        let fingerprint = master.fingerprint(&signing);
        let account_xprv = derive_account(seed, network, &path)?;
        let xpub = Xpub::from_priv(&signing, &account_xprv);

        Ok(Self {
            kind,
            script,
            network,
            account,
            origin: Some((fingerprint, path)),
            xpub,
            secp: Secp256k1::verification_only(),
        })
    }

    /// Wrap a watch-only account xpub
    pub fn from_xpub(xpub: Xpub, script: ScriptKind, network: NetworkType) -> Self {
        Self {
            kind: WalletKind::WatchOnlyXpub(script),
            script,
            network,
            account: 0,
            origin: None,
            xpub,
            secp: Secp256k1::verification_only(),
        }
    }

    pub fn kind(&self) -> WalletKind {
        self.kind
    }

    pub fn script(&self) -> ScriptKind {
        self.script
    }

    pub fn network(&self) -> NetworkType {
        self.network
    }

    pub fn account(&self) -> u32 {
        self.account
    }

    pub fn xpub(&self) -> &Xpub {
        &self.xpub
    }

    /// Account derivation path (absent for watch-only xpubs)
    pub fn path(&self) -> Option<&DerivationPath> {
        self.origin.as_ref().map(|(_, path)| path)
    }

    /// Master key fingerprint (absent for watch-only xpubs)
    pub fn master_fingerprint(&self) -> Option<Fingerprint> {
        self.origin.as_ref().map(|(fingerprint, _)| *fingerprint)
    }

    /// Address at `<account>/<change>/<index>`
    pub fn address(&self, change: u32, index: u32) -> Result<Address, DerivationError> {
        let steps = [
            PathSegment::normal(change).to_child_number()?,
            PathSegment::normal(index).to_child_number()?,
        ];
        let child = self.xpub.derive_pub(&self.secp, &steps)?;
        let public_key = CompressedPublicKey(child.public_key);
        Ok(self.encode(public_key))
    }

    /// Consecutive addresses on one chain
    pub fn addresses(&self, change: u32, range: Range<u32>) -> Result<Vec<Address>, DerivationError> {
        range.map(|index| self.address(change, index)).collect()
    }

    /// Watch-only output descriptor for one chain, e.g.
    /// `wpkh([d34db33f/84'/0'/0']xpub.../0/*)`
    pub fn descriptor(&self, change: u32) -> String {
        let key = match &self.origin {
            Some((fingerprint, path)) => format!(
                "[{}/{}]{}/{}/*",
                fingerprint,
                path.origin_suffix(),
                self.xpub,
                change
            ),
            None => format!("{}/{}/*", self.xpub, change),
        };
        match self.script {
            ScriptKind::P2wpkh => format!("wpkh({})", key),
            ScriptKind::P2pkh => format!("pkh({})", key),
            ScriptKind::P2shP2wpkh => format!("sh(wpkh({}))", key),
            ScriptKind::P2tr => format!("tr({})", key),
        }
    }

    fn encode(&self, public_key: CompressedPublicKey) -> Address {
        let network = self.network.to_bitcoin();
        match self.script {
            ScriptKind::P2wpkh => Address::p2wpkh(&public_key, network),
            ScriptKind::P2pkh => Address::p2pkh(public_key.pubkey_hash(), network),
            ScriptKind::P2shP2wpkh => Address::p2shwpkh(&public_key, network),
            // BIP86: key-path only, no script tree
            ScriptKind::P2tr => {
                let internal_key = XOnlyPublicKey::from(public_key.0);
                Address::p2tr(&self.secp, internal_key, None, network)
            }
        }
    }
}
