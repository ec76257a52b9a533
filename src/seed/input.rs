//! Import input classification
//!
//! Decides whether raw user text is a seed phrase, an encrypted backup, an
//! account-level extended public key or a single address.

use bitcoin::address::NetworkUnchecked;
use bitcoin::bip32::Xpub;
use bitcoin::Address;
use zeroize::Zeroizing;

use crate::config::NetworkType;
use crate::seed::backup::looks_like_backup;
use crate::types::ScriptKind;

/// Version bytes of the SLIP-132 extended public key prefixes
const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
const YPUB_VERSION: [u8; 4] = [0x04, 0x9D, 0x7C, 0xB2];
const ZPUB_VERSION: [u8; 4] = [0x04, 0xB2, 0x47, 0x46];
const TPUB_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];
const UPUB_VERSION: [u8; 4] = [0x04, 0x4A, 0x52, 0x62];
const VPUB_VERSION: [u8; 4] = [0x04, 0x5F, 0x1C, 0xF6];

/// Errors raised while classifying input
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Input is empty")]
    Empty,

    #[error("{0} belongs to a different network than {1}")]
    NetworkMismatch(String, NetworkType),

    #[error("Invalid extended public key: {0}")]
    InvalidExtendedKey(String),
}

/// Classified import input
pub enum ImportInput {
    /// Candidate seed phrase, not yet validated
    Mnemonic(Zeroizing<String>),

    /// Hex-encoded encrypted backup of a seed phrase
    EncryptedBackup(String),

    /// Account-level extended public key
    ExtendedPublicKey { xpub: Xpub, script: ScriptKind },

    /// Single address
    Address(Address),
}

impl ImportInput {
    /// Classify raw input for a network
    ///
    /// Anything that is not recognizably an address, an extended key or a
    /// backup is treated as a seed phrase and left to the validator.
    pub fn classify(raw: &str, network: NetworkType) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::Empty);
        }

        if trimmed.split_whitespace().count() > 1 {
            return Ok(ImportInput::Mnemonic(Zeroizing::new(trimmed.to_string())));
        }

        if let Ok(unchecked) = trimmed.parse::<Address<NetworkUnchecked>>() {
            return unchecked
                .require_network(network.to_bitcoin())
                .map(ImportInput::Address)
                .map_err(|_| InputError::NetworkMismatch(trimmed.to_string(), network));
        }

        if let Some(version) = extended_key_version(trimmed) {
            let (xpub, script) = decode_extended_key(trimmed, version)?;
            let expected_main = network == NetworkType::Mainnet;
            let is_main = xpub.network == bitcoin::NetworkKind::Main;
            if expected_main != is_main {
                return Err(InputError::NetworkMismatch(
                    "extended public key".to_string(),
                    network,
                ));
            }
            return Ok(ImportInput::ExtendedPublicKey { xpub, script });
        }

        if looks_like_backup(trimmed) {
            return Ok(ImportInput::EncryptedBackup(trimmed.to_lowercase()));
        }

        Ok(ImportInput::Mnemonic(Zeroizing::new(trimmed.to_string())))
    }

    /// Short description for logs (never includes secrets)
    pub fn describe(&self) -> &'static str {
        match self {
            ImportInput::Mnemonic(_) => "seed phrase",
            ImportInput::EncryptedBackup(_) => "encrypted backup",
            ImportInput::ExtendedPublicKey { .. } => "extended public key",
            ImportInput::Address(_) => "address",
        }
    }
}

impl std::fmt::Debug for ImportInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportInput::Address(address) => write!(f, "Address({})", address),
            ImportInput::ExtendedPublicKey { xpub, script } => {
                write!(f, "ExtendedPublicKey({}, {:?})", xpub, script)
            }
            other => write!(f, "{}(<redacted>)", other.describe()),
        }
    }
}

fn extended_key_version(candidate: &str) -> Option<&'static str> {
    ["xpub", "ypub", "zpub", "tpub", "upub", "vpub"]
        .into_iter()
        .find(|prefix| candidate.starts_with(prefix))
}

/// Decode an xpub/ypub/zpub (or testnet equivalent) into a plain `Xpub`
///
/// SLIP-132 prefixes only differ in their version bytes, so they are swapped
/// back to the BIP32 versions before decoding; the prefix picks the script.
fn decode_extended_key(candidate: &str, prefix: &str) -> Result<(Xpub, ScriptKind), InputError> {
    let mut data = bitcoin::base58::decode_check(candidate)
        .map_err(|e| InputError::InvalidExtendedKey(e.to_string()))?;
    if data.len() < 4 {
        return Err(InputError::InvalidExtendedKey("payload too short".to_string()));
    }

    let (expected_version, bip32_version, script) = match prefix {
        "xpub" => (XPUB_VERSION, XPUB_VERSION, ScriptKind::P2pkh),
        "ypub" => (YPUB_VERSION, XPUB_VERSION, ScriptKind::P2shP2wpkh),
        "zpub" => (ZPUB_VERSION, XPUB_VERSION, ScriptKind::P2wpkh),
        "tpub" => (TPUB_VERSION, TPUB_VERSION, ScriptKind::P2pkh),
        "upub" => (UPUB_VERSION, TPUB_VERSION, ScriptKind::P2shP2wpkh),
        _ => (VPUB_VERSION, TPUB_VERSION, ScriptKind::P2wpkh),
    };
    if data[..4] != expected_version {
        return Err(InputError::InvalidExtendedKey(format!(
            "unexpected version bytes for {}",
            prefix
        )));
    }
    data[..4].copy_from_slice(&bip32_version);

    let xpub = Xpub::decode(&data).map_err(|e| InputError::InvalidExtendedKey(e.to_string()))?;
    Ok((xpub, script))
}
