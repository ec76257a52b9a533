//! Seed command implementations: validate, derive, backup

use crate::bitcoin::{WatchOnlyWallet, WatchOnlyWalletError};
use crate::config::{load_config, ConfigError, ConfigOverrides};
use crate::seed::backup::{decrypt_mnemonic, encrypt_mnemonic, BackupError};
use crate::seed::derivation::{AccountKeys, DerivationError, Seed, EXTERNAL_CHAIN};
use crate::seed::mnemonic::{MnemonicError, SeedPhrase};
use crate::types::{DiscoveredWallet, WalletKind};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SeedCommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid mnemonic: {0}")]
    Mnemonic(#[from] MnemonicError),

    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WatchOnlyWalletError),

    #[error("Derived and descriptor addresses disagree at index {0}")]
    AddressMismatch(u32),
}

/// Report whether a phrase is a valid BIP39 seed phrase
///
/// An invalid phrase is not an error: the reason is printed instead.
pub fn validate(phrase: &str) -> Result<(), SeedCommandError> {
    match SeedPhrase::parse(phrase) {
        Ok(parsed) => {
            println!("✓ Valid seed phrase ({} words)", parsed.word_count());
        }
        Err(reason) => {
            println!("✗ Invalid seed phrase: {}", reason);
        }
    }
    Ok(())
}

/// Derive one account of one wallet kind and list its receive addresses
pub fn derive(
    phrase: &str,
    kind: WalletKind,
    account: u32,
    count: u32,
    passphrase: Option<&str>,
    config_path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<(), SeedCommandError> {
    let config = load_config(config_path, overrides)?;
    let network = config.bitcoin.network;

    let phrase = SeedPhrase::parse(phrase)?;
    let seed = Seed::from_phrase(&phrase, passphrase.unwrap_or(""));
    let keys = AccountKeys::derive(&seed, kind, network, account)?;
    let wallet = DiscoveredWallet::from_account(&keys, false, 0)?;

    // Cross-check the engine's encoder against a BDK descriptor wallet
    let watch_only = WatchOnlyWallet::from_discovered(&wallet)?;
    let derived = keys.addresses(EXTERNAL_CHAIN, 0..count)?;
    let from_descriptor = watch_only.list_addresses(count);
    for (index, (ours, bdk)) in derived.iter().zip(from_descriptor.iter()).enumerate() {
        if ours != bdk {
            return Err(SeedCommandError::AddressMismatch(index as u32));
        }
    }

    println!("{} - account {}", kind, account);
    println!();
    println!("  Network:     {}", network);
    if let Some(path) = wallet.derivation_path() {
        println!("  Path:        {}", path);
    }
    println!("  Wallet ID:   {}", wallet.id);
    println!("  Account xpub: {}", keys.xpub());
    if let Some((descriptor, change_descriptor)) = wallet.descriptors() {
        println!("  Descriptor:  {}", descriptor);
        println!("  Change:      {}", change_descriptor);
    }
    println!();
    println!("Receive addresses:");
    for (index, address) in derived.iter().enumerate() {
        println!("  {}: {}", index, address);
    }

    Ok(())
}

/// Encrypt a seed phrase into a hex backup
pub fn backup_encrypt(phrase: &str, password: &str) -> Result<(), SeedCommandError> {
    let phrase = SeedPhrase::parse(phrase)?;
    let backup = encrypt_mnemonic(&phrase, password)?;

    println!("✓ Backup created ({} words)", phrase.word_count());
    println!("{}", backup);

    Ok(())
}

/// Decrypt a hex backup and print the seed phrase
pub fn backup_decrypt(backup: &str, password: &str) -> Result<(), SeedCommandError> {
    let phrase = decrypt_mnemonic(backup, password)?;

    println!("✓ Backup decrypted ({} words)", phrase.word_count());
    println!("  {}", phrase.phrase().as_str());
    println!();
    println!("  Keep this phrase safe and secret!");

    Ok(())
}
