//! Encrypted seed backups
//!
//! A backup is the hex encoding of `salt || nonce || ciphertext || tag`,
//! produced by AES-256-GCM under a key stretched from the user's password.
//! Importing a backup goes through the password negotiation of a discovery
//! run before the recovered phrase is validated.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::seed::mnemonic::{MnemonicError, SeedPhrase};

/// PBKDF2-HMAC-SHA256 rounds for the backup key
pub const BACKUP_KDF_ROUNDS: u32 = 600_000;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Minimum decoded size: salt (16) + nonce (12) + tag (16)
pub const MIN_BACKUP_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Backup encryption errors
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Backup does not contain a valid seed phrase: {0}")]
    Mnemonic(#[from] MnemonicError),
}

/// Encrypt data using AES-256-GCM with a password-derived key
///
/// - PBKDF2-HMAC-SHA256 with 600,000 iterations
/// - Random 128-bit salt
/// - Random 96-bit nonce for each encryption
///
/// # Example
///
/// ```ignore
/// let encrypted = encrypt_data(b"secret", "my_password")?;
/// let decrypted = decrypt_data(&encrypted, "my_password")?;
/// ```
pub fn encrypt_data(data: &[u8], password: &str) -> Result<String, BackupError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let cipher = cipher_for(password, &salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|e| BackupError::Encryption(e.to_string()))?;

    let mut result = salt.to_vec();
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(hex::encode(result))
}

/// Decrypt data produced by [`encrypt_data`]
pub fn decrypt_data(encrypted_hex: &str, password: &str) -> Result<Zeroizing<Vec<u8>>, BackupError> {
    let encrypted_bytes =
        hex::decode(encrypted_hex.trim()).map_err(|e| BackupError::Decryption(e.to_string()))?;

    if encrypted_bytes.len() < MIN_BACKUP_LEN {
        return Err(BackupError::Decryption(format!(
            "Data too short (minimum {} bytes required)",
            MIN_BACKUP_LEN
        )));
    }

    let (salt, rest) = encrypted_bytes.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = cipher_for(password, salt);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| BackupError::Decryption(format!("Decryption failed (wrong password?): {}", e)))?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt a seed phrase into a backup string
pub fn encrypt_mnemonic(phrase: &SeedPhrase, password: &str) -> Result<String, BackupError> {
    let words = phrase.phrase();
    encrypt_data(words.as_bytes(), password)
}

/// Decrypt a backup string and validate the recovered phrase
pub fn decrypt_mnemonic(encrypted_hex: &str, password: &str) -> Result<SeedPhrase, BackupError> {
    let decrypted_bytes = decrypt_data(encrypted_hex, password)?;
    let words = std::str::from_utf8(&decrypted_bytes)
        .map_err(|e| BackupError::Decryption(e.to_string()))?;

    Ok(SeedPhrase::parse(words)?)
}

/// Cheap shape check: even-length hex, long enough to hold salt, nonce and tag
pub fn looks_like_backup(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.len() >= MIN_BACKUP_LEN * 2
        && candidate.len() % 2 == 0
        && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

fn cipher_for(password: &str, salt: &[u8]) -> Aes256Gcm {
    let mut key_bytes = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, BACKUP_KDF_ROUNDS, &mut key_bytes[..]);
    let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes[..]);
    Aes256Gcm::new(key)
}
