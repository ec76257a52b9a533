//! BIP39 mnemonic validation
//!
//! Normalizes raw user input and checks it against the English word list
//! and the BIP39 checksum.

use bip39::{Language, Mnemonic};
use zeroize::Zeroizing;

/// Word counts accepted for an imported phrase
pub const ACCEPTED_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Reasons a phrase is rejected
///
/// Variants never carry the offending words themselves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MnemonicError {
    #[error("Unsupported word count: {0} (expected 12, 15, 18, 21 or 24)")]
    WordCount(usize),

    #[error("Word #{position} is not in the BIP39 English word list")]
    UnknownWord { position: usize },

    #[error("Checksum mismatch")]
    Checksum,

    #[error("BIP39 error: {0}")]
    Bip39(String),
}

/// A validated BIP39 seed phrase
///
/// Immutable once parsed. The `Debug` output is redacted.
#[derive(Clone)]
pub struct SeedPhrase {
    mnemonic: Mnemonic,
}

impl SeedPhrase {
    /// Normalize and validate a raw phrase
    ///
    /// # Example
    ///
    /// ```ignore
    /// let phrase = SeedPhrase::parse("  Abandon abandon ... ABOUT ")?;
    /// assert_eq!(phrase.word_count(), 12);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, MnemonicError> {
        let normalized = normalize_phrase(raw);
        let word_count = normalized.split_whitespace().count();
        if !ACCEPTED_WORD_COUNTS.contains(&word_count) {
            return Err(MnemonicError::WordCount(word_count));
        }

        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| match e {
                bip39::Error::BadWordCount(n) => MnemonicError::WordCount(n),
                bip39::Error::UnknownWord(index) => MnemonicError::UnknownWord {
                    position: index + 1,
                },
                bip39::Error::InvalidChecksum => MnemonicError::Checksum,
                other => MnemonicError::Bip39(other.to_string()),
            })?;

        Ok(Self { mnemonic })
    }

    /// Number of words in the phrase
    pub fn word_count(&self) -> usize {
        self.mnemonic.word_count()
    }

    /// Normalized words joined by single spaces
    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.mnemonic.to_string())
    }

    /// BIP39 seed: PBKDF2-HMAC-SHA512, 2048 rounds, salt `"mnemonic" + passphrase`
    pub fn to_seed(&self, passphrase: &str) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.mnemonic.to_seed(passphrase))
    }
}

impl std::fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedPhrase")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}

/// Check a raw phrase against the word list and checksum
///
/// Never fails: every rejection is reported as `false`.
pub fn validate(phrase: &str) -> bool {
    SeedPhrase::parse(phrase).is_ok()
}

/// Trim, lowercase and single-space the words of a raw phrase
pub fn normalize_phrase(raw: &str) -> Zeroizing<String> {
    let words: Vec<String> = raw
        .split_whitespace()
        .map(|word| word.trim().to_lowercase())
        .collect();
    let joined = Zeroizing::new(words.join(" "));
    drop(Zeroizing::new(words));
    joined
}
