//! Seed handling
//!
//! Mnemonic validation, BIP32 derivation, encrypted backups and import
//! input classification. Everything here is synchronous.

pub mod backup;
pub mod derivation;
pub mod input;
pub mod mnemonic;

pub use backup::{decrypt_mnemonic, encrypt_mnemonic, BackupError};
pub use derivation::{derive_account, AccountKeys, DerivationError, DerivationPath, PathSegment, Seed};
pub use input::{ImportInput, InputError};
pub use mnemonic::{validate, MnemonicError, SeedPhrase};
