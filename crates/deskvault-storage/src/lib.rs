//! Durable stores for deskvault: the versioned config snapshot, the secret
//! store with its keychain/fallback backends, and the keyring-backed AES-GCM
//! encryption capability.

mod atomic;
pub mod config_store;
pub mod env_file;
pub mod key_provider;
pub mod keychain_crypto;
pub mod secret_store;

pub use config_store::{ConfigStore, ConfigStoreError};
pub use keychain_crypto::KeychainCrypto;
pub use secret_store::{SecretStore, SecretStoreError, ValidationError};
