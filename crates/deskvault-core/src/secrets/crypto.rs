use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Errors produced by an encryption capability.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The platform cannot encrypt right now (no keychain, locked session).
    #[error("encryption unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("encrypt failed: {reason}")]
    Encrypt { reason: String },
    #[error("decrypt failed: {reason}")]
    Decrypt { reason: String },
}

/// Platform encryption capability used by the secret store.
///
/// Implementations turn text into an opaque text blob and back. Any call may
/// fail; the store treats every error as a reason to leave the keychain backend.
pub trait SecretCrypto: Send + Sync {
    fn is_available(&self) -> bool;

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

impl<T: SecretCrypto + ?Sized> SecretCrypto for Arc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        (**self).decrypt(ciphertext)
    }
}

impl<T: SecretCrypto + ?Sized> SecretCrypto for Box<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        (**self).decrypt(ciphertext)
    }
}

/// Reversible masking for tests and smoke runs.
/// This is not cryptographically secure; production uses the keyring-backed
/// AES-GCM capability from `deskvault-storage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskingCrypto;

impl SecretCrypto for MaskingCrypto {
    fn is_available(&self) -> bool {
        true
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(STANDARD.encode(mask(plaintext.as_bytes())))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let masked = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| CryptoError::Decrypt {
                reason: e.to_string(),
            })?;
        String::from_utf8(unmask(&masked)).map_err(|e| CryptoError::Decrypt {
            reason: e.to_string(),
        })
    }
}

/// Capability for hosts without platform encryption.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCrypto;

impl SecretCrypto for UnavailableCrypto {
    fn is_available(&self) -> bool {
        false
    }

    fn encrypt(&self, _plaintext: &str) -> Result<String, CryptoError> {
        Err(unavailable())
    }

    fn decrypt(&self, _ciphertext: &str) -> Result<String, CryptoError> {
        Err(unavailable())
    }
}

fn unavailable() -> CryptoError {
    CryptoError::Unavailable {
        reason: "no platform encryption".to_string(),
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

fn unmask(input: &[u8]) -> Vec<u8> {
    mask(input) // XOR twice restores original.
}
