use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use deskvault_core::secrets::{CryptoError, SecretCrypto};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::key_provider::{DataKey, KeyProvider};

/// AES-256-GCM encryption capability whose key lives in the OS keychain.
///
/// The opaque output is a small JSON envelope carrying the nonce and the
/// ciphertext, both URL-safe base64.
pub struct KeychainCrypto<P: KeyProvider> {
    key_provider: P,
}

impl<P: KeyProvider> KeychainCrypto<P> {
    pub fn new(key_provider: P) -> Self {
        Self { key_provider }
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        let key = self
            .key_provider
            .get_or_create()
            .map_err(|e| CryptoError::Unavailable {
                reason: format!("key provider: {e}"),
            })?;
        build_cipher(&key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedBlob {
    nonce: String,
    ciphertext: String,
}

impl<P: KeyProvider> SecretCrypto for KeychainCrypto<P> {
    fn is_available(&self) -> bool {
        match self.key_provider.get_or_create() {
            Ok(_) => true,
            Err(err) => {
                debug!("keychain unavailable: {err}");
                false
            }
        }
    }

    #[instrument(skip_all)]
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt {
                reason: e.to_string(),
            })?;

        let blob = SealedBlob {
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };
        serde_json::to_string(&blob).map_err(|e| CryptoError::Encrypt {
            reason: e.to_string(),
        })
    }

    #[instrument(skip_all)]
    fn decrypt(&self, sealed: &str) -> Result<String, CryptoError> {
        let blob: SealedBlob = serde_json::from_str(sealed).map_err(decrypt_err)?;
        let cipher = self.cipher()?;

        let nonce_bytes = URL_SAFE_NO_PAD.decode(blob.nonce).map_err(decrypt_err)?;
        if nonce_bytes.len() != 12 {
            return Err(CryptoError::Decrypt {
                reason: format!("expected 12-byte nonce, got {}", nonce_bytes.len()),
            });
        }
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = URL_SAFE_NO_PAD
            .decode(blob.ciphertext)
            .map_err(decrypt_err)?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(decrypt_err)?;
        String::from_utf8(plaintext).map_err(decrypt_err)
    }
}

fn build_cipher(key: &DataKey) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| CryptoError::Unavailable {
        reason: format!("cipher init failed: {e}"),
    })
}

fn decrypt_err<E: ToString>(err: E) -> CryptoError {
    CryptoError::Decrypt {
        reason: err.to_string(),
    }
}
