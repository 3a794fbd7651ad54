//! Source of the 256-bit data key that seals `secrets.enc`.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

pub const DATA_KEY_LEN: usize = 32;

/// Symmetric key for the secrets blob. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct DataKey([u8; DATA_KEY_LEN]);

impl DataKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; DATA_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DATA_KEY_LEN] {
        &self.0
    }

    fn to_stored(&self) -> String {
        STANDARD.encode(self.0)
    }

    fn from_stored(stored: &str) -> Result<Self, KeyError> {
        let raw = STANDARD
            .decode(stored.trim())
            .map_err(|e| KeyError::Malformed(e.to_string()))?;
        let bytes: [u8; DATA_KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            KeyError::Malformed(format!("expected {DATA_KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(..)")
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring entry {service}/{account} unusable: {reason}")]
    Keyring {
        service: String,
        account: String,
        reason: String,
    },
    #[error("stored data key is malformed: {0}")]
    Malformed(String),
    #[error("in-memory key lock poisoned")]
    Poisoned,
}

/// Yields the data key, creating it on first use.
pub trait KeyProvider: Send + Sync {
    fn get_or_create(&self) -> Result<DataKey, KeyError>;
}

/// Keeps the data key as a base64 password in the OS keyring.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn keyring_error(&self, err: keyring::Error) -> KeyError {
        KeyError::Keyring {
            service: self.service.clone(),
            account: self.account.clone(),
            reason: err.to_string(),
        }
    }
}

impl KeyProvider for KeyringProvider {
    fn get_or_create(&self) -> Result<DataKey, KeyError> {
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| self.keyring_error(e))?;

        match entry.get_password() {
            Ok(stored) => DataKey::from_stored(&stored),
            // Only a missing entry may be replaced; any other failure must not
            // overwrite a key that still encrypts existing data.
            Err(keyring::Error::NoEntry) => {
                let key = DataKey::generate();
                entry
                    .set_password(&key.to_stored())
                    .map_err(|e| self.keyring_error(e))?;
                tracing::info!(service = %self.service, "generated new data key");
                Ok(key)
            }
            Err(err) => Err(self.keyring_error(err)),
        }
    }
}

/// Process-local key for tests and hosts without a keyring.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<DataKey>>>,
}

impl KeyProvider for InMemoryKeyProvider {
    fn get_or_create(&self) -> Result<DataKey, KeyError> {
        let mut guard = self.inner.lock().map_err(|_| KeyError::Poisoned)?;
        Ok(guard.get_or_insert_with(DataKey::generate).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_provider_returns_same_key() {
        let provider = InMemoryKeyProvider::default();
        let first = provider.get_or_create().expect("first");
        let second = provider.clone().get_or_create().expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn stored_form_rejects_wrong_length() {
        let err = DataKey::from_stored("abcd").expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Malformed(_)));
    }

    #[test]
    fn stored_form_decodes_to_same_key() {
        let key = DataKey::generate();
        let decoded = DataKey::from_stored(&format!("{}\n", key.to_stored())).expect("decode");
        assert_eq!(decoded, key);
    }

    #[test]
    fn debug_hides_key_bytes() {
        assert_eq!(format!("{:?}", DataKey::generate()), "DataKey(..)");
    }
}
