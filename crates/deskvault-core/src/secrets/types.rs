use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::audit::scope_of;

/// Where secrets currently live.
///
/// A store starts in `Keychain` only if the encryption capability was
/// available at construction. The one allowed transition is
/// `Keychain -> FallbackEnvFile`; nothing moves it back within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Keychain,
    FallbackEnvFile,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Keychain => "keychain",
            Backend::FallbackEnvFile => "fallback_env_file",
        }
    }

    /// Move to the fallback backend. Returns `true` only on the transition
    /// itself, so callers audit it once.
    pub fn degrade(&mut self) -> bool {
        match self {
            Backend::Keychain => {
                *self = Backend::FallbackEnvFile;
                true
            }
            Backend::FallbackEnvFile => false,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored secret. The value is redacted from `Debug` output.
#[derive(Debug)]
pub struct SecretRecord {
    value: SecretString,
    pub updated_at: DateTime<Utc>,
}

impl SecretRecord {
    pub fn new(value: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            value: SecretString::new(value.into()),
            updated_at,
        }
    }

    /// Borrow the raw value. Only the persistence and env paths should call this.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }
}

/// Listing view of a secret; never carries the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
    pub key: String,
    pub scope: String,
    pub has_value: bool,
    pub updated_at: DateTime<Utc>,
}

impl SecretMetadata {
    pub fn from_record(key: &str, record: &SecretRecord) -> Self {
        Self {
            key: key.to_string(),
            scope: scope_of(key).to_string(),
            has_value: !record.expose().is_empty(),
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretStatus {
    pub backend: Backend,
    pub initialized: bool,
}
