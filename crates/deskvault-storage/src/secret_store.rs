use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use deskvault_core::secrets::{
    AuditAction, AuditEntry, AuditSink, Backend, CryptoError, SecretCrypto, SecretMetadata,
    SecretRecord, SecretStatus, TracingAuditSink,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{atomic::write_atomic, env_file};

/// Encrypted blob written while the keychain backend is active.
pub const ENCRYPTED_FILE: &str = "secrets.enc";
/// Flat fallback file (see [`env_file`]).
pub const FALLBACK_FILE: &str = "secrets.env";

/// Pseudo-key used to audit backend-level events.
const STORAGE_AUDIT_KEY: &str = "storage";

/// Rejected mutation; nothing was persisted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("secret key must not be empty")]
    EmptyKey,
    #[error("secret value must not be empty")]
    EmptyValue,
}

impl ValidationError {
    pub fn reason_code(self) -> &'static str {
        match self {
            ValidationError::EmptyKey => "key_empty",
            ValidationError::EmptyValue => "value_empty",
        }
    }
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The fallback file itself could not be read or written.
    #[error("secret storage io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why the keychain backend was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeychainFailure {
    CapabilityUnavailable,
    DecryptFailed,
    EncryptFailed,
    PayloadMalformed,
    BlobReadFailed,
    BlobWriteFailed,
}

impl KeychainFailure {
    fn reason_code(self) -> &'static str {
        match self {
            KeychainFailure::CapabilityUnavailable => "capability_unavailable",
            KeychainFailure::DecryptFailed => "decrypt_failed",
            KeychainFailure::EncryptFailed => "encrypt_failed",
            KeychainFailure::PayloadMalformed => "payload_malformed",
            KeychainFailure::BlobReadFailed => "blob_read_failed",
            KeychainFailure::BlobWriteFailed => "blob_write_failed",
        }
    }
}

impl From<CryptoError> for KeychainFailure {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Unavailable { .. } => KeychainFailure::CapabilityUnavailable,
            CryptoError::Encrypt { .. } => KeychainFailure::EncryptFailed,
            CryptoError::Decrypt { .. } => KeychainFailure::DecryptFailed,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord<'a> {
    value: &'a str,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StoredState<'a> {
    records: BTreeMap<&'a str, StoredRecord<'a>>,
}

/// Per-key secrets persisted behind an encryption capability.
///
/// The backend starts as [`Backend::Keychain`] when the capability is
/// available and drops to [`Backend::FallbackEnvFile`] on the first keychain
/// failure, for the rest of the process. Degradation is never an error for
/// the caller; it is audited instead.
pub struct SecretStore<C: SecretCrypto> {
    encrypted_file: PathBuf,
    fallback_file: PathBuf,
    crypto: C,
    audit: Arc<dyn AuditSink>,
    backend: Backend,
    records: BTreeMap<String, SecretRecord>,
}

impl<C: SecretCrypto> SecretStore<C> {
    /// Open the store in `dir`, auditing through `tracing`.
    pub fn open(dir: impl AsRef<Path>, crypto: C) -> Result<Self, SecretStoreError> {
        Self::open_with_audit(dir, crypto, Arc::new(TracingAuditSink))
    }

    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open_with_audit(
        dir: impl AsRef<Path>,
        crypto: C,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, SecretStoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| SecretStoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let backend = if crypto.is_available() {
            Backend::Keychain
        } else {
            Backend::FallbackEnvFile
        };
        debug!(%backend, "secret store backend selected");

        let mut store = Self {
            encrypted_file: dir.join(ENCRYPTED_FILE),
            fallback_file: dir.join(FALLBACK_FILE),
            crypto,
            audit,
            backend,
            records: BTreeMap::new(),
        };
        store.records = store.load_state()?;
        Ok(store)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn get_status(&self) -> SecretStatus {
        SecretStatus {
            backend: self.backend,
            initialized: !self.records.is_empty(),
        }
    }

    /// Metadata for every secret, sorted by key.
    pub fn list_metadata(&self) -> Vec<SecretMetadata> {
        self.records
            .iter()
            .map(|(key, record)| SecretMetadata::from_record(key, record))
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key.trim())
    }

    /// Raw values for materializing the backend environment. Never hand this
    /// map to the UI.
    pub fn get_all_secrets(&self) -> BTreeMap<String, String> {
        self.audit
            .emit(&AuditEntry::ok(AuditAction::Read, STORAGE_AUDIT_KEY));
        self.records
            .iter()
            .map(|(key, record)| (key.clone(), record.expose().to_string()))
            .collect()
    }

    #[instrument(skip_all)]
    pub fn upsert(&mut self, key: &str, value: &str) -> Result<(), SecretStoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(self.reject(key, ValidationError::EmptyKey));
        }
        if value.is_empty() {
            return Err(self.reject(key, ValidationError::EmptyValue));
        }

        let previous = self
            .records
            .insert(key.to_string(), SecretRecord::new(value, Utc::now()));
        if let Err(err) = self.save_state() {
            match previous {
                Some(record) => self.records.insert(key.to_string(), record),
                None => self.records.remove(key),
            };
            return Err(err);
        }
        self.audit.emit(&AuditEntry::ok(AuditAction::Upsert, key));
        Ok(())
    }

    /// Delete `key`; absent keys are a no-op.
    #[instrument(skip_all)]
    pub fn remove(&mut self, key: &str) -> Result<(), SecretStoreError> {
        let key = key.trim();
        let Some(removed) = self.records.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.save_state() {
            self.records.insert(key.to_string(), removed);
            return Err(err);
        }
        self.audit.emit(&AuditEntry::ok(AuditAction::Remove, key));
        Ok(())
    }

    fn reject(&self, key: &str, err: ValidationError) -> SecretStoreError {
        self.audit.emit(&AuditEntry::error(key, err.reason_code()));
        err.into()
    }

    fn degrade(&mut self, failure: KeychainFailure) {
        if self.backend.degrade() {
            warn!(
                reason = failure.reason_code(),
                "keychain backend failed, switching to fallback file"
            );
            self.audit
                .emit(&AuditEntry::error(STORAGE_AUDIT_KEY, failure.reason_code()));
        }
    }

    fn load_state(&mut self) -> Result<BTreeMap<String, SecretRecord>, SecretStoreError> {
        if self.backend == Backend::Keychain {
            match self.load_keychain() {
                Ok(records) => return Ok(records),
                Err(failure) => self.degrade(failure),
            }
        }
        self.load_fallback()
    }

    fn load_keychain(&self) -> Result<BTreeMap<String, SecretRecord>, KeychainFailure> {
        let sealed = match fs::read_to_string(&self.encrypted_file) {
            Ok(sealed) => sealed,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                debug!("encrypted secrets unreadable: {err}");
                return Err(KeychainFailure::BlobReadFailed);
            }
        };
        let sealed = sealed.trim();
        if sealed.is_empty() {
            return Ok(BTreeMap::new());
        }

        let plaintext = self.crypto.decrypt(sealed)?;
        let payload: Value =
            serde_json::from_str(&plaintext).map_err(|_| KeychainFailure::PayloadMalformed)?;
        records_from_payload(&payload).ok_or(KeychainFailure::PayloadMalformed)
    }

    fn load_fallback(&mut self) -> Result<BTreeMap<String, SecretRecord>, SecretStoreError> {
        let contents = match fs::read_to_string(&self.fallback_file) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!("fallback secrets file is not valid UTF-8, starting empty");
                self.audit
                    .emit(&AuditEntry::error(STORAGE_AUDIT_KEY, "fallback_malformed"));
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(SecretStoreError::Io {
                    path: self.fallback_file.clone(),
                    source,
                })
            }
        };

        let now = Utc::now();
        Ok(env_file::parse(&contents)
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key, SecretRecord::new(value, now)))
            .collect())
    }

    fn save_state(&mut self) -> Result<(), SecretStoreError> {
        if self.backend == Backend::Keychain {
            match self.write_keychain() {
                Ok(()) => return Ok(()),
                // The write is finished through the fallback file below.
                Err(failure) => self.degrade(failure),
            }
        }
        self.write_fallback()
    }

    fn write_keychain(&self) -> Result<(), KeychainFailure> {
        if !self.crypto.is_available() {
            return Err(KeychainFailure::CapabilityUnavailable);
        }
        let state = StoredState {
            records: self
                .records
                .iter()
                .map(|(key, record)| {
                    (
                        key.as_str(),
                        StoredRecord {
                            value: record.expose(),
                            updated_at: record.updated_at,
                        },
                    )
                })
                .collect(),
        };
        let serialized =
            serde_json::to_string(&state).map_err(|_| KeychainFailure::PayloadMalformed)?;
        let sealed = self.crypto.encrypt(&serialized)?;
        write_atomic(&self.encrypted_file, sealed.as_bytes()).map_err(|err| {
            debug!("encrypted secrets write failed: {err}");
            KeychainFailure::BlobWriteFailed
        })
    }

    fn write_fallback(&self) -> Result<(), SecretStoreError> {
        let contents = env_file::render(
            self.records
                .iter()
                .map(|(key, record)| (key.as_str(), record.expose())),
        );
        write_atomic(&self.fallback_file, contents.as_bytes()).map_err(|source| {
            SecretStoreError::Io {
                path: self.fallback_file.clone(),
                source,
            }
        })
    }
}

/// Decode `{"records": {key: {"value", "updatedAt"}}}`. Bad entries are
/// skipped; a payload without a records object is malformed.
fn records_from_payload(payload: &Value) -> Option<BTreeMap<String, SecretRecord>> {
    let records = payload.get("records")?.as_object()?;
    let now = Utc::now();
    let mut out = BTreeMap::new();
    for (key, raw) in records {
        let key = key.trim();
        let Some(value) = raw.get("value").and_then(Value::as_str) else {
            continue;
        };
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let updated_at = raw
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or(now);
        out.insert(key.to_string(), SecretRecord::new(value, updated_at));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use deskvault_core::secrets::{
        AuditResult, MaskingCrypto, MemoryAuditSink, UnavailableCrypto,
    };

    use super::*;

    /// Masking crypto whose availability and decryption can be switched off.
    #[derive(Default)]
    struct FlakyCrypto {
        unavailable: AtomicBool,
        broken_encrypt: AtomicBool,
        broken_decrypt: AtomicBool,
    }

    impl FlakyCrypto {
        fn broken_decrypt() -> Self {
            let crypto = Self::default();
            crypto.broken_decrypt.store(true, Ordering::SeqCst);
            crypto
        }
    }

    impl SecretCrypto for FlakyCrypto {
        fn is_available(&self) -> bool {
            !self.unavailable.load(Ordering::SeqCst)
        }

        fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
            if self.broken_encrypt.load(Ordering::SeqCst) {
                return Err(CryptoError::Encrypt {
                    reason: "cipher refused".into(),
                });
            }
            MaskingCrypto.encrypt(plaintext)
        }

        fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
            if self.broken_decrypt.load(Ordering::SeqCst) {
                return Err(CryptoError::Decrypt {
                    reason: "bad blob".into(),
                });
            }
            MaskingCrypto.decrypt(ciphertext)
        }
    }

    fn error_entries(sink: &MemoryAuditSink) -> Vec<AuditEntry> {
        sink.entries()
            .into_iter()
            .filter(|e| e.result == AuditResult::Error)
            .collect()
    }

    #[test]
    fn upsert_then_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = SecretStore::open(dir.path(), MaskingCrypto).expect("open");

        store.upsert("provider.openai.api_key", "sk-1").expect("upsert");
        assert_eq!(
            store.get_all_secrets().get("provider.openai.api_key").map(String::as_str),
            Some("sk-1")
        );
        assert!(store.get_status().initialized);

        store.remove("provider.openai.api_key").expect("remove");
        assert!(!store.get_all_secrets().contains_key("provider.openai.api_key"));
        assert!(!store.get_status().initialized);
    }

    #[test]
    fn keychain_backend_persists_encrypted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut first = SecretStore::open(dir.path(), MaskingCrypto).expect("open");
        first.upsert("provider.openai.api_key", "secret-1").expect("upsert");
        assert_eq!(first.backend(), Backend::Keychain);

        let blob = fs::read_to_string(dir.path().join(ENCRYPTED_FILE)).expect("blob");
        assert!(!blob.contains("secret-1"));
        assert!(!dir.path().join(FALLBACK_FILE).exists());

        let second = SecretStore::open(dir.path(), MaskingCrypto).expect("reopen");
        assert_eq!(second.get_all_secrets()["provider.openai.api_key"], "secret-1");
    }

    #[test]
    fn unavailable_capability_uses_fallback_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = SecretStore::open(dir.path(), UnavailableCrypto).expect("open");
        assert_eq!(store.get_status().backend, Backend::FallbackEnvFile);

        store.upsert("mcp.system.token", "token-1").expect("upsert");
        let contents = fs::read_to_string(dir.path().join(FALLBACK_FILE)).expect("fallback");
        assert!(contents.starts_with(env_file::SECRET_ENV_PREFIX));
        assert!(!contents.contains("mcp.system.token"));

        let second = SecretStore::open(dir.path(), UnavailableCrypto).expect("reopen");
        assert_eq!(second.get_all_secrets()["mcp.system.token"], "token-1");
    }

    #[test]
    fn unreadable_blob_degrades_once_and_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut seed = SecretStore::open(dir.path(), MaskingCrypto).expect("seed");
            seed.upsert("provider.openai.api_key", "sk").expect("upsert");
        }

        let sink = MemoryAuditSink::new();
        let store = SecretStore::open_with_audit(
            dir.path(),
            FlakyCrypto::broken_decrypt(),
            Arc::new(sink.clone()),
        )
        .expect("open");

        assert!(store.get_all_secrets().is_empty());
        assert_eq!(store.get_status().backend, Backend::FallbackEnvFile);
        let errors = error_entries(&sink);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason_code.as_deref(), Some("decrypt_failed"));
        assert_eq!(errors[0].scope, "storage");
    }

    #[test]
    fn malformed_payload_degrades() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sealed = MaskingCrypto.encrypt("[1,2,3]").expect("encrypt");
        fs::write(dir.path().join(ENCRYPTED_FILE), sealed).expect("seed");

        let sink = MemoryAuditSink::new();
        let store =
            SecretStore::open_with_audit(dir.path(), MaskingCrypto, Arc::new(sink.clone()))
                .expect("open");
        assert_eq!(store.backend(), Backend::FallbackEnvFile);
        assert_eq!(
            error_entries(&sink)[0].reason_code.as_deref(),
            Some("payload_malformed")
        );
    }

    #[test]
    fn capability_loss_during_write_switches_to_fallback_without_losing_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let crypto = Arc::new(FlakyCrypto::default());
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), crypto.clone(), Arc::new(sink.clone()))
                .expect("open");
        store.upsert("sftp.password", "one").expect("upsert");
        assert_eq!(store.backend(), Backend::Keychain);

        crypto.unavailable.store(true, Ordering::SeqCst);
        store.upsert("sftp.user", "two").expect("upsert survives degradation");
        assert_eq!(store.backend(), Backend::FallbackEnvFile);

        // Capability comes back; the store does not.
        crypto.unavailable.store(false, Ordering::SeqCst);
        store.upsert("sftp.host", "three").expect("upsert");
        assert_eq!(store.backend(), Backend::FallbackEnvFile);

        let errors = error_entries(&sink);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason_code.as_deref(), Some("capability_unavailable"));

        let parsed =
            env_file::parse(&fs::read_to_string(dir.path().join(FALLBACK_FILE)).expect("read"));
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["sftp.password"], "one");
    }

    fn fallback_records(dir: &Path) -> BTreeMap<String, String> {
        env_file::parse(&fs::read_to_string(dir.join(FALLBACK_FILE)).expect("read fallback"))
    }

    #[test]
    fn encrypt_failure_completes_write_through_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let crypto = Arc::new(FlakyCrypto::default());
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), crypto.clone(), Arc::new(sink.clone()))
                .expect("open");

        crypto.broken_encrypt.store(true, Ordering::SeqCst);
        store.upsert("provider.openai.api_key", "sk").expect("upsert");
        store.upsert("sftp.password", "pw").expect("second upsert");

        assert_eq!(store.backend(), Backend::FallbackEnvFile);
        let errors = error_entries(&sink);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason_code.as_deref(), Some("encrypt_failed"));

        let parsed = fallback_records(dir.path());
        assert_eq!(parsed["provider.openai.api_key"], "sk");
        assert_eq!(parsed["sftp.password"], "pw");
    }

    #[test]
    fn blocked_blob_write_completes_through_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), MaskingCrypto, Arc::new(sink.clone()))
                .expect("open");
        assert_eq!(store.backend(), Backend::Keychain);
        fs::create_dir(dir.path().join(ENCRYPTED_FILE)).expect("block blob");

        store.upsert("server.secret_key", "abc").expect("upsert");

        assert_eq!(store.backend(), Backend::FallbackEnvFile);
        let errors = error_entries(&sink);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason_code.as_deref(), Some("blob_write_failed"));
        assert_eq!(fallback_records(dir.path())["server.secret_key"], "abc");
    }

    #[test]
    fn unreadable_blob_path_degrades_at_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(ENCRYPTED_FILE)).expect("block blob");

        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), MaskingCrypto, Arc::new(sink.clone()))
                .expect("open");

        assert_eq!(store.backend(), Backend::FallbackEnvFile);
        let errors = error_entries(&sink);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason_code.as_deref(), Some("blob_read_failed"));

        store.upsert("sftp.password", "pw").expect("upsert");
        assert_eq!(fallback_records(dir.path())["sftp.password"], "pw");
    }

    #[test]
    fn failed_upsert_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), UnavailableCrypto, Arc::new(sink.clone()))
                .expect("open");
        fs::create_dir(dir.path().join(FALLBACK_FILE)).expect("block fallback");

        let err = store.upsert("server.secret_key", "abc").expect_err("write fails");
        assert!(matches!(err, SecretStoreError::Io { .. }));

        assert!(!store.contains("server.secret_key"));
        assert!(!store.get_status().initialized);
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn failed_overwrite_keeps_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = SecretStore::open(dir.path(), UnavailableCrypto).expect("open");
        store.upsert("sftp.password", "old").expect("seed");

        fs::remove_file(dir.path().join(FALLBACK_FILE)).expect("drop fallback");
        fs::create_dir(dir.path().join(FALLBACK_FILE)).expect("block fallback");

        assert!(store.upsert("sftp.password", "new").is_err());
        assert_eq!(store.get_all_secrets()["sftp.password"], "old");

        assert!(store.remove("sftp.password").is_err());
        assert!(store.contains("sftp.password"));
    }

    #[test]
    fn empty_key_or_value_is_rejected_before_persisting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), UnavailableCrypto, Arc::new(sink.clone()))
                .expect("open");

        let err = store.upsert("   ", "v").expect_err("empty key");
        assert!(matches!(
            err,
            SecretStoreError::Validation(ValidationError::EmptyKey)
        ));
        let err = store.upsert("server.secret_key", "").expect_err("empty value");
        assert!(matches!(
            err,
            SecretStoreError::Validation(ValidationError::EmptyValue)
        ));

        assert!(!dir.path().join(FALLBACK_FILE).exists());
        let reasons: Vec<_> = error_entries(&sink)
            .into_iter()
            .filter_map(|e| e.reason_code)
            .collect();
        assert_eq!(reasons, vec!["key_empty", "value_empty"]);
    }

    #[test]
    fn keys_are_trimmed_and_listing_is_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = SecretStore::open(dir.path(), MaskingCrypto).expect("open");
        store.upsert("  sftp.key ", "b").expect("upsert");
        store.upsert("provider.x.key", "a").expect("upsert");

        let keys: Vec<_> = store.list_metadata().into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["provider.x.key", "sftp.key"]);
        assert!(store.contains("sftp.key"));

        store.remove(" sftp.key").expect("remove");
        assert!(!store.contains("sftp.key"));
    }

    #[test]
    fn remove_of_absent_key_is_silent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), UnavailableCrypto, Arc::new(sink.clone()))
                .expect("open");
        store.remove("missing.key").expect("remove");
        assert!(sink.entries().is_empty());
        assert!(!dir.path().join(FALLBACK_FILE).exists());
    }

    #[test]
    fn audit_never_sees_raw_key_or_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = MemoryAuditSink::new();
        let mut store =
            SecretStore::open_with_audit(dir.path(), MaskingCrypto, Arc::new(sink.clone()))
                .expect("open");
        store.upsert("provider.openai.api_key", "sk-live").expect("upsert");
        store.get_all_secrets();
        store.remove("provider.openai.api_key").expect("remove");

        let dump = serde_json::to_string(&sink.entries()).expect("serialize");
        assert!(!dump.contains("api_key"));
        assert!(!dump.contains("sk-live"));
        let actions: Vec<_> = sink.entries().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Upsert, AuditAction::Read, AuditAction::Remove]
        );
    }
}
