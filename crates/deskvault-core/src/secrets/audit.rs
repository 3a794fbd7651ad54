//! Redacted audit records for secret operations.
//!
//! An entry identifies a secret only by its scope and a short hash of the key.
//! The raw key and the value never reach the sink.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

const KEY_ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upsert,
    Remove,
    Read,
    Error,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Upsert => "upsert",
            AuditAction::Remove => "remove",
            AuditAction::Read => "read",
            AuditAction::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Ok,
    Error,
}

impl AuditResult {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditResult::Ok => "ok",
            AuditResult::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub key_id: String,
    pub scope: String,
    pub result: AuditResult,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        key: &str,
        result: AuditResult,
        reason_code: Option<&str>,
    ) -> Self {
        Self {
            action,
            key_id: key_id(key),
            scope: scope_of(key).to_string(),
            result,
            timestamp: Utc::now(),
            reason_code: reason_code.map(str::to_string),
        }
    }

    /// Successful operation on `key`.
    pub fn ok(action: AuditAction, key: &str) -> Self {
        Self::new(action, key, AuditResult::Ok, None)
    }

    /// Failure tagged with a reason code.
    pub fn error(key: &str, reason_code: &str) -> Self {
        Self::new(AuditAction::Error, key, AuditResult::Error, Some(reason_code))
    }
}

/// Leading dot-delimited segment, or `"unknown"`.
pub fn scope_of(key: &str) -> &str {
    match key.split('.').next() {
        Some(first) if !first.is_empty() => first,
        _ => "unknown",
    }
}

/// Short SHA-256 prefix for correlating entries. Collisions are acceptable.
pub fn key_id(key: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    digest[..KEY_ID_LEN].to_string()
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
    fn emit(&self, entry: &AuditEntry);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn emit(&self, entry: &AuditEntry) {
        (**self).emit(entry)
    }
}

/// Writes each entry as a structured `secret_audit` tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, entry: &AuditEntry) {
        let reason = entry.reason_code.as_deref().unwrap_or("");
        match entry.result {
            AuditResult::Ok => info!(
                target: "secret_audit",
                action = entry.action.as_str(),
                key_id = %entry.key_id,
                scope = %entry.scope,
                result = entry.result.as_str(),
                timestamp = %entry.timestamp.to_rfc3339(),
                "secret_audit"
            ),
            AuditResult::Error => warn!(
                target: "secret_audit",
                action = entry.action.as_str(),
                key_id = %entry.key_id,
                scope = %entry.scope,
                result = entry.result.as_str(),
                reason_code = reason,
                timestamp = %entry.timestamp.to_rfc3339(),
                "secret_audit"
            ),
        }
    }
}

/// Keeps entries in memory for inspection in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    inner: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, entry: &AuditEntry) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.push(entry.clone());
        }
    }
}
