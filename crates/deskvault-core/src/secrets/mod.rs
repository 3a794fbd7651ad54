//! Secret model shared by the stores: record types, audit records, the
//! encryption capability contract, and the secret-to-environment mapper.

pub mod audit;
pub mod crypto;
pub mod env_map;
pub mod types;

pub use audit::{AuditAction, AuditEntry, AuditResult, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use crypto::{CryptoError, MaskingCrypto, SecretCrypto, UnavailableCrypto};
pub use env_map::{env_name_for, map_secrets_to_server_env};
pub use types::{Backend, SecretMetadata, SecretRecord, SecretStatus};
