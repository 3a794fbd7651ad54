//! Core model for deskvault: application config normalization, secret types,
//! audit records, the secret-to-environment mapper, and the encryption contract.
//! This crate does no I/O so it stays easy to test.

pub mod config;
pub mod secrets;
