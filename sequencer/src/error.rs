//! Sequencer error taxonomy.
//!
//! Validation and lookup failures surface synchronously to callers. Chain
//! failures never do: they are classified (see [`crate::chain`]) and
//! resolved by the queue-processing loop, either by retrying on the next
//! wake-up or by consuming the nonce with a skip transaction.

use core_logic::{ConfigError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no wallets available: every managed address is disabled")]
    NoWalletsAvailable,

    #[error("wallet {address} has no persisted nonce state yet")]
    UninitializedWallet { address: String },

    #[error("no transaction at nonce {nonce} for wallet {address}")]
    TransactionNotFound { address: String, nonce: u64 },

    #[error("unmanaged wallet address: {address}")]
    UnknownWallet { address: String },

    #[error("failed to seed nonce state for {address}: {message}")]
    Bootstrap { address: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Keys(#[from] KeyError),
}

/// Rejected synchronously at submit time, before a nonce is assigned.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("missing required field 'to'")]
    MissingTo,

    #[error("invalid destination address '{value}'")]
    InvalidTo { value: String },

    #[error("invalid decimal integer for '{field}': '{value}'")]
    InvalidAmount { field: &'static str, value: String },

    #[error("invalid hex calldata: {reason}")]
    InvalidData { reason: String },

    #[error("both raw calldata and a function signature were supplied; pick one")]
    ConflictingCalldata,

    #[error("cannot encode '{signature}': {reason}")]
    AbiEncoding { signature: String, reason: String },
}

/// Signing-material loading errors.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("key file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read key file {path}: {msg}")]
    Io { path: String, msg: String },

    #[error("invalid private key at position {index}: {reason}")]
    InvalidKey { index: usize, reason: String },

    #[error("environment variable '{key}' not set")]
    MissingEnv { key: String },

    #[error("no signing keys configured")]
    Empty,
}
