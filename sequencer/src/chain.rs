//! Chain client seam and failure classification.
//!
//! The actor never inspects error strings: the client returns a
//! [`ChainError`] whose kind decides between deferring the whole queue
//! (transient) and consuming the nonce with a skip (non-retriable). The
//! substring table is the fallback classifier for opaque transport errors.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use thiserror::Error;

/// Intrinsic gas of a plain value transfer; used for skip transactions.
pub const GAS_LIMIT_TRANSFER: u64 = 21_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainErrorKind {
    /// Resolved by retrying on a later wake-up without advancing.
    Transient,
    /// Will never succeed with these parameters; the nonce must be
    /// consumed by a skip to keep the sequence gapless.
    NonRetriable,
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ChainError {
    pub kind: ChainErrorKind,
    pub message: String,
}

impl ChainError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ChainErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn non_retriable(message: impl Into<String>) -> Self {
        Self {
            kind: ChainErrorKind::NonRetriable,
            message: message.into(),
        }
    }

    /// Classifies an opaque textual error via the pattern table.
    pub fn from_text(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_error_text(&message),
            message,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ChainErrorKind::Transient
    }
}

/// Fallback classifier for errors that reach us as bare text.
///
/// Anything matching the table resolves itself with time (congestion,
/// sync lag, fee spikes) and is retried in place; everything else is
/// treated as permanently rejected.
pub fn classify_error_text(message: &str) -> ChainErrorKind {
    let message = message.to_lowercase();

    const TRANSIENT_PATTERNS: &[&str] = &[
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "network error",
        "temporary failure",
        "service unavailable",
        "rate limit",
        "too many requests",
        "not synced",
        "still syncing",
        "max fee per gas less than block base fee",
        "transaction underpriced",
        "replacement transaction underpriced",
        "nonce too low",
        "already known",
        "busy",
    ];

    if TRANSIENT_PATTERNS.iter().any(|p| message.contains(p)) {
        ChainErrorKind::Transient
    } else {
        ChainErrorKind::NonRetriable
    }
}

/// Parameters for one submission attempt. The nonce is supplied
/// separately because the same parameters may be retried under the same
/// nonce across wake-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParams {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
}

impl TxParams {
    /// Zero-value transfer to self, used to consume a nonce that cannot
    /// otherwise complete.
    pub fn self_transfer(address: Address) -> Self {
        Self {
            from: address,
            to: address,
            value: U256::zero(),
            data: Bytes::new(),
            gas_limit: U256::from(GAS_LIMIT_TRANSFER),
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.from == self.to && self.value.is_zero() && self.data.is_empty()
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Count of confirmed transactions for `address` (the confirmed nonce
    /// watermark is this minus one).
    async fn confirmed_count(&self, address: Address) -> Result<u64, ChainError>;

    /// Signs and submits `params` under exactly `nonce`, returning the
    /// transaction hash without waiting for inclusion.
    async fn submit(&self, params: &TxParams, nonce: u64) -> Result<H256, ChainError>;

    async fn balance(&self, address: Address) -> Result<U256, ChainError>;
}
