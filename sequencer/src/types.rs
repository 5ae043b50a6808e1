//! Shared request/response and state types.

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Key for a scheduled wake-up: one per wallet plus the pool singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeKey {
    Wallet(Address),
    PoolRefresh,
}

/// A transaction submission as it arrives from a caller.
///
/// Calldata comes either from raw hex `data` or from
/// `function_signature` + `function_args`; supplying both is rejected at
/// validation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitRequest {
    pub to: Option<String>,
    /// Decimal wei string; defaults to zero.
    pub value: Option<String>,
    /// Raw hex calldata, with or without a `0x` prefix.
    pub data: Option<String>,
    /// Human-readable signature, e.g. `transfer(address,uint256)`.
    pub function_signature: Option<String>,
    pub function_args: Option<Vec<serde_json::Value>>,
    /// Decimal gas limit; the configured default applies when absent.
    pub gas_limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub nonce: u64,
    pub status: TxStatus,
}

/// Lifecycle of a transaction record. `Confirmed` is inferred from the
/// confirmed watermark and never stored; `Skipped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Submitted,
    Confirmed,
    Skipped,
}

/// The three per-wallet nonce watermarks.
///
/// `submitted_nonce` and `confirmed_nonce` are -1 until a transaction has
/// reached that stage. Invariant:
/// `confirmed_nonce <= submitted_nonce <= pending_nonce - 1`, and all
/// three only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceState {
    /// Next nonce to hand out to a submission.
    pub pending_nonce: u64,
    /// Highest nonce handed to the chain client.
    pub submitted_nonce: i64,
    /// Highest nonce the ledger reports settled.
    pub confirmed_nonce: i64,
}

impl NonceState {
    /// Seeds fresh state from the ledger's confirmed transaction count.
    pub fn bootstrap(confirmed_count: u64) -> Self {
        let confirmed = confirmed_count as i64 - 1;
        Self {
            pending_nonce: confirmed_count,
            submitted_nonce: confirmed,
            confirmed_nonce: confirmed,
        }
    }

    /// Hands out the next nonce and advances the pending watermark.
    pub fn assign(&mut self) -> u64 {
        let nonce = self.pending_nonce;
        self.pending_nonce += 1;
        nonce
    }

    /// Nonces assigned but not yet confirmed.
    pub fn queue_depth(&self) -> u64 {
        (self.pending_nonce as i64 - 1 - self.confirmed_nonce).max(0) as u64
    }

    /// Nonces submitted but not yet confirmed.
    pub fn in_flight(&self) -> u64 {
        (self.submitted_nonce - self.confirmed_nonce).max(0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
    pub pending_nonce: u64,
    pub submitted_nonce: i64,
    pub confirmed_nonce: i64,
    pub queue_depth: u64,
    pub in_flight: u64,
}

impl From<NonceState> for WalletStatus {
    fn from(state: NonceState) -> Self {
        Self {
            pending_nonce: state.pending_nonce,
            submitted_nonce: state.submitted_nonce,
            confirmed_nonce: state.confirmed_nonce,
            queue_depth: state.queue_depth(),
            in_flight: state.in_flight(),
        }
    }
}

/// One record per assigned nonce, append-only. Identity fields never
/// change after creation; only `hash` and `error` are annotated later, and
/// only by the owning actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
    pub hash: Option<H256>,
    pub error: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl TransactionRecord {
    pub fn status(&self, nonce: u64, confirmed_nonce: i64) -> TxStatus {
        if self.error.is_some() {
            TxStatus::Skipped
        } else if (nonce as i64) <= confirmed_nonce {
            TxStatus::Confirmed
        } else if self.hash.is_some() {
            TxStatus::Submitted
        } else {
            TxStatus::Pending
        }
    }
}

/// A [`TransactionRecord`] as returned to callers, with the derived status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
    pub hash: Option<H256>,
    pub error: Option<String>,
    pub created_at: i64,
    pub status: TxStatus,
}

impl TransactionView {
    pub fn new(nonce: u64, record: TransactionRecord, confirmed_nonce: i64) -> Self {
        let status = record.status(nonce, confirmed_nonce);
        Self {
            nonce,
            to: record.to,
            value: record.value,
            data: record.data,
            gas_limit: record.gas_limit,
            hash: record.hash,
            error: record.error,
            created_at: record.created_at,
            status,
        }
    }
}
