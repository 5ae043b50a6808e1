//! Durable key-value storage.
//!
//! Every piece of sequencer state (nonce watermarks, transaction records,
//! pool cursor, disabled set) is a JSON value under a string key. The store
//! also provides the one blocking primitive the sequencer needs: an
//! exclusive section keyed by name, used to make first-access
//! initialization happen exactly once across concurrent callers.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreMetricsSnapshot};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard for a named exclusive section. The section is held until the
/// guard is dropped.
pub type ExclusiveGuard = OwnedMutexGuard<()>;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes all entries atomically. Used wherever a watermark and the
    /// record it covers must land together.
    async fn put_batch(&self, entries: &[(String, String)]) -> Result<(), StoreError>;

    /// Enters the exclusive section named `key`, waiting if another caller
    /// holds it.
    async fn lock_exclusive(&self, key: &str) -> ExclusiveGuard;
}

pub fn encode_json<T: Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        msg: e.to_string(),
    })
}

pub fn decode_json<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        msg: e.to_string(),
    })
}

/// Per-key async mutexes backing [`StateStore::lock_exclusive`].
///
/// Lock objects are created on first use and never removed; the key space
/// is bounded by the number of managed wallets.
#[derive(Debug, Default)]
pub(crate) struct ExclusiveLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ExclusiveLocks {
    pub(crate) async fn acquire(&self, key: &str) -> ExclusiveGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
