use super::{ExclusiveGuard, ExclusiveLocks, StateStore};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// SQLite-backed [`StateStore`].
///
/// A single `kv` table holds every persisted value. Batched writes run in
/// one transaction so a wallet's watermarks and records land atomically.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    metrics: Arc<StoreMetrics>,
    locks: ExclusiveLocks,
}

#[derive(Debug, Default)]
struct StoreMetrics {
    total_reads: AtomicU64,
    total_writes: AtomicU64,
    total_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreMetricsSnapshot {
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_errors: u64,
}

impl SqliteStore {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path).map_err(|e| StoreError::Backend {
                msg: format!("failed to create {}: {}", db_path, e),
            })?;
            info!("Created new database file: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await?;

        let store = Self {
            pool,
            metrics: Arc::new(StoreMetrics::default()),
            locks: ExclusiveLocks::default(),
        };
        store.init_schema().await?;
        info!(
            "State store initialized with pool size {} (WAL mode)",
            Self::DEFAULT_MAX_CONNECTIONS
        );
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            total_reads: self.metrics.total_reads.load(Ordering::Relaxed),
            total_writes: self.metrics.total_writes.load(Ordering::Relaxed),
            total_errors: self.metrics.total_errors.load(Ordering::Relaxed),
        }
    }

    fn record<T>(&self, counter: &AtomicU64, result: Result<T, sqlx::Error>) -> Result<T, StoreError> {
        match result {
            Ok(v) => {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(v)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await;
        self.record(&self.metrics.total_reads, result)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map(|_| ());
        self.record(&self.metrics.total_writes, result)
    }

    async fn put_batch(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        let result: Result<(), sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            for (key, value) in entries {
                sqlx::query(
                    "INSERT INTO kv (key, value) VALUES (?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        }
        .await;
        self.record(&self.metrics.total_writes, result)
    }

    async fn lock_exclusive(&self, key: &str) -> ExclusiveGuard {
        self.locks.acquire(key).await
    }
}
