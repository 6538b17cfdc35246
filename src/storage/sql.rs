// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL document store (SQLite or MySQL).
//!
//! Each record is one row; the value is stored as JSON text:
//! ```sql
//! CREATE TABLE recondb_records (
//!   seq BIGINT AUTO_INCREMENT,           -- insertion order, MySQL only
//!   record_key VARCHAR(255) PRIMARY KEY, -- Key::MAX_LEN characters
//!   record_value LONGTEXT NOT NULL,      -- JSON as text
//!   updated_at BIGINT NOT NULL           -- epoch millis of last save
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! We use TEXT instead of a native JSON type because sqlx's `Any` driver
//! doesn't map MySQL's JSON type, and it hands LONGTEXT back as bytes on
//! MySQL (read as `Vec<u8>` then convert).
//!
//! `save` is a single-statement upsert, so concurrent saves for the same key
//! can never create two rows.

use async_trait::async_trait;
use sqlx::{AnyPool, Row, any::AnyPoolOptions};
use sqlx::any::AnyRow;
use crate::record::{Key, Record};
use super::traits::{DocumentStore, StorageError};
use crate::resilience::retry::{retry, RetryConfig};
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]` is accepted.
#[must_use]
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Connection options for [`SqlStore`].
#[derive(Debug, Clone)]
pub struct SqlStoreOptions {
    pub collection: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for SqlStoreOptions {
    fn default() -> Self {
        Self {
            collection: "recondb_records".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

pub struct SqlStore {
    pool: AnyPool,
    is_sqlite: bool,
    collection: String,
}

impl SqlStore {
    /// Connect with startup-mode retry (fails fast if config is wrong) and
    /// create the collection table if missing.
    pub async fn new(connection_string: &str, options: SqlStoreOptions) -> Result<Self, StorageError> {
        if !is_valid_collection_name(&options.collection) {
            return Err(StorageError::Backend(format!(
                "Invalid collection name '{}'",
                options.collection
            )));
        }

        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.acquire_timeout)
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self {
            pool,
            is_sqlite,
            collection: options.collection,
        };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        info!(collection = %store.collection, sqlite = is_sqlite, "SQL document store ready");
        Ok(store)
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Enable WAL journaling for SQLite so readers don't block the writer.
    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    record_key TEXT NOT NULL UNIQUE,
                    record_value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
                self.collection
            )
        } else {
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    seq BIGINT NOT NULL AUTO_INCREMENT UNIQUE,
                    record_key VARCHAR(255) PRIMARY KEY,
                    record_value LONGTEXT NOT NULL,
                    updated_at BIGINT NOT NULL,
                    INDEX idx_updated_at (updated_at)
                )
                "#,
                self.collection
            )
        };

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }

    fn upsert_sql(&self) -> String {
        if self.is_sqlite {
            format!(
                "INSERT INTO {} (record_key, record_value, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(record_key) DO UPDATE SET \
                    record_value = excluded.record_value, \
                    updated_at = excluded.updated_at",
                self.collection
            )
        } else {
            format!(
                "INSERT INTO {} (record_key, record_value, updated_at) VALUES (?, ?, ?) \
                 ON DUPLICATE KEY UPDATE \
                    record_value = VALUES(record_value), \
                    updated_at = VALUES(updated_at)",
                self.collection
            )
        }
    }

    /// Read a TEXT column: String on SQLite, bytes on MySQL LONGTEXT.
    fn text_column(row: &AnyRow, column: &str) -> Option<String> {
        row.try_get::<String, _>(column).ok().or_else(|| {
            row.try_get::<Vec<u8>, _>(column)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
    }

    fn row_to_record(row: &AnyRow) -> Result<Record, StorageError> {
        let raw_key = Self::text_column(row, "record_key").unwrap_or_default();
        let key = Key::new(raw_key).map_err(|e| StorageError::Malformed {
            key: String::new(),
            reason: e.to_string(),
        })?;

        let raw_value = Self::text_column(row, "record_value").ok_or_else(|| StorageError::Malformed {
            key: key.to_string(),
            reason: "missing value column".to_string(),
        })?;

        let value = serde_json::from_str(&raw_value).map_err(|e| StorageError::Malformed {
            key: key.to_string(),
            reason: format!("value is not JSON: {}", e),
        })?;

        Ok(Record::new(key, value))
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[async_trait]
impl DocumentStore for SqlStore {
    async fn find_all(&self) -> Result<Vec<Record>, StorageError> {
        let sql = format!(
            "SELECT record_key, record_value FROM {} ORDER BY updated_at, seq",
            self.collection
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(Self::row_to_record(row)?);
        }
        debug!(count = records.len(), "Fetched all records");
        Ok(records)
    }

    async fn find_one(&self, key: &Key) -> Result<Option<Record>, StorageError> {
        let sql = format!(
            "SELECT record_key, record_value FROM {} WHERE record_key = ?",
            self.collection
        );
        let row = sqlx::query(&sql)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn save(&self, record: &Record) -> Result<(), StorageError> {
        let value = serde_json::to_string(&record.value).map_err(|e| StorageError::Malformed {
            key: record.key.to_string(),
            reason: e.to_string(),
        })?;

        sqlx::query(&self.upsert_sql())
            .bind(record.key.as_str())
            .bind(value)
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<bool, StorageError> {
        let sql = format!("DELETE FROM {} WHERE record_key = ?", self.collection);
        let result = sqlx::query(&sql)
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", self.collection);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(total as u64)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
