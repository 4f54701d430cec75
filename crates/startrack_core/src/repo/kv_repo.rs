//! Key-value repository contracts with SQLite and in-memory backends.
//!
//! # Responsibility
//! - Provide get/set/remove over string keys and string values.
//! - Enforce a total-size quota comparable to browser local storage.
//!
//! # Invariants
//! - Quota accounting covers every stored key and value, in bytes.
//! - A rejected write never modifies stored data.

use crate::db::DbError;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default total quota, matching common browser local storage limits.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence failure. In-memory state stays authoritative when this occurs.
#[derive(Debug)]
pub enum StorageError {
    /// Write would push the store past its quota.
    QuotaExceeded {
        attempted_bytes: u64,
        quota_bytes: u64,
    },
    /// State could not be encoded.
    SerializationFailure(String),
    /// Storage engine failure other than running out of space.
    Backend(DbError),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded {
                attempted_bytes,
                quota_bytes,
            } => write!(
                f,
                "storage quota exceeded: {attempted_bytes} bytes needed, {quota_bytes} allowed"
            ),
            Self::SerializationFailure(message) => write!(f, "failed to serialize state: {message}"),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            Self::QuotaExceeded { .. } | Self::SerializationFailure(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Backend(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Backend(DbError::Sqlite(value))
    }
}

impl StorageError {
    /// Stable short code for log lines and adapter envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::SerializationFailure(_) => "serialization_failure",
            Self::Backend(_) => "backend",
        }
    }
}

/// Repository interface for the local key-value store.
pub trait KvRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<T: KvRepository + ?Sized> KvRepository for &T {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

/// SQLite-backed key-value repository over the `kv_entries` table.
pub struct SqliteKvRepository<'conn> {
    conn: &'conn Connection,
    quota_bytes: u64,
}

impl<'conn> SqliteKvRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_quota(conn, DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(conn: &'conn Connection, quota_bytes: u64) -> Self {
        Self { conn, quota_bytes }
    }

    fn bytes_excluding(&self, key: &str) -> StorageResult<u64> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv_entries
             WHERE key != ?1;",
            [key],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(used).unwrap_or(0))
    }
}

impl KvRepository for SqliteKvRepository<'_> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let attempted_bytes = self.bytes_excluding(key)? + entry_bytes(key, value);
        if attempted_bytes > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                attempted_bytes,
                quota_bytes: self.quota_bytes,
            });
        }

        let result = self.conn.execute(
            "INSERT INTO kv_entries (key, value)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::DiskFull => {
                Err(StorageError::QuotaExceeded {
                    attempted_bytes,
                    quota_bytes: self.quota_bytes,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }
}

/// Process-local key-value repository, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryKvRepository {
    entries: RefCell<BTreeMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl InMemoryKvRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KvRepository for InMemoryKvRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.borrow_mut();
        if let Some(quota_bytes) = self.quota_bytes {
            let others: u64 = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(k, v)| entry_bytes(k, v))
                .sum();
            let attempted_bytes = others + entry_bytes(key, value);
            if attempted_bytes > quota_bytes {
                return Err(StorageError::QuotaExceeded {
                    attempted_bytes,
                    quota_bytes,
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

fn entry_bytes(key: &str, value: &str) -> u64 {
    u64::try_from(key.len() + value.len()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{InMemoryKvRepository, KvRepository, StorageError};

    #[test]
    fn in_memory_quota_rejects_oversized_write_and_keeps_old_value() {
        let repo = InMemoryKvRepository::with_quota(16);
        repo.set("k", "small").unwrap();

        let err = repo.set("k", "this value is far too large").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota_bytes: 16, .. }));
        assert_eq!(repo.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn in_memory_quota_counts_replaced_key_once() {
        let repo = InMemoryKvRepository::with_quota(10);
        repo.set("k", "123456789").unwrap();
        repo.set("k", "987654321").unwrap();
        assert_eq!(repo.len(), 1);
    }
}
