// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`KvBackend`].
//!
//! All statements run on tokio-rusqlite's single background thread, so a
//! batch applied inside one transaction is atomic with respect to every
//! other call. Expired keys are hidden on read and removed lazily.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use deskflow_core::DeskflowError;

use crate::kv::{KeyTtl, KvBackend, KvWrite};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv_keys (
        key        TEXT PRIMARY KEY,
        kind       TEXT NOT NULL,
        expires_at INTEGER
    );
    CREATE TABLE IF NOT EXISTS kv_strings (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS kv_zsets (
        key    TEXT NOT NULL,
        member TEXT NOT NULL,
        score  INTEGER NOT NULL,
        PRIMARY KEY (key, member)
    );
    CREATE INDEX IF NOT EXISTS idx_kv_zsets_score ON kv_zsets (key, score);
    CREATE INDEX IF NOT EXISTS idx_kv_keys_expiry ON kv_keys (expires_at);
";

const KIND_STRING: &str = "string";
const KIND_ZSET: &str = "zset";

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> DeskflowError {
    DeskflowError::Storage {
        source: Box::new(e),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// SQLite-backed TTL key-value store.
pub struct SqliteKv {
    conn: tokio_rusqlite::Connection,
}

impl SqliteKv {
    /// Opens (or creates) a database file, enabling WAL and creating the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DeskflowError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DeskflowError::Storage {
                source: Box::new(e),
            })?;
        }
        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| DeskflowError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            conn.execute_batch(SCHEMA)
        })
        .await
        .map_err(map_tr_err)?;
        debug!(path = %path.display(), "sqlite kv opened");
        Ok(Self { conn })
    }

    /// Opens a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, DeskflowError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| DeskflowError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch(SCHEMA) })
            .await
            .map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    /// Physically removes every expired key. Returns how many keys were removed.
    pub async fn purge_expired(&self) -> Result<usize, DeskflowError> {
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM kv_strings WHERE key IN
                     (SELECT key FROM kv_keys WHERE expires_at IS NOT NULL AND expires_at <= ?1)",
                    params![now],
                )?;
                tx.execute(
                    "DELETE FROM kv_zsets WHERE key IN
                     (SELECT key FROM kv_keys WHERE expires_at IS NOT NULL AND expires_at <= ?1)",
                    params![now],
                )?;
                let removed = tx.execute(
                    "DELETE FROM kv_keys WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Flushes the WAL into the main database file.
    pub async fn checkpoint_wal(&self) -> Result<(), DeskflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Kind of a live key, removing it first if it has expired.
fn live_kind(conn: &Connection, key: &str, now: i64) -> Result<Option<String>, rusqlite::Error> {
    let row: Option<(String, Option<i64>)> = conn
        .query_row(
            "SELECT kind, expires_at FROM kv_keys WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((_, Some(expires_at))) if expires_at <= now => {
            delete_key(conn, key)?;
            Ok(None)
        }
        Some((kind, _)) => Ok(Some(kind)),
        None => Ok(None),
    }
}

fn delete_key(conn: &Connection, key: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM kv_strings WHERE key = ?1", params![key])?;
    conn.execute("DELETE FROM kv_zsets WHERE key = ?1", params![key])?;
    conn.execute("DELETE FROM kv_keys WHERE key = ?1", params![key])?;
    Ok(())
}

fn get_string(conn: &Connection, key: &str, now: i64) -> Result<Option<String>, rusqlite::Error> {
    if live_kind(conn, key, now)?.as_deref() != Some(KIND_STRING) {
        return Ok(None);
    }
    conn.query_row(
        "SELECT value FROM kv_strings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

fn expires_at(ttl: std::time::Duration, now: i64) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

fn apply_write(conn: &Connection, write: KvWrite, now: i64) -> Result<(), rusqlite::Error> {
    match write {
        KvWrite::Set { key, value, ttl } => {
            delete_key(conn, &key)?;
            conn.execute(
                "INSERT INTO kv_keys (key, kind, expires_at) VALUES (?1, ?2, ?3)",
                params![key, KIND_STRING, ttl.map(|t| expires_at(t, now))],
            )?;
            conn.execute(
                "INSERT INTO kv_strings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        KvWrite::Del { key } => delete_key(conn, &key)?,
        KvWrite::ZAdd { key, member, score } => {
            if live_kind(conn, &key, now)?.as_deref() != Some(KIND_ZSET) {
                delete_key(conn, &key)?;
                conn.execute(
                    "INSERT INTO kv_keys (key, kind, expires_at) VALUES (?1, ?2, NULL)",
                    params![key, KIND_ZSET],
                )?;
            }
            conn.execute(
                "INSERT INTO kv_zsets (key, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key, member) DO UPDATE SET score = excluded.score",
                params![key, member, score],
            )?;
        }
        KvWrite::ZRem { key, member } => {
            if live_kind(conn, &key, now)?.as_deref() == Some(KIND_ZSET) {
                conn.execute(
                    "DELETE FROM kv_zsets WHERE key = ?1 AND member = ?2",
                    params![key, member],
                )?;
                let remaining: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM kv_zsets WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                if remaining == 0 {
                    delete_key(conn, &key)?;
                }
            }
        }
        KvWrite::Expire { key, ttl } => {
            if live_kind(conn, &key, now)?.is_some() {
                conn.execute(
                    "UPDATE kv_keys SET expires_at = ?2 WHERE key = ?1",
                    params![key, expires_at(ttl, now)],
                )?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl KvBackend for SqliteKv {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ping(&self) -> Result<(), DeskflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, DeskflowError> {
        let key = key.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                get_string(conn, &key, now)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, DeskflowError> {
        let keys = keys.to_vec();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<Vec<Option<String>>, rusqlite::Error> {
                keys.iter().map(|key| get_string(conn, key, now)).collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn pttl(&self, key: &str) -> Result<KeyTtl, DeskflowError> {
        let key = key.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<KeyTtl, rusqlite::Error> {
                if live_kind(conn, &key, now)?.is_none() {
                    return Ok(KeyTtl::Missing);
                }
                let expires_at: Option<i64> = conn.query_row(
                    "SELECT expires_at FROM kv_keys WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(match expires_at {
                    Some(at) => KeyTtl::Millis(at - now),
                    None => KeyTtl::Persistent,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    async fn zrev_range(
        &self,
        key: &str,
        max_exclusive: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<(String, i64)>, DeskflowError> {
        let key = key.to_string();
        let now = now_ms();
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        self.conn
            .call(move |conn| -> Result<Vec<(String, i64)>, rusqlite::Error> {
                if live_kind(conn, &key, now)?.as_deref() != Some(KIND_ZSET) {
                    return Ok(Vec::new());
                }
                let mut stmt = conn.prepare(
                    "SELECT member, score FROM kv_zsets
                     WHERE key = ?1 AND (?2 IS NULL OR score < ?2)
                     ORDER BY score DESC, member DESC
                     LIMIT ?3",
                )?;
                let rows = stmt.query_map(params![key, max_exclusive, limit], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<i64>, DeskflowError> {
        let key = key.to_string();
        let member = member.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
                if live_kind(conn, &key, now)?.as_deref() != Some(KIND_ZSET) {
                    return Ok(None);
                }
                conn.query_row(
                    "SELECT score FROM kv_zsets WHERE key = ?1 AND member = ?2",
                    params![key, member],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DeskflowError> {
        let prefix = prefix.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT key FROM kv_keys
                     WHERE substr(key, 1, length(?1)) = ?1
                       AND (expires_at IS NULL OR expires_at > ?2)
                     ORDER BY key",
                )?;
                let rows = stmt.query_map(params![prefix, now], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), DeskflowError> {
        if writes.is_empty() {
            return Ok(());
        }
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                for write in writes {
                    apply_write(&tx, write, now)?;
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }
}
