//! SQLite-backed key-value store.
//!
//! Every value is a JSON document under a string key. Read-modify-write
//! sequences go through [`Store::transaction`], which holds the connection
//! mutex for the whole closure and commits once, so concurrent writers are
//! serialized and a multi-key update lands all-or-nothing.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe key-value store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

/// Handle to an open transaction, handed to [`Store::transaction`] closures.
pub struct StoreTx<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl StoreTx<'_> {
    /// Read and decode the value under `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        read_value(&self.tx, key)
    }

    /// Encode and write `value` under `key`.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DbError> {
        write_value(&self.tx, key, &serde_json::to_string(value)?)
    }

    pub fn remove(&self, key: &str) -> Result<(), DbError> {
        self.tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    /// A panic inside [`Store::transaction`] drops the open transaction,
    /// which rolls it back, so a poisoned connection is still consistent.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        Ok(self.conn.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Read and decode the value under `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let conn = self.lock()?;
        read_value(&conn, key)
    }

    /// Encode and write a single value.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let conn = self.lock()?;
        write_value(&conn, key, &json)
    }

    /// Run `f` inside a single transaction while holding the connection.
    ///
    /// The transaction rolls back if `f` returns an error.
    pub fn transaction<R, F>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<R, DbError>,
    {
        let conn = self.lock()?;
        let tx = StoreTx {
            tx: conn.unchecked_transaction()?,
        };
        let out = f(&tx)?;
        tx.tx.commit()?;
        Ok(out)
    }

    /// List stored keys, for the status endpoint.
    pub fn keys(&self) -> Result<Vec<String>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key ASC")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

fn read_value<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>, DbError> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;

    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

fn write_value(conn: &Connection, key: &str, json: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=datetime('now')",
        params![key, json],
    )?;
    Ok(())
}
