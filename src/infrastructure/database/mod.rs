//! SQLite-backed settings store

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::application::errors::StorageError;
use crate::domain::traits::{Scope, Store};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }
}

fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            namespace TEXT NOT NULL,
            scope TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (namespace, scope, key)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_settings_scope ON settings(namespace, scope)",
        [],
    )?;

    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, namespace: &str, scope: Scope, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE namespace = ?1 AND scope = ?2 AND key = ?3",
                rusqlite::params![namespace, scope.to_string(), key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(StorageError::from))
            .transpose()
    }

    async fn set(&self, namespace: &str, scope: Scope, key: &str, value: Value) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&value)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO settings (namespace, scope, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))",
            rusqlite::params![namespace, scope.to_string(), key, raw],
        )?;
        Ok(())
    }

    async fn clear(&self, namespace: &str, scope: Scope, key: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "DELETE FROM settings WHERE namespace = ?1 AND scope = ?2 AND key = ?3",
            rusqlite::params![namespace, scope.to_string(), key],
        )?;
        Ok(())
    }

    async fn clear_scope(&self, namespace: &str, scope: Scope) -> Result<(), StorageError> {
        self.conn()?.execute(
            "DELETE FROM settings WHERE namespace = ?1 AND scope = ?2",
            rusqlite::params![namespace, scope.to_string()],
        )?;
        Ok(())
    }

    async fn all(&self, namespace: &str) -> Result<BTreeMap<Scope, Map<String, Value>>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT scope, key, value FROM settings WHERE namespace = ?1 ORDER BY scope, key"
        )?;
        let rows = stmt.query_map([namespace], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out: BTreeMap<Scope, Map<String, Value>> = BTreeMap::new();
        for row in rows {
            let (scope, key, raw) = row?;
            let Some(scope) = Scope::parse(&scope) else {
                tracing::warn!("Skipping unknown scope '{}' in {}", scope, namespace);
                continue;
            };
            out.entry(scope)
                .or_default()
                .insert(key, serde_json::from_str(&raw)?);
        }
        Ok(out)
    }
}
