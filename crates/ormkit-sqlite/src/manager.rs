//! Connection manager handing out SQLite connections by key.

use crate::connection::{SqliteConfig, SqliteConnection};
use ormkit_core::Error;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key used when a caller does not name a connection.
pub const DEFAULT_UUID: &str = "default";

const MEMORY_KEY: &str = ":memory:";

/// Hands out one connection per uuid.
///
/// Every caller of an in-memory database shares a single connection, since
/// a second in-memory handle would be a different, empty database. New
/// connections get foreign key enforcement unless it was switched off.
#[derive(Debug)]
pub struct SqliteConnectionManager {
    config: SqliteConfig,
    foreign_keys: bool,
    connections: Mutex<HashMap<String, SqliteConnection>>,
}

impl SqliteConnectionManager {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            foreign_keys: true,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Foreign key enforcement for newly opened connections.
    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    fn key_for(&self, uuid: Option<&str>) -> String {
        if self.config.is_memory() {
            MEMORY_KEY.to_string()
        } else {
            uuid.unwrap_or(DEFAULT_UUID).to_string()
        }
    }

    /// Connection for `uuid`, opening it on first use.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_connection(&self, uuid: Option<&str>) -> Result<SqliteConnection, Error> {
        let key = self.key_for(uuid);
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = connections.get(&key) {
            return Ok(conn.clone());
        }

        let conn = SqliteConnection::open(&self.config)?;
        // The bundled build may enable enforcement by default, so set it both ways.
        conn.execute_raw(if self.foreign_keys {
            "PRAGMA FOREIGN_KEYS=ON"
        } else {
            "PRAGMA FOREIGN_KEYS=OFF"
        })?;
        tracing::info!(key = %key, path = %self.config.path, "opened connection");
        connections.insert(key, conn.clone());
        Ok(conn)
    }

    /// Give a connection back.
    ///
    /// In-memory connections stay open unless `force` is set; closing them
    /// would discard the database. Other connections close when their last
    /// handle drops.
    pub fn release(&self, uuid: Option<&str>, force: bool) -> bool {
        if self.config.is_memory() && !force {
            return false;
        }
        let key = self.key_for(uuid);
        let removed = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some();
        if removed {
            tracing::info!(key = %key, "released connection");
        }
        removed
    }

    /// Number of connections currently held.
    pub fn len(&self) -> usize {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::Value;

    fn temp_path(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("ormkit-{}-{}.sqlite", name, std::process::id()));
        let path = path.to_string_lossy().into_owned();
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn memory_connections_are_shared() {
        let manager = SqliteConnectionManager::new(SqliteConfig::memory());
        let a = manager.get_connection(Some("a")).unwrap();
        let b = manager.get_connection(Some("b")).unwrap();
        assert_eq!(manager.len(), 1);

        a.execute_raw("CREATE TABLE t (id INTEGER)").unwrap();
        b.execute_sync("INSERT INTO t VALUES (1)", &[]).unwrap();
        assert_eq!(a.query_sync("SELECT id FROM t", &[]).unwrap().len(), 1);
    }

    #[test]
    fn memory_release_needs_force() {
        let manager = SqliteConnectionManager::new(SqliteConfig::memory());
        manager.get_connection(None).unwrap();
        assert!(!manager.release(None, false));
        assert_eq!(manager.len(), 1);
        assert!(manager.release(None, true));
        assert!(manager.is_empty());
    }

    #[test]
    fn file_connections_are_keyed_by_uuid() {
        let path = temp_path("manager");
        let manager = SqliteConnectionManager::new(SqliteConfig::file(path.clone()));
        manager.get_connection(None).unwrap();
        manager.get_connection(Some("worker")).unwrap();
        manager.get_connection(Some(DEFAULT_UUID)).unwrap();
        assert_eq!(manager.len(), 2);

        assert!(manager.release(Some("worker"), false));
        assert_eq!(manager.len(), 1);
        assert!(manager.release(None, false));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn foreign_keys_enabled_by_default() {
        let manager = SqliteConnectionManager::new(SqliteConfig::memory());
        let conn = manager.get_connection(None).unwrap();
        let rows = conn.query_sync("PRAGMA foreign_keys", &[]).unwrap();
        assert_eq!(rows[0].get(0), Some(&Value::BigInt(1)));
    }

    #[test]
    fn foreign_keys_can_be_disabled() {
        let manager = SqliteConnectionManager::new(SqliteConfig::memory()).foreign_keys(false);
        let conn = manager.get_connection(None).unwrap();
        let rows = conn.query_sync("PRAGMA foreign_keys", &[]).unwrap();
        assert_eq!(rows[0].get(0), Some(&Value::BigInt(0)));

        conn.execute_raw("CREATE TABLE parent (id INTEGER PRIMARY KEY)").unwrap();
        conn.execute_raw("CREATE TABLE child (parent_id INTEGER REFERENCES parent (id))")
            .unwrap();
        conn.execute_sync("INSERT INTO child VALUES (42)", &[]).unwrap();
    }

    #[test]
    fn open_failure_is_a_connection_error() {
        let config = SqliteConfig::file("/nonexistent-dir/ormkit/db.sqlite")
            .flags(crate::OpenFlags::read_write());
        let manager = SqliteConnectionManager::new(config);
        let err = manager.get_connection(None).unwrap_err();
        assert!(err.is_connection_error());
    }
}
