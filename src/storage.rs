//! Persistence primitives: a string key-value store and a keyed store for
//! disc content blobs. Both live in one SQLite file.

use crate::error::StorageError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Content blobs keyed by file path.
pub trait ContentStore: Send + Sync {
    fn put(&self, path: &str, content: &str) -> Result<(), StorageError>;
    fn get_all(&self) -> Result<HashMap<String, String>, StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn create_tables(conn: &Connection) -> Result<(), StorageError> {
    log::info!("[storage] Creating tables if not exists...");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS disc_content (
            path TEXT PRIMARY KEY,
            content TEXT NOT NULL
        );",
        [],
    )?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl ContentStore for SqliteStore {
    fn put(&self, path: &str, content: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO disc_content (path, content) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET content = excluded.content",
            params![path, content],
        )?;
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT path, content FROM disc_content")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut contents = HashMap::new();
        for row in rows {
            let (path, content) = row?;
            contents.insert(path, content);
        }
        Ok(contents)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.conn()?.execute("DELETE FROM disc_content", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("pi_endpoint").unwrap(), None);
        store.set("pi_endpoint", "http://a").unwrap();
        store.set("pi_endpoint", "http://b").unwrap();
        assert_eq!(store.get("pi_endpoint").unwrap().as_deref(), Some("http://b"));
        store.remove("pi_endpoint").unwrap();
        assert_eq!(store.get("pi_endpoint").unwrap(), None);
    }

    #[test]
    fn test_content_store_put_overwrites_and_clears() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("/a.d64", "one").unwrap();
        store.put("/a.d64", "two").unwrap();
        store.put("/b.d64", "three").unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("/a.d64").map(String::as_str), Some("two"));

        store.clear().unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }
}
