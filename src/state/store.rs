use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Gallery images for the in-progress (not yet saved) project
pub const SAVED_IMAGES_KEY: &str = "@haven_saved_images";
/// All saved projects
pub const SAVED_PROJECTS_KEY: &str = "@haven_saved_projects";
/// Prefix for per-project comment threads (`@haven_comments_<projectId>`)
pub const COMMENTS_KEY_PREFIX: &str = "@haven_comments_";
/// Draft name of the in-progress project
pub const CURRENT_PROJECT_NAME_KEY: &str = "@haven_current_project_name";
/// Draft description of the in-progress project
pub const CURRENT_PROJECT_DESCRIPTION_KEY: &str = "@haven_current_project_description";
/// One-shot marker for the comment clearing migration
pub const COMMENTS_CLEARED_KEY: &str = "@haven_comments_cleared_v4";

/// String key-value persistence
///
/// Values are opaque strings (usually JSON). There are no transactions:
/// the last writer to a key wins.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// Typed JSON helpers on top of any store
pub trait JsonStore: KvStore {
    /// Read and decode a JSON value; `None` when the key is absent
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON value
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Remove several keys
    fn remove_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

impl<S: KvStore + ?Sized> JsonStore for S {}

/// The SQLite-backed key-value store.
/// One table, one row per key.
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the store at `db_path`
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        tracing::info!("📁 Store opened at: {}", db_path.display());

        let store = SqliteStore {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// A throwaway in-memory store
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let store = SqliteStore {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the key-value table if it doesn't exist
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key         TEXT PRIMARY KEY NOT NULL,
                value       TEXT NOT NULL,
                updated_at  INTEGER NOT NULL
            )",
            [],
        )?;

        tracing::debug!("✅ Store schema initialized");

        Ok(())
    }

    /// Path to the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_json_roundtrip_and_keys() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_json(SAVED_IMAGES_KEY, &vec!["image_1.jpg"]).unwrap();
        store.set("@haven_comments_p1", "[]").unwrap();

        let images: Vec<String> = store.get_json(SAVED_IMAGES_KEY).unwrap().unwrap();
        assert_eq!(images, vec!["image_1.jpg"]);
        assert_eq!(store.keys().unwrap().len(), 2);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("haven.db");
        {
            let store = SqliteStore::open(&db).unwrap();
            store.set("k", "v").unwrap();
        }
        let reopened = SqliteStore::open(&db).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(reopened.path(), Some(db.as_path()));
    }
}
