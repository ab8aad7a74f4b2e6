//! SQLite-backed persistence.
//!
//! One database file holds:
//! - Key-value store for the goal settings
//! - The registrar's durable registration set
//! - The local alarm table used by the CLI

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations};
use crate::error::DatabaseError;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "fitplan.db";

/// SQLite database handle.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Path of the default database file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_path() -> Result<PathBuf, DatabaseError> {
        data_dir()
            .map(|dir| dir.join(DATABASE_FILE))
            .map_err(|e| DatabaseError::DataDir(e.to_string()))
    }

    /// Open the database at `<data_dir>/fitplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        Self::open_at(Self::default_path()?)
    }

    /// Open the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get an integer from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<i64>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set an integer in the kv store.
    pub fn kv_set(&self, key: &str, value: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("protein").unwrap().is_none());
        db.kv_set("protein", 150).unwrap();
        assert_eq!(db.kv_get("protein").unwrap(), Some(150));
    }

    #[test]
    fn kv_set_overwrites() {
        let db = Database::open_memory().unwrap();
        db.kv_set("su", 3000).unwrap();
        db.kv_set("su", 4200).unwrap();
        assert_eq!(db.kv_get("su").unwrap(), Some(4200));
    }

    #[test]
    fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_FILE);

        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("porsiyon", 120).unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("porsiyon").unwrap(), Some(120));
    }
}
