//! Generation lifecycle: open, enumerate, delete.
//!
//! A generation is a named set of entries that is created on first open and
//! removed as a unit. Deleting a generation cascades to its entries.

use super::connection::CacheStorage;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to one named cache generation.
///
/// Obtaining a handle does no I/O; the generation row is created by
/// [`CacheStorage::open_generation`] or implicitly by the first store.
#[derive(Clone, Debug)]
pub struct Generation {
    pub(crate) storage: CacheStorage,
    pub(crate) name: String,
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheStorage {
    /// Handle for the named generation without touching the database.
    pub fn generation(&self, name: impl Into<String>) -> Generation {
        Generation { storage: self.clone(), name: name.into() }
    }

    /// Open the named generation, creating it if absent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(self.generation(name))
    }

    /// Whether a generation with this name exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all generations, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
