//! Database schema migrations.
//!
//! The applied schema version lives in SQLite's `user_version` header field.
//! Each pending migration runs in its own transaction together with the
//! version bump, so a failed step leaves the previous schema intact.

use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite;

use super::Error;

/// Ordered schema steps; index + 1 is the version each one produces.
const MIGRATIONS: &[&str] = &[include_str!("../../migrations/001_generations.sql")];

/// Schema version this build writes.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns `Error::MigrationFailed` if the database was written by a newer
/// schema, or a database error if a step fails.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    let applied = conn
        .call(|conn| -> Result<i64, Error> {
            let current = user_version(conn)?;
            if current > SCHEMA_VERSION {
                return Err(Error::MigrationFailed(format!(
                    "schema version {current} is newer than supported version {SCHEMA_VERSION}"
                )));
            }

            for (index, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
                let version = index as i64 + 1;
                let tx = conn.transaction()?;
                tx.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
                tx.pragma_update(None, "user_version", version)?;
                tx.commit()?;
            }

            Ok(SCHEMA_VERSION - current)
        })
        .await
        .map_err(Error::from)?;

    if applied > 0 {
        tracing::info!(applied, version = SCHEMA_VERSION, "applied schema migrations");
    }
    Ok(())
}

fn user_version(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}
