//! Entry operations within a generation.
//!
//! Stores follow Cache API `put` rules: only GET requests, no partial
//! content, no `Vary: *`. Storing under an existing identity replaces it.

use bytes::Bytes;
use chrono::SecondsFormat;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::generations::Generation;
use super::hash::{request_key, without_search};
use crate::Error;
use crate::http::{Headers, Request, Response};

/// A stored response together with the identity it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub method: String,
    pub url: String,
    pub stored_at: String,
    pub response: Response,
}

type EntryRow = (String, String, String, u16, String, Vec<u8>);

const SELECT_ENTRY: &str = "SELECT method, url, stored_at, status, headers_json, body FROM entries";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn decode(row: EntryRow) -> Result<StoredEntry, Error> {
    let (method, url, stored_at, status, headers_json, body) = row;
    let headers: Headers = serde_json::from_str(&headers_json)?;
    Ok(StoredEntry { method, url, stored_at, response: Response { status, headers, body: Bytes::from(body) } })
}

/// Reject pairs the Cache API refuses to store.
pub fn check_storable(request: &Request, response: &Response) -> Result<(), Error> {
    if !request.is_get() {
        return Err(Error::Uncacheable(format!("{} requests cannot be stored", request.method)));
    }
    if response.status == 206 {
        return Err(Error::Uncacheable("partial content (206) cannot be stored".into()));
    }
    if response
        .header("vary")
        .is_some_and(|v| v.split(',').any(|part| part.trim() == "*"))
    {
        return Err(Error::Uncacheable("responses with Vary: * cannot be stored".into()));
    }
    Ok(())
}

impl Generation {
    /// Store a copy of `response` under the identity of `request`.
    ///
    /// Creates the generation if it was deleted or never opened.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        check_storable(request, response)?;

        let generation = self.name.clone();
        let key = request_key(&request.method, &request.url);
        let method = request.method.clone();
        let url = request.url.to_string();
        let url_without_search = without_search(&request.url);
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let stored_at = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![&generation, &stored_at],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    generation, key, method, url, url_without_search,
                    status, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(generation, key) DO UPDATE SET
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &generation,
                        &key,
                        &method,
                        &url,
                        &url_without_search,
                        status,
                        &headers_json,
                        &body,
                        &stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(generation = %self.name, url = %request.url, status, "stored entry");
        Ok(())
    }

    /// Full entry for an exact request identity.
    pub async fn entry(&self, request: &Request) -> Result<Option<StoredEntry>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let generation = self.name.clone();
        let key = request_key(&request.method, &request.url);
        let row = self
            .storage
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE generation = ?1 AND key = ?2");
                match conn.query_row(&sql, params![generation, key], read_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(decode).transpose()
    }

    /// Response stored under the exact identity of `request`.
    ///
    /// Non-GET requests never match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        Ok(self.entry(request).await?.map(|e| e.response))
    }

    /// Most recently stored response for the same method and URL, ignoring
    /// the query string.
    pub async fn match_ignore_search(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let generation = self.name.clone();
        let method = request.method.clone();
        let base = without_search(&request.url);
        let row = self
            .storage
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!(
                    "{SELECT_ENTRY} WHERE generation = ?1 AND method = ?2 AND url_without_search = ?3
                     ORDER BY stored_at DESC, rowid DESC LIMIT 1"
                );
                match conn.query_row(&sql, params![generation, method, base], read_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        Ok(row.map(decode).transpose()?.map(|e| e.response))
    }

    /// Remove the entry stored under `request`'s identity.
    ///
    /// Returns false if there was none.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let generation = self.name.clone();
        let key = request_key(&request.method, &request.url);
        self.storage
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND key = ?2",
                    params![generation, key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every stored entry, in insertion order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let generation = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
