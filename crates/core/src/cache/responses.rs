//! Response namespaces for the interception tier.
//!
//! A namespace is a named group of cached responses keyed by request
//! identity. Entries carry no timestamps; the `seq` column keeps insertion
//! order, and overwriting an entry keeps its original position. Eviction is
//! therefore first-in-first-out, not least-recently-used.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A response stored in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Request identity this response is stored under.
    pub fn request_key(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }

    /// First header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl CacheDb {
    /// Store a response in a namespace, replacing any entry for the same
    /// request while keeping its insertion position.
    pub async fn put_response(&self, namespace: &str, response: &CachedResponse) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let request_key = response.request_key();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO response_cache (namespace, request_key, method, url, status, headers_json, body)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(namespace, request_key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body",
                    params![
                        namespace,
                        request_key,
                        &response.method,
                        &response.url,
                        response.status,
                        headers_json,
                        &response.body,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a response by request identity within one namespace.
    pub async fn match_response(&self, namespace: &str, request_key: &str) -> Result<Option<CachedResponse>, Error> {
        let namespace = namespace.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row: Option<(String, String, u16, String, Vec<u8>)> = conn
                    .query_row(
                        "SELECT method, url, status, headers_json, body FROM response_cache
                        WHERE namespace = ?1 AND request_key = ?2",
                        params![namespace, request_key],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                    )
                    .optional()?;

                match row {
                    Some((method, url, status, headers_json, body)) => Ok(Some(CachedResponse {
                        method,
                        url,
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                    })),
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Request keys in a namespace, earliest-inserted first.
    pub async fn response_keys(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT request_key FROM response_cache WHERE namespace = ?1 ORDER BY seq")?;
                let keys = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a namespace.
    pub async fn count_responses(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM response_cache WHERE namespace = ?1",
                    params![namespace],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn delete_response(&self, namespace: &str, request_key: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM response_cache WHERE namespace = ?1 AND request_key = ?2",
                    params![namespace, request_key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every namespace holding at least one entry, sorted.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT namespace FROM response_cache ORDER BY namespace")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a whole namespace. Returns the number of entries removed.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM response_cache WHERE namespace = ?1", params![namespace])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Move every entry of `staging` into `target`, replacing what `target`
    /// held, in one transaction.
    ///
    /// Nothing changes unless `staging` holds exactly `expected` entries;
    /// returns whether the swap happened.
    pub async fn replace_namespace(&self, staging: &str, target: &str, expected: u64) -> Result<bool, Error> {
        let staging = staging.to_string();
        let target = target.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let count: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM response_cache WHERE namespace = ?1",
                    params![staging],
                    |row| row.get(0),
                )?;
                if count as u64 != expected {
                    return Ok(false);
                }

                tx.execute("DELETE FROM response_cache WHERE namespace = ?1", params![target])?;
                tx.execute(
                    "UPDATE response_cache SET namespace = ?2 WHERE namespace = ?1",
                    params![staging, target],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Evict earliest-inserted entries until the namespace holds at most
    /// `max_entries`.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_namespace(&self, namespace: &str, max_entries: usize) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM response_cache WHERE namespace = ?1",
                    params![namespace],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM response_cache WHERE seq IN (
                    SELECT seq FROM response_cache WHERE namespace = ?1 ORDER BY seq ASC LIMIT ?2
                )",
                    params![namespace, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
