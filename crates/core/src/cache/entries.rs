//! Partitioned keyed entries and their metadata partition.
//!
//! Values live in `kv_values` under a partition name; `kv_metadata` records,
//! per key, which partition holds the current value and when it was written.
//! These are raw storage primitives: freshness rules and fail-soft handling
//! belong to [`crate::store::DurableStore`].

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Metadata row for a keyed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub partition: String,
    pub written_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 so text comparison matches time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("bad timestamp '{s}': {e}")))
}

impl CacheDb {
    /// Name of the partition flagged as default in the registry.
    pub async fn default_partition(&self) -> Result<String, Error> {
        self.conn
            .call(|conn| -> Result<String, Error> {
                let name = conn
                    .query_row(
                        "SELECT name FROM kv_partitions WHERE is_default = 1 ORDER BY name LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                name.ok_or_else(|| Error::MigrationFailed("no default partition registered".into()))
            })
            .await
            .map_err(Error::from)
    }

    /// Whether the partition exists in the current schema.
    pub async fn partition_exists(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM kv_partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All registered partition names, sorted.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM kv_partitions ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Register additional partitions. Existing names are left untouched.
    pub async fn register_partitions(&self, names: &[String]) -> Result<(), Error> {
        let names = names.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                for name in &names {
                    conn.execute(
                        "INSERT OR IGNORE INTO kv_partitions (name, is_default) VALUES (?1, 0)",
                        params![name],
                    )?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Read the metadata row for a key.
    pub async fn get_entry_meta(&self, key: &str) -> Result<Option<EntryMeta>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<EntryMeta>, Error> {
                let row: Option<(String, String)> = conn
                    .query_row(
                        "SELECT partition, written_at FROM kv_metadata WHERE key = ?1",
                        params![key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                match row {
                    Some((partition, written_at)) => {
                        Ok(Some(EntryMeta { partition, written_at: parse_timestamp(&written_at)? }))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Read the raw JSON value stored under `key` in `partition`.
    pub async fn get_entry_value(&self, partition: &str, key: &str) -> Result<Option<String>, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let value = conn
                    .query_row(
                        "SELECT value_json FROM kv_values WHERE partition = ?1 AND key = ?2",
                        params![partition, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the value row for `key` in `partition`.
    pub async fn put_entry_value(&self, partition: &str, key: &str, value_json: &str) -> Result<(), Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        let value_json = value_json.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_values (partition, key, value_json) VALUES (?1, ?2, ?3)
                    ON CONFLICT(partition, key) DO UPDATE SET value_json = excluded.value_json",
                    params![partition, key, value_json],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the metadata row for `key`.
    ///
    /// If the key previously lived in another partition, that value row is
    /// removed so a value never outlives the metadata pointing at it.
    pub async fn put_entry_meta(&self, key: &str, meta: &EntryMeta) -> Result<(), Error> {
        let key = key.to_string();
        let partition = meta.partition.clone();
        let written_at = format_timestamp(meta.written_at);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let previous: Option<String> = conn
                    .query_row("SELECT partition FROM kv_metadata WHERE key = ?1", params![key], |row| {
                        row.get(0)
                    })
                    .optional()?;

                conn.execute(
                    "INSERT INTO kv_metadata (key, partition, written_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        partition = excluded.partition,
                        written_at = excluded.written_at",
                    params![key, partition, written_at],
                )?;

                if let Some(previous) = previous
                    && previous != partition
                {
                    conn.execute(
                        "DELETE FROM kv_values WHERE partition = ?1 AND key = ?2",
                        params![previous, key],
                    )?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Empty every partition and the metadata partition.
    ///
    /// Returns the number of metadata rows removed.
    pub async fn clear_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                conn.execute("DELETE FROM kv_values", [])?;
                let count = conn.execute("DELETE FROM kv_metadata", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose metadata was written before `cutoff`, along with
    /// value rows that no metadata points at.
    ///
    /// Returns the number of metadata rows removed.
    pub async fn sweep_entries(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = format_timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                // Only values whose metadata is stale go. A value without
                // metadata may be a write that has not stored its metadata yet.
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM kv_values WHERE EXISTS (
                        SELECT 1 FROM kv_metadata m
                        WHERE m.key = kv_values.key AND m.partition = kv_values.partition
                          AND m.written_at < ?1
                    )",
                    params![cutoff],
                )?;
                let count = tx.execute("DELETE FROM kv_metadata WHERE written_at < ?1", params![cutoff])?;
                tx.commit()?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
