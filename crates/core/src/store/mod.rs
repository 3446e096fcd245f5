//! Durable keyed store with a fixed freshness horizon.
//!
//! Application code caches remote data here to avoid redundant round trips.
//! The metadata partition is authoritative: it says which partition holds a
//! key's value and when it was written. Reads apply lazy expiry and treat any
//! disagreement between metadata and value rows as a miss.
//!
//! The `*_cached_data` / [`DurableStore::clear_cache`] methods never return
//! errors: a failing store degrades to "go to network", logged for operators.

pub mod clock;
pub mod handle;

use crate::Error;
use crate::cache::{CacheDb, EntryMeta};
use chrono::Duration;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use handle::{StoreHandle, StoreTarget};

/// Freshness horizon applied when none is configured.
pub const DEFAULT_FRESHNESS_MINUTES: i64 = 30;

/// Result of a keyed read before it is collapsed into hit/miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    Fresh(T),
    /// Metadata exists but is older than the horizon. The rows are kept.
    Expired,
    Missing,
    /// Metadata points at a partition without a matching value row.
    Inconsistent,
}

impl<T> ReadOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            ReadOutcome::Fresh(value) => Some(value),
            ReadOutcome::Expired | ReadOutcome::Missing | ReadOutcome::Inconsistent => None,
        }
    }
}

/// Partitioned key-value cache with lazy expiry.
#[derive(Debug, Clone)]
pub struct DurableStore {
    handle: Arc<StoreHandle>,
    clock: Arc<dyn Clock>,
    horizon: Duration,
}

impl DurableStore {
    pub fn new(handle: Arc<StoreHandle>) -> Self {
        Self { handle, clock: Arc::new(SystemClock), horizon: Duration::minutes(DEFAULT_FRESHNESS_MINUTES) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_freshness(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn handle(&self) -> &Arc<StoreHandle> {
        &self.handle
    }

    async fn db(&self) -> Result<&CacheDb, Error> {
        self.handle.db().await
    }

    /// Read a key and report exactly why it did or didn't hit.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<ReadOutcome<T>, Error> {
        let db = self.db().await?;

        let Some(meta) = db.get_entry_meta(key).await? else {
            return Ok(ReadOutcome::Missing);
        };

        let age = self.clock.now() - meta.written_at;
        if age > self.horizon {
            return Ok(ReadOutcome::Expired);
        }

        match db.get_entry_value(&meta.partition, key).await? {
            Some(json) => Ok(ReadOutcome::Fresh(serde_json::from_str(&json)?)),
            None => Ok(ReadOutcome::Inconsistent),
        }
    }

    /// Write a value, then its metadata.
    ///
    /// An unknown partition is redirected to the default one. Returns the
    /// partition the value actually landed in.
    pub async fn write<T: Serialize>(&self, key: &str, value: &T, partition: Option<&str>) -> Result<String, Error> {
        if key.is_empty() {
            return Err(Error::InvalidInput("key cannot be empty".into()));
        }

        let db = self.db().await?;
        let json = serde_json::to_string(value)?;

        let partition = match partition {
            Some(requested) => {
                if db.partition_exists(requested).await? {
                    requested.to_string()
                } else {
                    let fallback = db.default_partition().await?;
                    tracing::warn!(
                        key,
                        requested_partition = requested,
                        fallback_partition = %fallback,
                        "Partition missing from store schema; writing to default partition"
                    );
                    fallback
                }
            }
            None => db.default_partition().await?,
        };

        db.put_entry_value(&partition, key, &json).await?;
        db.put_entry_meta(key, &EntryMeta { partition: partition.clone(), written_at: self.clock.now() })
            .await?;

        Ok(partition)
    }

    /// Empty every partition and the metadata partition.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.db().await?.clear_entries().await
    }

    /// Delete entries past the horizon. Reads never need this; it only
    /// reclaims space.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        let cutoff = self.clock.now() - self.horizon;
        self.db().await?.sweep_entries(cutoff).await
    }

    /// Fail-soft read: any failure or non-fresh outcome is `None`.
    pub async fn get_cached_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read(key).await {
            Ok(ReadOutcome::Fresh(value)) => Some(value),
            Ok(ReadOutcome::Expired) => {
                tracing::debug!(key, "keyed store entry expired");
                None
            }
            Ok(ReadOutcome::Inconsistent) => {
                tracing::debug!(key, "keyed store metadata points at a missing value");
                None
            }
            Ok(ReadOutcome::Missing) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "keyed store read failed; treating as miss");
                None
            }
        }
    }

    /// Fail-soft write: failures are logged and swallowed.
    pub async fn set_cached_data<T: Serialize>(&self, key: &str, value: &T, partition: Option<&str>) {
        if let Err(e) = self.write(key, value, partition).await {
            tracing::warn!(key, error = %e, "keyed store write failed");
        }
    }

    /// Fail-soft clear: failures are logged and swallowed.
    pub async fn clear_cache(&self) {
        match self.clear().await {
            Ok(removed) => tracing::info!(removed, "keyed store cleared"),
            Err(e) => tracing::warn!(error = %e, "keyed store clear failed"),
        }
    }
}
