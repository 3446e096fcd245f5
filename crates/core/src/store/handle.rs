//! Memoized, single-flight store initialization.

use crate::Error;
use crate::cache::CacheDb;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    File(PathBuf),
    InMemory,
}

/// Lazily opened store handle.
///
/// The first caller of [`StoreHandle::db`] opens the database; concurrent
/// callers wait on that same open and all observe its outcome. A failed open
/// is memoized too, so the handle never retries within its lifetime.
#[derive(Debug)]
pub struct StoreHandle {
    target: StoreTarget,
    extra_partitions: Vec<String>,
    cell: OnceCell<Result<CacheDb, Arc<Error>>>,
    opens: AtomicUsize,
}

impl StoreHandle {
    pub fn new(target: StoreTarget) -> Self {
        Self { target, extra_partitions: Vec::new(), cell: OnceCell::new(), opens: AtomicUsize::new(0) }
    }

    /// Partitions to register right after the database opens.
    pub fn with_partitions(mut self, partitions: Vec<String>) -> Self {
        self.extra_partitions = partitions;
        self
    }

    /// Wrap an already open database.
    pub fn from_db(db: CacheDb) -> Self {
        Self {
            target: StoreTarget::InMemory,
            extra_partitions: Vec::new(),
            cell: OnceCell::new_with(Some(Ok(db))),
            opens: AtomicUsize::new(0),
        }
    }

    /// Get the database, opening it on first use.
    pub async fn db(&self) -> Result<&CacheDb, Error> {
        let outcome = self.cell.get_or_init(|| self.open()).await;
        match outcome {
            Ok(db) => Ok(db),
            Err(e) => Err(Error::StoreUnavailable(e.to_string())),
        }
    }

    /// Number of physical opens performed by this handle.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<CacheDb, Arc<Error>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(target_store = ?self.target, "opening keyed store");

        let db = match &self.target {
            StoreTarget::File(path) => CacheDb::open(path).await,
            StoreTarget::InMemory => CacheDb::open_in_memory().await,
        };

        let db = match db {
            Ok(db) => db,
            Err(e) => {
                tracing::error!(error = %e, "keyed store failed to open");
                return Err(Arc::new(e));
            }
        };

        if !self.extra_partitions.is_empty()
            && let Err(e) = db.register_partitions(&self.extra_partitions).await
        {
            tracing::error!(error = %e, "failed to register partitions");
            return Err(Arc::new(e));
        }

        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_open() {
        let handle = Arc::new(StoreHandle::new(StoreTarget::InMemory));

        let a = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.db().await.map(|db| db as *const CacheDb as usize) })
        };
        let b = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.db().await.map(|db| db as *const CacheDb as usize) })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(handle.open_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_open_is_memoized() {
        let handle = StoreHandle::new(StoreTarget::File(PathBuf::from("/dev/null/depot/cache.sqlite")));

        let first = handle.db().await;
        let second = handle.db().await;
        assert!(matches!(first, Err(Error::StoreUnavailable(_))));
        assert!(matches!(second, Err(Error::StoreUnavailable(_))));
        assert_eq!(handle.open_count(), 1);
    }

    #[tokio::test]
    async fn test_extra_partitions_registered() {
        let handle = StoreHandle::new(StoreTarget::InMemory).with_partitions(vec!["invoices".into()]);
        let db = handle.db().await.unwrap();
        assert!(db.partition_exists("invoices").await.unwrap());
    }

    #[tokio::test]
    async fn test_from_db_never_opens() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = StoreHandle::from_db(db);
        assert!(handle.db().await.is_ok());
        assert_eq!(handle.open_count(), 0);
    }
}
