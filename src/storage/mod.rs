//! Storage module for the document store
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Document persistence with invariant checks at the boundary
//! - Filtered, sorted and paged document queries
//! - Aggregate statistics and title scans for suggestions

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    CategoryStats, CountBucket, DocumentFilter, DocumentStore, SortOrder, StorageError,
    StorageResult, StoreStatistics, YearCount,
};

use std::path::Path;
use std::sync::{Arc, Mutex};

/// A document store shared between the materializer and the search service
pub type SharedStore = Arc<Mutex<dyn DocumentStore + Send>>;

/// Opens the SQLite document store at `path`
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized store
/// * `Err(StorageError)` - Failed to open the database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Wraps a store for sharing
pub fn shared<S: DocumentStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store, mapping a poisoned lock to a storage error
pub fn lock(
    store: &SharedStore,
) -> StorageResult<std::sync::MutexGuard<'_, dyn DocumentStore + Send + 'static>> {
    store
        .lock()
        .map_err(|_| StorageError::Database("document store lock poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("docs.db");

        let store = open_store(&path).unwrap();
        assert_eq!(store.next_id().unwrap(), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_shared_store_lock() {
        let store = shared(SqliteStore::open_in_memory().unwrap());
        let guard = lock(&store).unwrap();
        assert_eq!(guard.next_id().unwrap(), 1);
    }
}
