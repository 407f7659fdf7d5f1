//! # redb-backed Store
//!
//! A disk-backed normalized store using the redb embedded database.
//!
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Each record is one row keyed by object identifier, holding the
//! header-less postcard encoding from `formats::persistence`. Lookups open
//! a fresh read transaction, so one resolution may observe a concurrent
//! import between two field lookups. Callers that need isolation serialize
//! reads against `import`/`clear` themselves.

use crate::formats::{decode_record, encode_record};
use crate::primitives::FORMAT_VERSION;
use crate::store::{MemoryStore, StoreReader};
use crate::{CacheError, StoreRecord};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::borrow::Cow;
use std::path::Path;

/// Table for records: object id -> encoded record bytes
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const FORMAT_VERSION_KEY: &str = "format_version";

fn storage_error(e: impl std::fmt::Display) -> CacheError {
    CacheError::Storage(e.to_string())
}

/// A disk-backed normalized store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store database at the given path.
    ///
    /// Fails if the database was written by an incompatible format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_error)?;
            let _ = write_txn.open_table(RECORDS).map_err(storage_error)?;
            {
                let mut meta = write_txn.open_table(METADATA).map_err(storage_error)?;
                let stored = meta
                    .get(FORMAT_VERSION_KEY)
                    .map_err(storage_error)?
                    .map(|v| v.value());
                match stored {
                    None => {
                        meta.insert(FORMAT_VERSION_KEY, u64::from(FORMAT_VERSION))
                            .map_err(storage_error)?;
                    }
                    Some(version) if version == u64::from(FORMAT_VERSION) => {}
                    Some(version) => {
                        return Err(CacheError::Storage(format!(
                            "Unsupported store format version: {} (expected {})",
                            version, FORMAT_VERSION
                        )));
                    }
                }
            }
            write_txn.commit().map_err(storage_error)?;
        }

        Ok(Self { db })
    }

    /// Replace the whole contents with `store` in a single ACID transaction.
    ///
    /// Every record is encoded before the transaction opens, so a record
    /// that cannot be encoded leaves the database untouched.
    pub fn import(&mut self, store: &MemoryStore) -> Result<usize, CacheError> {
        let encoded = store
            .iter()
            .map(|(id, record)| encode_record(record).map(|bytes| (id.as_str(), bytes)))
            .collect::<Result<Vec<_>, _>>()?;

        let write_txn = self.db.begin_write().map_err(storage_error)?;
        write_txn.delete_table(RECORDS).map_err(storage_error)?;
        {
            let mut table = write_txn.open_table(RECORDS).map_err(storage_error)?;
            for (id, bytes) in &encoded {
                table.insert(*id, bytes.as_slice()).map_err(storage_error)?;
            }
        }
        write_txn.commit().map_err(storage_error)?;

        Ok(encoded.len())
    }

    /// Remove every record.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.import(&MemoryStore::new()).map(|_| ())
    }

    /// All record identifiers, in key order.
    pub fn record_ids(&self) -> Result<Vec<String>, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_error)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(storage_error)? {
            let (key, _) = entry.map_err(storage_error)?;
            ids.push(key.value().to_string());
        }
        Ok(ids)
    }

    /// Copy every record into a `MemoryStore`.
    pub fn to_memory(&self) -> Result<MemoryStore, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_error)?;

        let mut store = MemoryStore::new();
        for entry in table.iter().map_err(storage_error)? {
            let (key, value) = entry.map_err(storage_error)?;
            store.insert(key.value(), decode_record(value.value())?);
        }
        Ok(store)
    }
}

impl StoreReader for RedbStore {
    fn get(&self, id: &str) -> Result<Option<Cow<'_, StoreRecord>>, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_error)?;

        match table.get(id).map_err(storage_error)? {
            Some(bytes) => Ok(Some(Cow::Owned(decode_record(bytes.value())?))),
            None => Ok(None),
        }
    }

    fn has(&self, id: &str) -> Result<bool, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_error)?;
        Ok(table.get(id).map_err(storage_error)?.is_some())
    }

    fn len(&self) -> Result<usize, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_error)?;
        let count = table.len().map_err(storage_error)?;
        usize::try_from(count).map_err(storage_error)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::StoreValue;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_store() -> MemoryStore {
        MemoryStore::new()
            .with(
                "ROOT_QUERY",
                StoreRecord::new().with("viewer", StoreValue::reference("User:1")),
            )
            .with(
                "User:1",
                StoreRecord::new()
                    .with("name", StoreValue::scalar("Ada"))
                    .with("settings", StoreValue::json(json!({"theme": "dark"}))),
            )
    }

    #[test]
    fn import_and_get() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cache.redb")).expect("open db");

        let imported = store.import(&sample_store()).expect("import");
        assert_eq!(imported, 2);
        assert_eq!(store.len().expect("len"), 2);

        let user = store.get("User:1").expect("get").expect("record");
        assert_eq!(user.get("name"), Some(&StoreValue::scalar("Ada")));
        assert!(store.get("User:2").expect("get").is_none());
        assert!(store.has("ROOT_QUERY").expect("has"));
    }

    #[test]
    fn import_replaces_contents() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cache.redb")).expect("open db");

        store.import(&sample_store()).expect("import");
        let replacement = MemoryStore::new().with("Other:1", StoreRecord::new());
        store.import(&replacement).expect("import");

        assert_eq!(store.record_ids().expect("ids"), vec!["Other:1".to_string()]);
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("cache.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.import(&sample_store()).expect("import");
        }

        let reopened = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(reopened.to_memory().expect("to memory"), sample_store());
    }

    #[test]
    fn clear_empties_store() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cache.redb")).expect("open db");
        store.import(&sample_store()).expect("import");
        store.clear().expect("clear");
        assert!(store.is_empty().expect("empty"));
    }
}
