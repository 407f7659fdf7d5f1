//! # Normalized Store
//!
//! Read access to the flat `object id -> record` mapping the read path
//! resolves queries against.
//!
//! This module defines the `StoreReader` trait, the in-memory `MemoryStore`
//! and `StoreBackend`, which selects between in-memory and redb-backed
//! storage. The write path that normalizes server responses lives outside
//! this crate; `MemoryStore` can only be built from already-normalized
//! records (snapshots, tests).

use crate::storage::RedbStore;
use crate::{CacheError, StoreRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

// =============================================================================
// STOREREADER TRAIT
// =============================================================================

/// Read-only access to object records by identifier.
///
/// All operations return `Result` so in-memory and persistent backends can
/// be used uniformly. The read path never mutates a store.
pub trait StoreReader {
    /// The record stored for `id`, if any.
    ///
    /// In-memory stores borrow; persistent stores return an owned record.
    fn get(&self, id: &str) -> Result<Option<Cow<'_, StoreRecord>>, CacheError>;

    /// Whether a record exists for `id`.
    fn has(&self, id: &str) -> Result<bool, CacheError> {
        Ok(self.get(id)?.is_some())
    }

    /// Number of records.
    fn len(&self) -> Result<usize, CacheError>;

    /// Whether the store holds no records.
    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// In-memory normalized store.
///
/// Uses `BTreeMap` for deterministic iteration and snapshots. Serializes to
/// the JSON interchange shape: an object of `id -> record`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    records: BTreeMap<String, StoreRecord>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for `id`, returning the previous one.
    pub fn insert(&mut self, id: impl Into<String>, record: StoreRecord) -> Option<StoreRecord> {
        self.records.insert(id.into(), record)
    }

    /// Builder form of `insert`.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, record: StoreRecord) -> Self {
        self.insert(id, record);
        self
    }

    /// Borrow the record for `id`.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<&StoreRecord> {
        self.records.get(id)
    }

    /// Iterate records in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoreRecord)> {
        self.records.iter()
    }

    /// Load a snapshot in the JSON interchange shape.
    pub fn from_json_value(value: Value) -> Result<Self, CacheError> {
        serde_json::from_value(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Load a snapshot from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, CacheError> {
        serde_json::from_str(text).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Render the JSON interchange shape.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        Value::Object(
            self.records
                .iter()
                .map(|(id, record)| (id.clone(), record.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, StoreRecord)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, StoreRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl StoreReader for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Cow<'_, StoreRecord>>, CacheError> {
        Ok(self.records.get(id).map(Cow::Borrowed))
    }

    fn has(&self, id: &str) -> Result<bool, CacheError> {
        Ok(self.records.contains_key(id))
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.records.len())
    }
}

// =============================================================================
// STORE BACKEND
// =============================================================================

/// Storage backend a caller resolves against.
#[derive(Debug)]
pub enum StoreBackend {
    /// In-memory store (fast, volatile unless explicitly saved).
    InMemory(MemoryStore),
    /// Disk-backed store using redb.
    Persistent(RedbStore),
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StoreBackend {
    /// Human-readable backend name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "memory",
            Self::Persistent(_) => "redb",
        }
    }

    /// Copy every record into a `MemoryStore` (used for exports).
    pub fn to_memory(&self) -> Result<MemoryStore, CacheError> {
        match self {
            Self::InMemory(store) => Ok(store.clone()),
            Self::Persistent(store) => store.to_memory(),
        }
    }
}

impl StoreReader for StoreBackend {
    fn get(&self, id: &str) -> Result<Option<Cow<'_, StoreRecord>>, CacheError> {
        match self {
            Self::InMemory(store) => store.get(id),
            Self::Persistent(store) => store.get(id),
        }
    }

    fn has(&self, id: &str) -> Result<bool, CacheError> {
        match self {
            Self::InMemory(store) => store.has(id),
            Self::Persistent(store) => store.has(id),
        }
    }

    fn len(&self) -> Result<usize, CacheError> {
        match self {
            Self::InMemory(store) => store.len(),
            Self::Persistent(store) => store.len(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
