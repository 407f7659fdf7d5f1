//! # normcache-core
//!
//! The read path of a normalized query cache - THE LOGIC.
//!
//! Data fetched from a server is flattened (elsewhere) into entity records
//! keyed by identity. This crate reconstructs nested result trees from those
//! records on demand, producing as much of a query's result as the store
//! holds and reporting whether anything was missing. It never fetches.
//!
//! ## Layout
//!
//! - `types` - stored values, records, errors
//! - `store` / `storage` - read access (in-memory and redb-backed)
//! - `store_key` - field name + arguments -> record key
//! - `document` - structured query documents
//! - `executor` - generic depth-first walk over a pluggable `FieldResolver`
//! - `read` - the store field resolver and the read/diff entry points
//! - `fragments` - aggregation of per-type fragment failures
//! - `formats` - binary snapshot and record encodings
//!
//! ## Architectural Constraints
//!
//! - Synchronous: one resolution is one uninterrupted call tree
//! - Read-only: the store is never mutated
//! - Per-call state: every resolution owns its own context, no globals
//! - Silent: no logging, every failure is returned to the caller

// =============================================================================
// MODULES
// =============================================================================

pub mod document;
pub mod executor;
pub mod formats;
pub mod fragments;
pub mod primitives;
pub mod read;
pub mod storage;
pub mod store;
pub mod store_key;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Arguments, CacheError, ErrorKind, IdValue, StoreRecord, StoreValue};

// =============================================================================
// RE-EXPORTS: Read Path
// =============================================================================

pub use document::{
    Condition, Document, Field, FragmentDefinition, FragmentSpread, IncludeSkip, InlineFragment,
    InputValue, Operation, OperationKind, Selection, SelectionSet, VariableDefinition, Variables,
};
pub use executor::{
    FieldResolver, FieldValue, FragmentMatch, IdentityMapper, ResultMapper, execute,
};
pub use fragments::{FragmentErrors, handle_fragment_errors};
pub use read::{
    DiffResult, PossibleTypes, ReadContext, ReadOptions, StoreFieldResolver,
    diff_query_against_store, read_query_from_store, resolve_store_field,
};
pub use store::{MemoryStore, StoreBackend, StoreReader};
pub use store_key::store_key_name;
pub use storage::RedbStore;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{store_from_bytes, store_to_bytes};
