//! # Fixed Identifiers and Limits
//!
//! Constants shared by the read path, the store backends and the
//! persistence format. These are compiled in and immutable at runtime.

/// Identifier of the record that holds the root query fields.
///
/// Every top-level resolution starts here unless the caller supplies
/// another root through `ReadOptions::root_id`.
pub const ROOT_QUERY: &str = "ROOT_QUERY";

/// Store key under which a record keeps its concrete type name.
///
/// Used by fragment matching to decide whether a type condition applies.
pub const TYPENAME_FIELD: &str = "__typename";

/// Magic bytes for the binary store snapshot header.
///
/// - File Header = Magic Bytes ("NCAC") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"NCAC";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum nesting of selection sets (fields and fragments) in one walk.
///
/// Stored references may form cycles, but a walk is bounded by the query
/// shape. Fragment cycles are rejected separately; this limit trips on
/// documents nested deeper than any real query.
pub const MAX_SELECTION_DEPTH: usize = 128;
