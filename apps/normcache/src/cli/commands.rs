//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! `run_*` functions do the work and return data; `cmd_*` functions wrap
//! them and print.

use super::{Backend, SnapshotFormat};
use normcache_core::{
    CacheError, DiffResult, Document, MemoryStore, ReadOptions, RedbStore, StoreBackend,
    StoreReader, Variables, diff_query_against_store, formats::MAX_PERSISTENCE_PAYLOAD_SIZE,
    primitives::MAGIC_BYTES, read_query_from_store, store_from_bytes, store_to_bytes,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a query document or variables file (10 MB).
const MAX_QUERY_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum size of a snapshot file.
///
/// Matches the largest payload the binary decoder accepts.
const MAX_SNAPSHOT_FILE_SIZE: u64 = MAX_PERSISTENCE_PAYLOAD_SIZE as u64;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CacheError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CacheError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CacheError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
///
/// Canonicalizes the path, resolving symlinks and "..".
fn validate_file_path(path: &Path) -> Result<PathBuf, CacheError> {
    let canonical = path.canonicalize().map_err(|e| {
        CacheError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CacheError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: its parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, CacheError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CacheError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CacheError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CacheError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Validate and read an input file.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, CacheError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| CacheError::Io(format!("Read file '{}': {}", path.display(), e)))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CacheError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CacheError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// READ / DIFF COMMANDS
// =============================================================================

/// Resolve `query` against the store, strict unless configured otherwise.
pub fn run_read(
    db_path: &Path,
    backend: Backend,
    query: &Path,
    variables: Option<&Path>,
    options: &ReadOptions,
) -> Result<Value, CacheError> {
    let store = open_store(db_path, backend)?;
    let document = load_document(query)?;
    let variables = load_variables(variables)?;

    let result = read_query_from_store(&store, &document, variables.as_ref(), options)?;
    tracing::debug!(query = %query.display(), "Query resolved");
    Ok(result)
}

/// Resolve `query` against the store, reporting missing data.
pub fn run_diff(
    db_path: &Path,
    backend: Backend,
    query: &Path,
    variables: Option<&Path>,
    options: &ReadOptions,
) -> Result<DiffResult, CacheError> {
    let store = open_store(db_path, backend)?;
    let document = load_document(query)?;
    let variables = load_variables(variables)?;

    let diff = diff_query_against_store(&store, &document, variables.as_ref(), options)?;
    if diff.is_missing {
        tracing::warn!(query = %query.display(), "Store is missing data for this query");
    } else {
        tracing::debug!(query = %query.display(), "Query fully resolved");
    }
    Ok(diff)
}

/// Print the result of `run_read`.
pub fn cmd_read(
    db_path: &Path,
    backend: Backend,
    query: &Path,
    variables: Option<&Path>,
    options: &ReadOptions,
) -> Result<(), CacheError> {
    let result = run_read(db_path, backend, query, variables, options)?;
    print_json(&result)
}

/// Print the result of `run_diff` as `{ "result", "isMissing" }`.
pub fn cmd_diff(
    db_path: &Path,
    backend: Backend,
    query: &Path,
    variables: Option<&Path>,
    options: &ReadOptions,
) -> Result<(), CacheError> {
    let diff = run_diff(db_path, backend, query, variables, options)?;
    print_json(&diff)
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(db_path: &Path, backend: Backend, json_mode: bool) -> Result<(), CacheError> {
    let store = open_store(db_path, backend)?;
    let records = store.len()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend.as_str(),
            "records": records,
        }));
    }

    println!("normcache Store Status");
    println!("======================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend.as_str());
    println!();
    println!("Records:  {}", records);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Replace the store contents with the snapshot at `input`.
///
/// Returns the number of records imported.
pub fn run_import(db_path: &Path, backend: Backend, input: &Path) -> Result<usize, CacheError> {
    let snapshot = read_snapshot(input)?;

    let count = match backend {
        Backend::Redb => {
            let mut store = RedbStore::open(db_path)?;
            store.import(&snapshot)?
        }
        Backend::File => {
            save_snapshot_file(&snapshot, db_path)?;
            snapshot.len()?
        }
    };

    tracing::info!(records = count, input = %input.display(), "Imported snapshot");
    Ok(count)
}

/// Import a snapshot and report the record count.
pub fn cmd_import(
    db_path: &Path,
    backend: Backend,
    input: &Path,
    json_mode: bool,
) -> Result<(), CacheError> {
    let count = run_import(db_path, backend, input)?;

    if json_mode {
        return print_json(&serde_json::json!({ "imported": count }));
    }
    println!("Imported {} records", count);
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write the whole store to `output`. Returns the number of bytes written.
pub fn run_export(
    db_path: &Path,
    backend: Backend,
    output: &Path,
    format: SnapshotFormat,
) -> Result<usize, CacheError> {
    let validated_output = validate_output_path(output)?;
    let store = open_store(db_path, backend)?.to_memory()?;

    let data = encode_snapshot(&store, format)?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| CacheError::Io(format!("Write file: {}", e)))?;

    tracing::info!(bytes = data.len(), output = %validated_output.display(), "Exported store");
    Ok(data.len())
}

/// Export the store and report what was written.
pub fn cmd_export(
    db_path: &Path,
    backend: Backend,
    output: &Path,
    format: SnapshotFormat,
    json_mode: bool,
) -> Result<(), CacheError> {
    let bytes = run_export(db_path, backend, output, format)?;

    if json_mode {
        return print_json(&serde_json::json!({
            "output": output.to_string_lossy(),
            "bytes": bytes,
        }));
    }
    println!("Exported {} bytes to {:?}", bytes, output);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty store.
pub fn cmd_init(db_path: &Path, backend: Backend, force: bool) -> Result<(), CacheError> {
    if db_path.exists() && !force {
        return Err(CacheError::Io(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    match backend {
        Backend::Redb => {
            let mut store = RedbStore::open(db_path)?;
            store.clear()?;
            println!("Initialized new redb store at {:?}", db_path);
        }
        Backend::File => {
            save_snapshot_file(&MemoryStore::new(), db_path)?;
            println!("Initialized new file store at {:?}", db_path);
        }
    }

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the store at `db_path` with the specified backend.
///
/// A missing file-backend store reads as empty; a missing redb store is
/// created.
pub fn open_store(db_path: &Path, backend: Backend) -> Result<StoreBackend, CacheError> {
    let store = match backend {
        Backend::Redb => StoreBackend::Persistent(RedbStore::open(db_path)?),
        Backend::File if db_path.exists() => StoreBackend::InMemory(read_snapshot(db_path)?),
        Backend::File => StoreBackend::default(),
    };
    tracing::debug!(database = %db_path.display(), backend = store.name(), "Store opened");
    Ok(store)
}

/// Load a query document from a JSON file.
pub fn load_document(path: &Path) -> Result<Document, CacheError> {
    let data = read_input(path, MAX_QUERY_FILE_SIZE)?;
    serde_json::from_slice(&data)
        .map_err(|e| CacheError::InvalidDocument(format!("{}: {}", path.display(), e)))
}

/// Load variables from a JSON object file, if one was given.
pub fn load_variables(path: Option<&Path>) -> Result<Option<Variables>, CacheError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let data = read_input(path, MAX_QUERY_FILE_SIZE)?;

    match serde_json::from_slice(&data) {
        Ok(Value::Object(variables)) => Ok(Some(variables)),
        Ok(_) => Err(CacheError::InvalidDocument(format!(
            "{}: variables must be a JSON object",
            path.display()
        ))),
        Err(e) => Err(CacheError::Serialization(format!("{}: {}", path.display(), e))),
    }
}

/// Read a snapshot file, detecting the binary header.
pub fn read_snapshot(path: &Path) -> Result<MemoryStore, CacheError> {
    let data = read_input(path, MAX_SNAPSHOT_FILE_SIZE)?;

    if data.starts_with(MAGIC_BYTES) {
        return store_from_bytes(&data);
    }

    let text = std::str::from_utf8(&data)
        .map_err(|e| CacheError::Serialization(format!("{}: {}", path.display(), e)))?;
    MemoryStore::from_json_str(text)
}

/// Encode a store in the given snapshot format.
pub fn encode_snapshot(store: &MemoryStore, format: SnapshotFormat) -> Result<Vec<u8>, CacheError> {
    match format {
        SnapshotFormat::Binary => store_to_bytes(store),
        SnapshotFormat::Json => serde_json::to_vec_pretty(&store.to_json_value())
            .map_err(|e| CacheError::Serialization(e.to_string())),
    }
}

/// Save a file-backend store (binary snapshot).
fn save_snapshot_file(store: &MemoryStore, db_path: &Path) -> Result<(), CacheError> {
    let data = store_to_bytes(store)?;
    std::fs::write(db_path, &data).map_err(|e| CacheError::Io(format!("Write db: {}", e)))
}
