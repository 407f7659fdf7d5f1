//! # Persistence Format
//!
//! Binary serialization for store records and store snapshots.
//!
//! Snapshot format: 5-byte header + postcard-serialized records.
//! - 4 bytes: Magic ("NCAC")
//! - 1 byte: Version
//!
//! Single records (as kept in redb rows) are header-less postcard bytes.
//!
//! postcard is not self-describing, so JSON payloads (scalars and opaque
//! blobs) are carried as compact JSON text inside the postcard encoding.
//!
//! ## Limits
//!
//! Payload size and header are validated before any payload parsing.

use crate::store::MemoryStore;
use crate::{CacheError, IdValue, StoreRecord, StoreValue, primitives};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum allowed payload size for a snapshot.
///
/// Validated BEFORE attempting deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Snapshot header: magic bytes followed by the format version.
const HEADER_LEN: usize = primitives::MAGIC_BYTES.len() + 1;

// =============================================================================
// ENCODED SHAPES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
enum EncodedValue {
    Scalar(String),
    Json(String),
    Reference { id: String, generated: bool },
    List(Vec<EncodedValue>),
}

type EncodedRecord = Vec<(String, EncodedValue)>;

impl From<&StoreValue> for EncodedValue {
    fn from(value: &StoreValue) -> Self {
        match value {
            StoreValue::Scalar(scalar) => Self::Scalar(scalar.to_string()),
            StoreValue::Json(payload) => Self::Json(payload.to_string()),
            StoreValue::Reference(id) => Self::Reference {
                id: id.id.clone(),
                generated: id.generated,
            },
            StoreValue::List(items) => Self::List(items.iter().map(Self::from).collect()),
        }
    }
}

impl TryFrom<EncodedValue> for StoreValue {
    type Error = CacheError;

    fn try_from(value: EncodedValue) -> Result<Self, Self::Error> {
        Ok(match value {
            EncodedValue::Scalar(text) => StoreValue::Scalar(parse_json(&text)?),
            EncodedValue::Json(text) => StoreValue::Json(parse_json(&text)?),
            EncodedValue::Reference { id, generated } => {
                StoreValue::Reference(IdValue { id, generated })
            }
            EncodedValue::List(items) => StoreValue::List(
                items
                    .into_iter()
                    .map(StoreValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn parse_json(text: &str) -> Result<Value, CacheError> {
    serde_json::from_str(text).map_err(|e| CacheError::Serialization(e.to_string()))
}

fn encoded_record(record: &StoreRecord) -> EncodedRecord {
    record
        .iter()
        .map(|(key, value)| (key.clone(), EncodedValue::from(value)))
        .collect()
}

fn decoded_record(encoded: EncodedRecord) -> Result<StoreRecord, CacheError> {
    encoded
        .into_iter()
        .map(|(key, value)| StoreValue::try_from(value).map(|value| (key, value)))
        .collect()
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Encode one record as header-less postcard bytes.
pub fn encode_record(record: &StoreRecord) -> Result<Vec<u8>, CacheError> {
    postcard::to_stdvec(&encoded_record(record))
        .map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Decode one record produced by `encode_record`.
pub fn decode_record(bytes: &[u8]) -> Result<StoreRecord, CacheError> {
    let encoded: EncodedRecord = postcard::from_bytes(bytes)
        .map_err(|e| CacheError::Serialization(format!("Failed to decode record: {}", e)))?;
    decoded_record(encoded)
}

/// Serialize a store to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn store_to_bytes(store: &MemoryStore) -> Result<Vec<u8>, CacheError> {
    let records: Vec<(String, EncodedRecord)> = store
        .iter()
        .map(|(id, record)| (id.clone(), encoded_record(record)))
        .collect();

    let payload =
        postcard::to_stdvec(&records).map_err(|e| CacheError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(primitives::MAGIC_BYTES);
    result.push(primitives::FORMAT_VERSION);
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a store from bytes.
///
/// This is a pure transformation - no file I/O.
///
/// Size, magic bytes and version are checked before the payload is
/// touched.
pub fn store_from_bytes(bytes: &[u8]) -> Result<MemoryStore, CacheError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(CacheError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let Some((magic, rest)) = bytes.split_first_chunk::<4>() else {
        return Err(CacheError::Serialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    };
    if magic != primitives::MAGIC_BYTES {
        return Err(CacheError::Serialization("Not a normcache snapshot".to_string()));
    }
    let Some((&version, payload)) = rest.split_first() else {
        return Err(CacheError::Serialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    };
    if version != primitives::FORMAT_VERSION {
        return Err(CacheError::Serialization(format!(
            "Unsupported snapshot version: {} (expected {})",
            version,
            primitives::FORMAT_VERSION
        )));
    }

    let records: Vec<(String, EncodedRecord)> = postcard::from_bytes(payload).map_err(|e| {
        CacheError::Serialization(format!("Failed to deserialize store data: {}", e))
    })?;

    records
        .into_iter()
        .map(|(id, record)| decoded_record(record).map(|record| (id, record)))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
