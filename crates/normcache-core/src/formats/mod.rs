//! # Serialization Formats
//!
//! Binary encodings of store records and whole-store snapshots.
//! File I/O operations are in the app layer.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, decode_record, encode_record,
    store_from_bytes, store_to_bytes,
};
