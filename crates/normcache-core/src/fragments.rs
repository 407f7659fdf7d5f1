//! # Fragment Error Aggregation
//!
//! When the concrete type of an object is unknown, the executor attempts
//! every fragment that applies to it and records, per type condition,
//! whether the attempt failed. A polymorphic field is only an error when
//! no variant could be resolved.

use crate::CacheError;
use std::collections::BTreeMap;

/// Outcome of each attempted fragment, keyed by type condition.
///
/// `None` means the attempt succeeded.
pub type FragmentErrors = BTreeMap<String, Option<CacheError>>;

/// Re-raise a recorded error if every attempted type failed.
///
/// - No attempts: no-op.
/// - At least one success: no-op.
/// - All failed: returns the error of the first type in key order.
pub fn handle_fragment_errors(fragment_errors: FragmentErrors) -> Result<(), CacheError> {
    let total = fragment_errors.len();
    let mut failures = fragment_errors.into_values().flatten();

    let Some(first) = failures.next() else {
        return Ok(());
    };
    let failed = 1 + failures.count();

    if failed == total { Err(first) } else { Ok(()) }
}

// =============================================================================
// TESTS
// =============================================================================
