//! # Reading Queries from the Store
//!
//! Resolves a query document against a normalized store without any
//! network access, producing as much of the result as the store holds.
//!
//! - `diff_query_against_store` returns the (possibly partial) result and
//!   whether any requested field was missing. Partial data is allowed by
//!   default.
//! - `read_query_from_store` returns only the result and is strict by
//!   default: the first missing field is an error.
//!
//! Both drive the generic executor with `StoreFieldResolver`.

use crate::document::{Document, Variables};
use crate::executor::{FieldResolver, FieldValue, FragmentMatch, IdentityMapper, execute};
use crate::primitives::ROOT_QUERY;
use crate::store::StoreReader;
use crate::store_key::store_key_name;
use crate::{Arguments, CacheError, StoreRecord, StoreValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Abstract type name -> concrete type names implementing it.
pub type PossibleTypes = BTreeMap<String, BTreeSet<String>>;

// =============================================================================
// OPTIONS & RESULTS
// =============================================================================

/// Options recognized by the read entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Tolerate missing fields (omit them) instead of failing.
    ///
    /// Unset means the entry point's default: `true` for
    /// `diff_query_against_store`, `false` for `read_query_from_store`.
    pub return_partial_data: Option<bool>,
    /// Object to start from; `ROOT_QUERY` when unset.
    pub root_id: Option<String>,
    /// Concrete types of each abstract type, for fragment matching.
    pub possible_types: PossibleTypes,
}

impl ReadOptions {
    /// Options with `return_partial_data` set explicitly.
    #[must_use]
    pub fn partial(return_partial_data: bool) -> Self {
        Self {
            return_partial_data: Some(return_partial_data),
            ..Self::default()
        }
    }

    /// Start resolution at `root_id` instead of `ROOT_QUERY`.
    #[must_use]
    pub fn with_root_id(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    /// Declare the concrete types of `abstract_type`.
    #[must_use]
    pub fn with_possible_types<I, T>(mut self, abstract_type: impl Into<String>, concrete: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.possible_types
            .entry(abstract_type.into())
            .or_default()
            .extend(concrete.into_iter().map(Into::into));
        self
    }
}

/// A (possibly partial) result and whether anything was missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub result: Value,
    pub is_missing: bool,
}

// =============================================================================
// TRAVERSAL CONTEXT
// =============================================================================

/// Per-resolution state threaded through every field lookup.
#[derive(Debug)]
pub struct ReadContext<'s, S: ?Sized> {
    /// The store being read.
    pub store: &'s S,
    /// Fail on the first missing field instead of recording it.
    pub throw_on_missing_field: bool,
    /// Set once any field was missing.
    pub has_missing_field: bool,
}

impl<'s, S: StoreReader + ?Sized> ReadContext<'s, S> {
    #[must_use]
    pub fn new(store: &'s S, throw_on_missing_field: bool) -> Self {
        Self {
            store,
            throw_on_missing_field,
            has_missing_field: false,
        }
    }
}

// =============================================================================
// FIELD RESOLVER
// =============================================================================

/// Produce the stored value of `field_name` with `args` on `object_id`.
///
/// - A missing record reads as an empty record.
/// - A missing field fails in strict mode, otherwise it marks the context
///   and reads as absent.
/// - JSON blobs unwrap to their payload; references become the target id.
pub fn resolve_store_field<S: StoreReader + ?Sized>(
    field_name: &str,
    object_id: &str,
    args: Option<&Arguments>,
    ctx: &mut ReadContext<'_, S>,
) -> Result<Option<FieldValue>, CacheError> {
    let record = ctx.store.get(object_id)?.unwrap_or_default();
    let store_key = store_key_name(field_name, args);

    match record.get(&store_key) {
        Some(value) => Ok(Some(FieldValue::from(value))),
        None if ctx.throw_on_missing_field => Err(CacheError::MissingField {
            store_key,
            object_id: object_id.to_string(),
            record: record.into_owned(),
        }),
        None => {
            ctx.has_missing_field = true;
            Ok(None)
        }
    }
}

impl From<&StoreValue> for FieldValue {
    fn from(value: &StoreValue) -> Self {
        match value {
            StoreValue::Scalar(scalar) => Self::Leaf(scalar.clone()),
            StoreValue::Json(payload) => Self::Leaf(payload.clone()),
            StoreValue::Reference(id) => Self::Reference(id.id.clone()),
            StoreValue::List(items) => Self::List(items.iter().map(Self::from).collect()),
        }
    }
}

/// `FieldResolver` reading from a `StoreReader`.
#[derive(Debug, Clone, Copy)]
pub struct StoreFieldResolver<'a> {
    possible_types: &'a PossibleTypes,
}

impl<'a> StoreFieldResolver<'a> {
    #[must_use]
    pub fn new(possible_types: &'a PossibleTypes) -> Self {
        Self { possible_types }
    }

    fn type_matches(&self, typename: &str, type_condition: &str) -> bool {
        typename == type_condition
            || self
                .possible_types
                .get(type_condition)
                .is_some_and(|concrete| concrete.contains(typename))
    }
}

impl<S: StoreReader + ?Sized> FieldResolver<ReadContext<'_, S>> for StoreFieldResolver<'_> {
    fn resolve(
        &self,
        field_name: &str,
        object_id: &str,
        args: Option<&Arguments>,
        ctx: &mut ReadContext<'_, S>,
    ) -> Result<Option<FieldValue>, CacheError> {
        resolve_store_field(field_name, object_id, args, ctx)
    }

    fn match_fragment(
        &self,
        object_id: &str,
        type_condition: &str,
        ctx: &mut ReadContext<'_, S>,
    ) -> Result<FragmentMatch, CacheError> {
        let record = ctx.store.get(object_id)?;
        let Some(typename) = record.as_deref().and_then(StoreRecord::typename) else {
            return Ok(FragmentMatch::Heuristic);
        };

        if self.type_matches(typename, type_condition) {
            Ok(FragmentMatch::Match)
        } else {
            Ok(FragmentMatch::NoMatch)
        }
    }

    fn swap_missing(&self, ctx: &mut ReadContext<'_, S>, missing: bool) -> bool {
        std::mem::replace(&mut ctx.has_missing_field, missing)
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Resolve `query` against `store`, reporting whether data was missing.
///
/// Partial data is allowed unless `options.return_partial_data` is
/// `Some(false)`; in strict mode the first missing field (depth-first,
/// declaration order) is returned as `CacheError::MissingField`.
pub fn diff_query_against_store<S: StoreReader + ?Sized>(
    store: &S,
    query: &Document,
    variables: Option<&Variables>,
    options: &ReadOptions,
) -> Result<DiffResult, CacheError> {
    query.query_definition()?;

    let return_partial_data = options.return_partial_data.unwrap_or(true);
    let root_id = options.root_id.as_deref().unwrap_or(ROOT_QUERY);
    let empty = Variables::new();

    let resolver = StoreFieldResolver::new(&options.possible_types);
    let mut ctx = ReadContext::new(store, !return_partial_data);

    let result = execute(
        &resolver,
        query,
        root_id,
        &mut ctx,
        variables.unwrap_or(&empty),
        &IdentityMapper,
    )?;

    Ok(DiffResult {
        result,
        is_missing: ctx.has_missing_field,
    })
}

/// Resolve `query` against `store`, returning only the result.
///
/// Strict unless `options.return_partial_data` is `Some(true)`.
pub fn read_query_from_store<S: StoreReader + ?Sized>(
    store: &S,
    query: &Document,
    variables: Option<&Variables>,
    options: &ReadOptions,
) -> Result<Value, CacheError> {
    let options = ReadOptions {
        return_partial_data: Some(options.return_partial_data.unwrap_or(false)),
        ..options.clone()
    };
    diff_query_against_store(store, query, variables, &options).map(|diff| diff.result)
}

// =============================================================================
// TESTS
// =============================================================================
