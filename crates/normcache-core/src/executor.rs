//! # Query Executor
//!
//! Generic, storage-agnostic walk of a query document.
//!
//! The executor owns the shape of the walk: depth-first, in declaration
//! order, honoring aliases, arguments, `@include`/`@skip` and fragments.
//! Everything it knows about data comes from a `FieldResolver`, so the
//! same walker can drive the store read path or any other resolution
//! strategy.
//!
//! Contract with the resolver:
//! - The resolver's value for a leaf field goes into the result as is.
//! - For a field with a sub-selection, a `FieldValue::Reference` is walked
//!   again with the referenced identifier as the new object; lists are
//!   walked element by element.
//! - A field whose value is absent (`None`) is left out of the result.

use crate::document::{Document, Selection, SelectionSet, Variables};
use crate::fragments::{FragmentErrors, handle_fragment_errors};
use crate::primitives::MAX_SELECTION_DEPTH;
use crate::{Arguments, CacheError, ErrorKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// RESOLVER SEAM
// =============================================================================

/// Value a resolver produces for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Data placed into the result tree directly.
    Leaf(Value),
    /// Identifier of another object to walk the sub-selection against.
    Reference(String),
    /// Sequence, walked element by element.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Render without a sub-selection: references become their identifier.
    #[must_use]
    pub fn into_leaf(self) -> Value {
        match self {
            Self::Leaf(value) => value,
            Self::Reference(id) => Value::String(id),
            Self::List(items) => Value::Array(items.into_iter().map(Self::into_leaf).collect()),
        }
    }
}

/// Whether a fragment's type condition applies to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMatch {
    /// The object is known to be of the condition's type.
    Match,
    /// The object is known to be of another type.
    NoMatch,
    /// The object's type is unknown; attempt the fragment and record the
    /// outcome instead of failing.
    Heuristic,
}

/// Produces field values for the executor.
///
/// `C` is the per-walk context the resolver threads through every call.
pub trait FieldResolver<C> {
    /// Value of `field_name` with `args` on the object `object_id`.
    ///
    /// `Ok(None)` means absent: the field is omitted from the result.
    fn resolve(
        &self,
        field_name: &str,
        object_id: &str,
        args: Option<&Arguments>,
        ctx: &mut C,
    ) -> Result<Option<FieldValue>, CacheError>;

    /// Whether a fragment on `type_condition` applies to `object_id`.
    fn match_fragment(
        &self,
        _object_id: &str,
        _type_condition: &str,
        _ctx: &mut C,
    ) -> Result<FragmentMatch, CacheError> {
        Ok(FragmentMatch::Heuristic)
    }

    /// Replace the context's "a field was missing" flag, returning the old
    /// value.
    ///
    /// The executor uses this to scope missing data to one heuristic
    /// fragment attempt. Resolvers that never report missing data keep the
    /// default.
    fn swap_missing(&self, _ctx: &mut C, _missing: bool) -> bool {
        false
    }
}

/// Combines the fields resolved for one object into its result value.
pub trait ResultMapper {
    fn map(&self, fields: Map<String, Value>, object_id: &str) -> Value;
}

/// Places the resolved fields into the parent unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl ResultMapper for IdentityMapper {
    fn map(&self, fields: Map<String, Value>, _object_id: &str) -> Value {
        Value::Object(fields)
    }
}

// =============================================================================
// EXECUTION
// =============================================================================

/// Walk `document`'s operation starting at `root_id`.
///
/// Declared variable defaults are applied under `variables`.
pub fn execute<C, R, M>(
    resolver: &R,
    document: &Document,
    root_id: &str,
    ctx: &mut C,
    variables: &Variables,
    mapper: &M,
) -> Result<Value, CacheError>
where
    R: FieldResolver<C> + ?Sized,
    M: ResultMapper + ?Sized,
{
    let mut merged = document.default_variables();
    merged.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));

    let walker = Walker {
        resolver,
        mapper,
        document,
        variables: merged,
    };

    let mut active_spreads = Vec::new();
    let fields = walker.walk_selection_set(
        &document.operation.selection_set,
        root_id,
        ctx,
        0,
        &mut active_spreads,
    )?;
    Ok(mapper.map(fields, root_id))
}

struct Walker<'a, R: ?Sized, M: ?Sized> {
    resolver: &'a R,
    mapper: &'a M,
    document: &'a Document,
    variables: Variables,
}

/// Outcomes of the heuristic fragment attempts on one object.
#[derive(Default)]
struct Attempts {
    /// Strict failures per type condition.
    errors: FragmentErrors,
    /// Per type condition: whether any attempt left a field missing.
    missing: BTreeMap<String, bool>,
}

impl Attempts {
    fn record_success(&mut self, type_condition: &str, missing: bool) {
        self.errors.entry(type_condition.to_string()).or_insert(None);
        *self.missing.entry(type_condition.to_string()).or_insert(false) |= missing;
    }

    fn record_failure(&mut self, type_condition: &str, err: CacheError) {
        let entry = self.errors.entry(type_condition.to_string()).or_insert(None);
        if entry.is_none() {
            *entry = Some(err);
        }
    }

    /// Whether every attempted variant left data missing.
    fn all_missing(&self) -> bool {
        !self.missing.is_empty() && self.missing.values().all(|missing| *missing)
    }
}

impl<'a, R: ?Sized, M: ResultMapper + ?Sized> Walker<'a, R, M> {
    fn walk_selection_set<C>(
        &self,
        selection_set: &'a SelectionSet,
        object_id: &str,
        ctx: &mut C,
        depth: usize,
        active_spreads: &mut Vec<&'a str>,
    ) -> Result<Map<String, Value>, CacheError>
    where
        R: FieldResolver<C>,
    {
        if depth > MAX_SELECTION_DEPTH {
            return Err(CacheError::InvalidDocument(format!(
                "selection depth limit ({}) exceeded",
                MAX_SELECTION_DEPTH
            )));
        }

        let mut result = Map::new();
        let mut attempts = Attempts::default();

        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    if field.include_skip.should_skip(&self.variables) {
                        continue;
                    }
                    let args = field.resolve_arguments(&self.variables);
                    let Some(value) =
                        self.resolver
                            .resolve(&field.name, object_id, args.as_ref(), ctx)?
                    else {
                        continue;
                    };
                    let value = match &field.selection_set {
                        None => value.into_leaf(),
                        Some(sub) => {
                            self.walk_value(value, sub, ctx, depth + 1, active_spreads)?
                        }
                    };
                    merge_field(&mut result, field.response_key(), value);
                }
                Selection::InlineFragment(fragment) => {
                    if fragment.include_skip.should_skip(&self.variables) {
                        continue;
                    }
                    self.walk_fragment(
                        fragment.type_condition.as_deref(),
                        &fragment.selection_set,
                        object_id,
                        ctx,
                        depth + 1,
                        active_spreads,
                        &mut result,
                        &mut attempts,
                    )?;
                }
                Selection::FragmentSpread(spread) => {
                    if spread.include_skip.should_skip(&self.variables) {
                        continue;
                    }
                    let definition = self
                        .document
                        .fragment(&spread.name)
                        .ok_or_else(|| CacheError::UnknownFragment(spread.name.clone()))?;
                    if active_spreads.contains(&definition.name.as_str()) {
                        return Err(CacheError::InvalidDocument(format!(
                            "fragment cycle: {}",
                            definition.name
                        )));
                    }

                    active_spreads.push(&definition.name);
                    let walked = self.walk_fragment(
                        Some(definition.type_condition.as_str()),
                        &definition.selection_set,
                        object_id,
                        ctx,
                        depth + 1,
                        active_spreads,
                        &mut result,
                        &mut attempts,
                    );
                    active_spreads.pop();
                    walked?;
                }
            }
        }

        let all_missing = attempts.all_missing();
        handle_fragment_errors(attempts.errors)?;
        if all_missing {
            self.resolver.swap_missing(ctx, true);
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_fragment<C>(
        &self,
        type_condition: Option<&str>,
        selection_set: &'a SelectionSet,
        object_id: &str,
        ctx: &mut C,
        depth: usize,
        active_spreads: &mut Vec<&'a str>,
        result: &mut Map<String, Value>,
        attempts: &mut Attempts,
    ) -> Result<(), CacheError>
    where
        R: FieldResolver<C>,
    {
        let Some(type_condition) = type_condition else {
            let fields =
                self.walk_selection_set(selection_set, object_id, ctx, depth, active_spreads)?;
            deep_merge(result, fields);
            return Ok(());
        };

        match self.resolver.match_fragment(object_id, type_condition, ctx)? {
            FragmentMatch::NoMatch => Ok(()),
            FragmentMatch::Match => {
                let fields =
                    self.walk_selection_set(selection_set, object_id, ctx, depth, active_spreads)?;
                deep_merge(result, fields);
                Ok(())
            }
            FragmentMatch::Heuristic => {
                // Missing data inside an attempt belongs to that variant only.
                let outer_missing = self.resolver.swap_missing(ctx, false);
                let walked =
                    self.walk_selection_set(selection_set, object_id, ctx, depth, active_spreads);
                let attempt_missing = self.resolver.swap_missing(ctx, outer_missing);

                match walked {
                    Ok(fields) => {
                        deep_merge(result, fields);
                        attempts.record_success(type_condition, attempt_missing);
                        Ok(())
                    }
                    Err(err) if err.kind() == ErrorKind::Field => {
                        attempts.record_failure(type_condition, err);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    fn walk_value<C>(
        &self,
        value: FieldValue,
        selection_set: &'a SelectionSet,
        ctx: &mut C,
        depth: usize,
        active_spreads: &mut Vec<&'a str>,
    ) -> Result<Value, CacheError>
    where
        R: FieldResolver<C>,
    {
        match value {
            // Scalars (including null) under a sub-selection pass through.
            FieldValue::Leaf(value) => Ok(value),
            FieldValue::Reference(id) => {
                let fields =
                    self.walk_selection_set(selection_set, &id, ctx, depth, active_spreads)?;
                Ok(self.mapper.map(fields, &id))
            }
            FieldValue::List(items) => items
                .into_iter()
                .map(|item| self.walk_value(item, selection_set, ctx, depth, active_spreads))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

// =============================================================================
// RESULT MERGING
// =============================================================================

/// Insert `value` under `key`, merging with a value already there.
fn merge_field(target: &mut Map<String, Value>, key: &str, value: Value) {
    match target.get_mut(key) {
        Some(existing) => merge_values(existing, value),
        None => {
            target.insert(key.to_string(), value);
        }
    }
}

/// Merge every field of `source` into `target`.
fn deep_merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        merge_field(target, &key, value);
    }
}

/// Objects merge key-wise, same-length arrays element-wise, anything else
/// is replaced by `source`.
fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => deep_merge(target, source),
        (Value::Array(target), Value::Array(source)) if target.len() == source.len() => {
            for (t, s) in target.iter_mut().zip(source) {
                merge_values(t, s);
            }
        }
        (target, source) => *target = source,
    }
}

// =============================================================================
// TESTS
// =============================================================================
