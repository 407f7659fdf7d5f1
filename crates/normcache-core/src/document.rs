//! # Query Documents
//!
//! The structured form of a query, as produced by an upstream parser and
//! validator. The read path never sees query text.
//!
//! Documents deserialize from JSON:
//!
//! ```json
//! {
//!   "operation": {
//!     "kind": "query",
//!     "variable_definitions": [{"name": "first", "default_value": 10}],
//!     "selection_set": [
//!       {"kind": "field", "name": "friends",
//!        "arguments": {"first": {"variable": "first"}},
//!        "selection_set": [{"kind": "field", "name": "name"}]},
//!       {"kind": "fragment_spread", "name": "HeroDetails"}
//!     ]
//!   },
//!   "fragments": [
//!     {"name": "HeroDetails", "type_condition": "Human",
//!      "selection_set": [{"kind": "field", "name": "height"}]}
//!   ]
//! }
//! ```

use crate::{Arguments, CacheError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Variable values supplied with a query.
pub type Variables = Map<String, Value>;

/// Ordered selections of one object.
pub type SelectionSet = Vec<Selection>;

// =============================================================================
// DOCUMENT
// =============================================================================

/// One executable operation plus the fragments it may spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub operation: Operation,
    #[serde(default)]
    pub fragments: Vec<FragmentDefinition>,
}

impl Document {
    /// Anonymous query selecting `selection_set` from the root.
    #[must_use]
    pub fn query(selection_set: SelectionSet) -> Self {
        Self {
            operation: Operation {
                kind: OperationKind::Query,
                name: None,
                variable_definitions: Vec::new(),
                selection_set,
            },
            fragments: Vec::new(),
        }
    }

    /// Add a named fragment definition.
    #[must_use]
    pub fn with_fragment(mut self, fragment: FragmentDefinition) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Add a variable definition with an optional default.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, default_value: Option<Value>) -> Self {
        self.operation.variable_definitions.push(VariableDefinition {
            name: name.into(),
            default_value,
        });
        self
    }

    /// The query operation of this document.
    ///
    /// Fails if the operation is a mutation or subscription.
    pub fn query_definition(&self) -> Result<&Operation, CacheError> {
        match self.operation.kind {
            OperationKind::Query => Ok(&self.operation),
            kind => Err(CacheError::InvalidDocument(format!(
                "Must contain a query definition, found a {}",
                kind.as_str()
            ))),
        }
    }

    /// The fragment definition named `name`.
    #[must_use]
    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.iter().find(|fragment| fragment.name == name)
    }

    /// Defaults declared by the operation's variable definitions.
    #[must_use]
    pub fn default_variables(&self) -> Variables {
        self.operation
            .variable_definitions
            .iter()
            .filter_map(|definition| {
                definition
                    .default_value
                    .as_ref()
                    .map(|value| (definition.name.clone(), value.clone()))
            })
            .collect()
    }
}

/// Operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Keyword of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// An operation definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variable_definitions: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
}

/// A declared operation variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(default)]
    pub default_value: Option<Value>,
}

/// A named fragment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: SelectionSet,
}

impl FragmentDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: SelectionSet,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            selection_set,
        }
    }
}

// =============================================================================
// SELECTIONS
// =============================================================================

/// One entry of a selection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Field(Field),
    InlineFragment(InlineFragment),
    FragmentSpread(FragmentSpread),
}

impl Selection {
    /// Leaf field without arguments.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(Field::new(name))
    }

    /// Field without arguments selecting `selection_set` from its value.
    #[must_use]
    pub fn object(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::Field(Field::new(name).with_selection_set(selection_set))
    }

    /// Inline fragment on `type_condition`.
    #[must_use]
    pub fn inline_fragment(type_condition: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::InlineFragment(InlineFragment {
            type_condition: Some(type_condition.into()),
            include_skip: IncludeSkip::default(),
            selection_set,
        })
    }

    /// Spread of the fragment named `name`.
    #[must_use]
    pub fn fragment_spread(name: impl Into<String>) -> Self {
        Self::FragmentSpread(FragmentSpread {
            name: name.into(),
            include_skip: IncludeSkip::default(),
        })
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

/// A field selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub arguments: BTreeMap<String, InputValue>,
    #[serde(default)]
    pub include_skip: IncludeSkip,
    #[serde(default)]
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// Leaf field without arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: BTreeMap::new(),
            include_skip: IncludeSkip::default(),
            selection_set: None,
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_include_skip(mut self, include_skip: IncludeSkip) -> Self {
        self.include_skip = include_skip;
        self
    }

    #[must_use]
    pub fn with_selection_set(mut self, selection_set: SelectionSet) -> Self {
        self.selection_set = Some(selection_set);
        self
    }

    /// Key of this field in the result object: the alias if any, else the name.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Resolve argument values against `variables`.
    ///
    /// Returns `None` when the field declares no arguments. Arguments that
    /// reference an unset variable are dropped.
    #[must_use]
    pub fn resolve_arguments(&self, variables: &Variables) -> Option<Arguments> {
        if self.arguments.is_empty() {
            return None;
        }
        Some(
            self.arguments
                .iter()
                .filter_map(|(name, value)| {
                    value.resolve(variables).map(|value| (name.clone(), value))
                })
                .collect(),
        )
    }
}

/// An inline fragment, with or without a type condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    #[serde(default)]
    pub type_condition: Option<String>,
    #[serde(default)]
    pub include_skip: IncludeSkip,
    pub selection_set: SelectionSet,
}

/// A spread of a named fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub name: String,
    #[serde(default)]
    pub include_skip: IncludeSkip,
}

// =============================================================================
// INPUT VALUES
// =============================================================================

/// An argument value as written in the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValue {
    /// Reference to an operation variable.
    Variable(String),
    /// Constant value.
    Literal(Value),
    /// List whose items may reference variables.
    List(Vec<InputValue>),
    /// Input object whose fields may reference variables.
    Object(BTreeMap<String, InputValue>),
}

impl InputValue {
    /// Constant value.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Reference to the variable `name`.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Substitute variables.
    ///
    /// An unset variable yields `None`. Inside a list it becomes `null`;
    /// inside an object the field is dropped.
    #[must_use]
    pub fn resolve(&self, variables: &Variables) -> Option<Value> {
        match self {
            Self::Variable(name) => variables.get(name).cloned(),
            Self::Literal(value) => Some(value.clone()),
            Self::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.resolve(variables).unwrap_or(Value::Null))
                    .collect(),
            )),
            Self::Object(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, value)| {
                        value.resolve(variables).map(|value| (name.clone(), value))
                    })
                    .collect(),
            )),
        }
    }
}

// =============================================================================
// @include / @skip
// =============================================================================

/// The `@include(if:)` and `@skip(if:)` conditions of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeSkip {
    #[serde(default = "Condition::yes")]
    pub include: Condition,
    #[serde(default = "Condition::no")]
    pub skip: Condition,
}

impl Default for IncludeSkip {
    fn default() -> Self {
        Self {
            include: Condition::Yes,
            skip: Condition::No,
        }
    }
}

impl IncludeSkip {
    /// `@include(if: $name)`.
    #[must_use]
    pub fn include_if(name: impl Into<String>) -> Self {
        Self {
            include: Condition::Variable(name.into()),
            skip: Condition::No,
        }
    }

    /// `@skip(if: $name)`.
    #[must_use]
    pub fn skip_if(name: impl Into<String>) -> Self {
        Self {
            include: Condition::Yes,
            skip: Condition::Variable(name.into()),
        }
    }

    /// Whether the selection is left out for these variables.
    ///
    /// A variable that is unset or not a boolean counts as absent: `skip`
    /// defaults to false and `include` to true.
    #[must_use]
    pub fn should_skip(&self, variables: &Variables) -> bool {
        self.skip.eval(variables).unwrap_or(false) || !self.include.eval(variables).unwrap_or(true)
    }
}

/// A directive's `if` argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Yes,
    No,
    Variable(String),
}

impl Condition {
    fn yes() -> Self {
        Self::Yes
    }

    fn no() -> Self {
        Self::No
    }

    /// Evaluate against `variables`.
    #[must_use]
    pub fn eval(&self, variables: &Variables) -> Option<bool> {
        match self {
            Self::Yes => Some(true),
            Self::No => Some(false),
            Self::Variable(name) => variables.get(name).and_then(Value::as_bool),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variables(value: Value) -> Variables {
        match value {
            Value::Object(object) => object,
            _ => Variables::new(),
        }
    }

    #[test]
    fn document_deserializes_from_json() {
        let document: Document = serde_json::from_value(json!({
            "operation": {
                "kind": "query",
                "name": "Hero",
                "variable_definitions": [{"name": "episode", "default_value": "JEDI"}],
                "selection_set": [
                    {"kind": "field", "name": "hero", "alias": "leader",
                     "arguments": {"episode": {"variable": "episode"}},
                     "selection_set": [
                        {"kind": "field", "name": "name"},
                        {"kind": "inline_fragment", "type_condition": "Droid",
                         "selection_set": [{"kind": "field", "name": "primaryFunction"}]},
                        {"kind": "fragment_spread", "name": "HumanDetails",
                         "include_skip": {"skip": {"variable": "brief"}}}
                     ]}
                ]
            },
            "fragments": [
                {"name": "HumanDetails", "type_condition": "Human",
                 "selection_set": [{"kind": "field", "name": "height"}]}
            ]
        }))
        .expect("deserialize");

        assert_eq!(document.operation.name.as_deref(), Some("Hero"));
        assert!(document.fragment("HumanDetails").is_some());
        assert_eq!(
            document.default_variables(),
            variables(json!({"episode": "JEDI"}))
        );

        let Selection::Field(hero) = &document.operation.selection_set[0] else {
            panic!("expected a field");
        };
        assert_eq!(hero.response_key(), "leader");
        let nested = hero.selection_set.as_ref().expect("selection set");
        let Selection::FragmentSpread(spread) = &nested[2] else {
            panic!("expected a fragment spread");
        };
        assert_eq!(spread.include_skip, IncludeSkip::skip_if("brief"));
    }

    #[test]
    fn query_definition_rejects_mutations() {
        let mut document = Document::query(vec![Selection::field("a")]);
        assert!(document.query_definition().is_ok());

        document.operation.kind = OperationKind::Mutation;
        let err = document.query_definition().expect_err("mutation");
        assert!(err.to_string().contains("query definition"));
    }

    #[test]
    fn arguments_resolve_variables() {
        let field = Field::new("search")
            .with_argument("text", InputValue::variable("q"))
            .with_argument("limit", InputValue::literal(5))
            .with_argument("cursor", InputValue::variable("unset"));

        let args = field
            .resolve_arguments(&variables(json!({"q": "rust"})))
            .expect("arguments");
        assert_eq!(args.get("text"), Some(&json!("rust")));
        assert_eq!(args.get("limit"), Some(&json!(5)));
        assert!(!args.contains_key("cursor"));
    }

    #[test]
    fn field_without_arguments_resolves_to_none() {
        assert!(Field::new("name").resolve_arguments(&Variables::new()).is_none());
    }

    #[test]
    fn nested_input_values_resolve() {
        let value = InputValue::Object(BTreeMap::from([
            ("ids".to_string(), InputValue::List(vec![
                InputValue::literal(1),
                InputValue::variable("missing"),
            ])),
            ("owner".to_string(), InputValue::variable("missing")),
        ]));
        assert_eq!(
            value.resolve(&Variables::new()),
            Some(json!({"ids": [1, null]}))
        );
    }

    #[test]
    fn include_skip_evaluation() {
        let vars = variables(json!({"on": true, "off": false, "text": "x"}));

        assert!(!IncludeSkip::default().should_skip(&vars));
        assert!(IncludeSkip::skip_if("on").should_skip(&vars));
        assert!(!IncludeSkip::skip_if("off").should_skip(&vars));
        assert!(!IncludeSkip::include_if("on").should_skip(&vars));
        assert!(IncludeSkip::include_if("off").should_skip(&vars));
        // Non-boolean and unset variables fall back to the defaults.
        assert!(!IncludeSkip::skip_if("text").should_skip(&vars));
        assert!(!IncludeSkip::include_if("unset").should_skip(&vars));
    }
}
