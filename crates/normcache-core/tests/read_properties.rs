//! # Read Path Properties
//!
//! Behavior every implementation of the read path must show.
//!
//! ## Groups
//! - R0: Resolution (references, JSON blobs, lists, store keys)
//! - R1: Partial data (monotonicity, entry-point defaults)
//! - R2: Polymorphic fragments (type matching, error aggregation)
//! - R3: Persistent backend parity

use normcache_core::{
    CacheError, Document, ErrorKind, Field, FragmentDefinition, FragmentErrors, InputValue,
    MemoryStore, ReadOptions, Selection, StoreRecord, StoreValue, Variables,
    diff_query_against_store, handle_fragment_errors, read_query_from_store,
};
use serde_json::{Value, json};

fn vars(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => Variables::new(),
    }
}

fn store(snapshot: Value) -> MemoryStore {
    MemoryStore::from_json_value(snapshot).expect("snapshot")
}

// =============================================================================
// R0: RESOLUTION
// =============================================================================

mod r0_resolution {
    use super::*;

    /// R0.1: references are followed transitively.
    #[test]
    fn reference_resolution() {
        let store = store(json!({
            "A": {"foo": {"type": "id", "id": "B"}},
            "B": {"bar": 5}
        }));
        let query = Document::query(vec![Selection::object("foo", vec![Selection::field("bar")])]);
        let options = ReadOptions::default().with_root_id("A");

        let result = read_query_from_store(&store, &query, None, &options).expect("read");
        assert_eq!(result, json!({"foo": {"bar": 5}}));
    }

    /// R0.2: a JSON-wrapped value resolves to exactly its payload.
    #[test]
    fn json_unwrap_invariance() {
        let payload = json!({"json": "nested", "type": "id", "id": "not-a-ref"});
        let store = store(json!({
            "ROOT_QUERY": {"blob": {"type": "json", "json": payload.clone()}}
        }));
        let query = Document::query(vec![Selection::field("blob")]);

        let result =
            read_query_from_store(&store, &query, None, &ReadOptions::default()).expect("read");
        assert_eq!(result, json!({ "blob": payload }));
    }

    /// R0.3: argument order never changes the store key or the value.
    #[test]
    fn argument_order_invariance() {
        let store = store(json!({
            "ROOT_QUERY": {r#"pair({"a":1,"b":2})"#: "found"}
        }));
        let ab = Document::query(vec![
            Field::new("pair")
                .with_argument("a", InputValue::literal(1))
                .with_argument("b", InputValue::literal(2))
                .into(),
        ]);
        let ba = Document::query(vec![
            Field::new("pair")
                .with_argument("b", InputValue::variable("b"))
                .with_argument("a", InputValue::variable("a"))
                .into(),
        ]);

        let first =
            read_query_from_store(&store, &ab, None, &ReadOptions::default()).expect("read ab");
        let second = read_query_from_store(
            &store,
            &ba,
            Some(&vars(json!({"b": 2, "a": 1}))),
            &ReadOptions::default(),
        )
        .expect("read ba");
        assert_eq!(first, json!({"pair": "found"}));
        assert_eq!(first, second);
    }

    /// R0.4: lists of references resolve element-wise, nulls pass through.
    #[test]
    fn lists_of_references() {
        let store = store(json!({
            "ROOT_QUERY": {"people": [
                {"type": "id", "id": "P:1"},
                null,
                {"type": "id", "id": "P:2", "generated": true}
            ]},
            "P:1": {"name": "Ada"},
            "P:2": {"name": "Grace"}
        }));
        let query =
            Document::query(vec![Selection::object("people", vec![Selection::field("name")])]);

        let result =
            read_query_from_store(&store, &query, None, &ReadOptions::default()).expect("read");
        assert_eq!(
            result,
            json!({"people": [{"name": "Ada"}, null, {"name": "Grace"}]})
        );
    }

    /// R0.5: resolving twice against an unchanged store is identical.
    #[test]
    fn idempotence() {
        let store = store(json!({
            "ROOT_QUERY": {"me": {"type": "id", "id": "U"}},
            "U": {"name": "Ada"}
        }));
        let query = Document::query(vec![Selection::object(
            "me",
            vec![Selection::field("name"), Selection::field("age")],
        )]);

        let first = diff_query_against_store(&store, &query, None, &ReadOptions::default())
            .expect("first");
        let second = diff_query_against_store(&store, &query, None, &ReadOptions::default())
            .expect("second");
        assert_eq!(first, second);
    }
}

// =============================================================================
// R1: PARTIAL DATA
// =============================================================================

mod r1_partial_data {
    use super::*;

    fn incomplete() -> (MemoryStore, Document) {
        let store = store(json!({
            "ROOT_QUERY": {"me": {"type": "id", "id": "U"}},
            "U": {"name": "Ada"}
        }));
        let query = Document::query(vec![Selection::object(
            "me",
            vec![Selection::field("name"), Selection::field("email")],
        )]);
        (store, query)
    }

    /// R1.1: partial mode omits the field and flags it; strict mode names it.
    #[test]
    fn partial_data_monotonicity() {
        let (store, query) = incomplete();

        let diff = diff_query_against_store(&store, &query, None, &ReadOptions::partial(true))
            .expect("partial");
        assert_eq!(diff.result, json!({"me": {"name": "Ada"}}));
        assert!(diff.is_missing);

        let err = diff_query_against_store(&store, &query, None, &ReadOptions::partial(false))
            .expect_err("strict");
        match err {
            CacheError::MissingField {
                store_key,
                object_id,
                ..
            } => {
                assert_eq!(store_key, "email");
                assert_eq!(object_id, "U");
            }
            other => unreachable!("unexpected error: {other}"),
        }
    }

    /// R1.2: read is strict by default, diff is partial by default.
    #[test]
    fn entry_point_default_asymmetry() {
        let (store, query) = incomplete();

        let err = read_query_from_store(&store, &query, None, &ReadOptions::default())
            .expect_err("read is strict");
        assert_eq!(err.kind(), ErrorKind::Field);

        let diff = diff_query_against_store(&store, &query, None, &ReadOptions::default())
            .expect("diff is partial");
        assert!(diff.is_missing);
    }

    /// R1.3: a complete result is never flagged.
    #[test]
    fn complete_result_not_missing() {
        let (store, _) = incomplete();
        let query = Document::query(vec![Selection::object("me", vec![Selection::field("name")])]);

        let diff = diff_query_against_store(&store, &query, None, &ReadOptions::default())
            .expect("diff");
        assert!(!diff.is_missing);
    }

    /// R1.4: strict mode stops at the first missing field in declaration order.
    #[test]
    fn strict_reports_first_missing_field() {
        let store = store(json!({"ROOT_QUERY": {"b": 2}}));
        let query = Document::query(vec![
            Selection::field("a"),
            Selection::field("b"),
            Selection::field("c"),
        ]);

        let err = read_query_from_store(&store, &query, None, &ReadOptions::default())
            .expect_err("strict");
        assert!(matches!(err, CacheError::MissingField { ref store_key, .. } if store_key == "a"));
    }

    /// R1.5: an object missing from the store behaves like an empty record.
    #[test]
    fn missing_object_is_empty_record() {
        let store = store(json!({"ROOT_QUERY": {"me": {"type": "id", "id": "Gone"}}}));
        let query = Document::query(vec![Selection::object("me", vec![Selection::field("name")])]);

        let diff = diff_query_against_store(&store, &query, None, &ReadOptions::default())
            .expect("diff");
        assert_eq!(diff.result, json!({"me": {}}));
        assert!(diff.is_missing);
    }
}

// =============================================================================
// R2: POLYMORPHIC FRAGMENTS
// =============================================================================

mod r2_fragments {
    use super::*;

    fn pet_query() -> Document {
        Document::query(vec![Selection::object(
            "pet",
            vec![
                Selection::inline_fragment("Dog", vec![Selection::field("barkVolume")]),
                Selection::fragment_spread("CatFields"),
            ],
        )])
        .with_fragment(FragmentDefinition::new(
            "CatFields",
            "Cat",
            vec![Selection::field("meowVolume")],
        ))
    }

    /// R2.1: without a typename, the variant that resolves wins.
    #[test]
    fn untyped_object_partial_success() {
        let store = store(json!({
            "ROOT_QUERY": {"pet": {"type": "id", "id": "Pet:1"}},
            "Pet:1": {"meowVolume": 7}
        }));

        let result = read_query_from_store(&store, &pet_query(), None, &ReadOptions::default())
            .expect("one variant resolves");
        assert_eq!(result, json!({"pet": {"meowVolume": 7}}));
    }

    /// R2.2: without a typename, all variants failing is an error.
    #[test]
    fn untyped_object_all_fail() {
        let store = store(json!({
            "ROOT_QUERY": {"pet": {"type": "id", "id": "Pet:1"}},
            "Pet:1": {"name": "Rex"}
        }));

        let err = read_query_from_store(&store, &pet_query(), None, &ReadOptions::default())
            .expect_err("no variant resolves");
        assert!(err.is_missing_field());
    }

    /// R2.3: a known typename selects exactly one variant.
    #[test]
    fn typed_object_matches_one_variant() {
        let store = store(json!({
            "ROOT_QUERY": {"pet": {"type": "id", "id": "Pet:1"}},
            "Pet:1": {"__typename": "Dog", "barkVolume": 11}
        }));

        let result = read_query_from_store(&store, &pet_query(), None, &ReadOptions::default())
            .expect("dog variant");
        assert_eq!(result, json!({"pet": {"barkVolume": 11}}));
    }

    /// R2.4: a matched variant with a missing field fails in strict mode.
    #[test]
    fn typed_object_missing_field_is_error() {
        let store = store(json!({
            "ROOT_QUERY": {"pet": {"type": "id", "id": "Pet:1"}},
            "Pet:1": {"__typename": "Cat"}
        }));

        let err = read_query_from_store(&store, &pet_query(), None, &ReadOptions::default())
            .expect_err("cat without meowVolume");
        assert!(
            matches!(err, CacheError::MissingField { ref store_key, .. } if store_key == "meowVolume")
        );
    }

    /// R2.5: partial and strict agree on untyped objects.
    #[test]
    fn untyped_object_partial_matches_strict() {
        let resolved = store(json!({
            "ROOT_QUERY": {"pet": {"type": "id", "id": "Pet:1"}},
            "Pet:1": {"meowVolume": 7}
        }));

        let strict = read_query_from_store(&resolved, &pet_query(), None, &ReadOptions::default())
            .expect("strict succeeds");
        let diff =
            diff_query_against_store(&resolved, &pet_query(), None, &ReadOptions::partial(true))
                .expect("partial");
        assert_eq!(diff.result, strict);
        assert!(!diff.is_missing);

        let unresolved = store(json!({
            "ROOT_QUERY": {"pet": {"type": "id", "id": "Pet:1"}},
            "Pet:1": {"name": "Rex"}
        }));
        assert!(
            read_query_from_store(&unresolved, &pet_query(), None, &ReadOptions::default())
                .is_err()
        );
        let diff =
            diff_query_against_store(&unresolved, &pet_query(), None, &ReadOptions::partial(true))
                .expect("partial");
        assert_eq!(diff.result, json!({"pet": {}}));
        assert!(diff.is_missing);
    }

    /// R2.6: aggregation of recorded outcomes.
    #[test]
    fn aggregation_outcomes() {
        let err = |key: &str| CacheError::MissingField {
            store_key: key.to_string(),
            object_id: "Pet:1".to_string(),
            record: StoreRecord::new().with("name", StoreValue::scalar("Rex")),
        };

        let all_fail = FragmentErrors::from([
            ("Dog".to_string(), Some(err("barkVolume"))),
            ("Cat".to_string(), Some(err("meowVolume"))),
        ]);
        let raised = handle_fragment_errors(all_fail).expect_err("all fail");
        assert!(raised == err("barkVolume") || raised == err("meowVolume"));

        let partial = FragmentErrors::from([
            ("Dog".to_string(), Some(err("barkVolume"))),
            ("Cat".to_string(), None),
        ]);
        assert!(handle_fragment_errors(partial).is_ok());

        assert!(handle_fragment_errors(FragmentErrors::new()).is_ok());
    }
}

// =============================================================================
// R3: PERSISTENT BACKEND PARITY
// =============================================================================

mod r3_backend_parity {
    use super::*;
    use normcache_core::{RedbStore, StoreBackend};
    use tempfile::tempdir;

    /// R3.1: redb-backed and in-memory stores resolve identically.
    #[test]
    fn redb_matches_memory() {
        let memory = store(json!({
            "ROOT_QUERY": {"me": {"type": "id", "id": "U"}},
            "U": {"name": "Ada", "prefs": {"type": "json", "json": {"dark": true}}}
        }));
        let query = Document::query(vec![Selection::object(
            "me",
            vec![
                Selection::field("name"),
                Selection::field("prefs"),
                Selection::field("email"),
            ],
        )]);

        let temp = tempdir().expect("temp dir");
        let mut redb = RedbStore::open(temp.path().join("cache.redb")).expect("open");
        redb.import(&memory).expect("import");
        let persistent = StoreBackend::Persistent(redb);

        let from_memory =
            diff_query_against_store(&memory, &query, None, &ReadOptions::default()).expect("mem");
        let from_redb = diff_query_against_store(&persistent, &query, None, &ReadOptions::default())
            .expect("redb");

        assert_eq!(from_memory, from_redb);
        assert_eq!(
            from_redb.result,
            json!({"me": {"name": "Ada", "prefs": {"dark": true}}})
        );
        assert!(from_redb.is_missing);
    }
}
