/// Property-based tests for the field specifier codec and field selection.
///
/// Field identity is the canonical pointer string, so the codec must be lossless
/// and the selected field list must not depend on how the client ordered or
/// spelled its specifiers.
use proptest::prelude::*;
use serde_json::{json, Value};

use fieldshape::{canonicalize, pointer, project, select_fields, ArrayStructure, CompiledSchema};

/// Raw segments, including the characters that need escaping.
fn arb_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_]{0,12}",
        prop::string::string_regex("[a-z~/.]{1,8}").unwrap(),
        Just(String::new()),
        Just("~1".to_string()),
        Just("~01".to_string()),
        Just("a/b".to_string()),
    ]
}

fn arb_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_segment(), 0..6)
}

fn schema() -> CompiledSchema {
    CompiledSchema::compile(&json!({
        "widgets": {
            "fields": {
                "bar": { "inclusion": "default" },
                "bazz": {
                    "fields": {
                        "plugh": { "inclusion": "default" },
                        "waldo": true
                    }
                },
                "foo": true,
                "id": { "inclusion": "always" },
                "silly": { "inclusion": "always" }
            }
        }
    }))
    .unwrap()
}

/// Specifiers for known and unknown fields, in both syntaxes.
fn arb_specifiers() -> impl Strategy<Value = Vec<String>> {
    let pool = vec![
        "bar".to_string(),
        "bazz.plugh".to_string(),
        r#"["bazz","waldo"]"#.to_string(),
        "foo".to_string(),
        "id".to_string(),
        "bazz.nope".to_string(),
        r#"["nothing"]"#.to_string(),
    ];
    prop::sample::subsequence(pool.clone(), 0..=pool.len())
}

proptest! {
    #[test]
    fn codec_roundtrips(segments in arb_segments()) {
        let encoded = pointer::encode(&segments);
        prop_assert_eq!(pointer::decode(&encoded), segments);
    }

    #[test]
    fn json_specifier_canonicalizes_to_encoded_pointer(segments in arb_segments()) {
        prop_assume!(!segments.is_empty());
        let specifier = serde_json::to_string(&segments).unwrap();
        prop_assert_eq!(canonicalize(&specifier).unwrap(), pointer::encode(&segments));
    }

    #[test]
    fn dot_and_json_syntax_agree(segments in prop::collection::vec("[a-z]{1,6}", 1..4)) {
        let dotted = segments.join(".");
        let json = serde_json::to_string(&segments).unwrap();
        prop_assert_eq!(canonicalize(&dotted).unwrap(), canonicalize(&json).unwrap());
    }

    #[test]
    fn selection_ignores_specifier_order(
        (specifiers, shuffled) in arb_specifiers()
            .prop_flat_map(|s| (Just(s.clone()), Just(s).prop_shuffle()))
    ) {
        let compiled = schema();
        let index = &compiled.resource("widgets").unwrap().fields_index;

        let first = select_fields(index, Some(specifiers.as_slice())).unwrap();
        let second = select_fields(index, Some(shuffled.as_slice())).unwrap();
        prop_assert_eq!(&first, &second);

        // Sorted, unique, known, and always a superset of the always tier.
        prop_assert!(first.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(first.iter().all(|f| index.contains(f)));
        prop_assert!(index.always.iter().all(|f| first.contains(f)));
    }

    #[test]
    fn projection_keeps_only_selected_values(
        specifiers in arb_specifiers(),
        bar in any::<i32>(),
        waldo in "[a-z]{0,8}",
    ) {
        let compiled = schema();
        let resource = compiled.resource("widgets").unwrap();
        let fields = select_fields(&resource.fields_index, Some(specifiers.as_slice())).unwrap();
        let tree = ArrayStructure::build(&fields, &resource.fields_schema);

        let source = json!({
            "bar": bar,
            "bazz": { "plugh": true, "waldo": waldo },
            "foo": null,
            "id": "w1",
            "silly": [1, 2],
            "extra": "something extra"
        });
        let projected = project(&tree, &source).unwrap();

        for field in &fields {
            prop_assert_eq!(pointer::get(&projected, field), pointer::get(&source, field));
        }
        prop_assert_eq!(projected.get("extra"), None::<&Value>);
    }
}
