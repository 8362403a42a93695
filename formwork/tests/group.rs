//! Tests for groups: cascading, aggregation, cascaded operations.

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use formwork::config::Config;
use formwork::element::{ElementNode, Group};
use formwork::error::SchemaError;
use formwork::event::Callback;
use formwork::schema::{FieldSchema, GroupSchema};
use formwork::validation::required;
use formwork::value::Value;

fn scenario_schema() -> GroupSchema {
    GroupSchema::new("group_test")
        .rule(required().cascade().message("test"))
        .field(FieldSchema::new("a").rule(required().message("abc")))
}

async fn group(schema: GroupSchema) -> Group {
    let config = Config::new();
    let node = config.create(schema).await.expect("group should build");
    node.as_group().expect("a group").clone()
}

fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[tokio::test]
async fn test_children_are_reachable_by_model() {
    common::init_logging();
    let g = group(scenario_schema()).await;

    let child = g.child("a").expect("child a");
    assert_eq!(child.form_id(), "a");
    assert!(g.child("missing").is_none());
}

#[tokio::test]
async fn test_duplicate_child_model_is_a_structural_error() {
    let config = Config::new();
    let err = config
        .create(
            GroupSchema::new("g")
                .field(FieldSchema::new("a"))
                .field(FieldSchema::new("a")),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SchemaError::DuplicateChild {
            form_id: "g".to_string(),
            model: "a".to_string()
        }
    );
}

#[tokio::test]
async fn test_cascading_rules_reach_children_unless_opted_out() {
    let g = group(
        GroupSchema::new("g")
            .rule(required().cascade().message("test"))
            .field(FieldSchema::new("a"))
            .field(FieldSchema::new("b").rule(required().no_inherit())),
    )
    .await;

    let a = g.child("a").unwrap();
    let inherited = a.validation().rule("required").expect("inherited rule");
    assert_eq!(
        inherited.message(),
        Some(formwork::schema::Message::Text("test".into()))
    );

    let b = g.child("b").unwrap();
    let own = b.validation().rule("required").expect("own rule");
    assert_eq!(own.message(), None);
}

#[tokio::test]
async fn test_valid_until_validated_then_errors_surface() {
    let g = group(scenario_schema()).await;

    // Rules are untested at construction.
    assert!(g.is_valid());

    g.validate(true).await;
    g.shake(true);

    assert!(!g.is_valid());
    assert_eq!(ElementNode::Group(g.clone()).error(), Some("test".into()));
    assert_eq!(g.child("a").unwrap().error(), Some("abc".into()));
    assert_eq!(g.value(), Value::Null);
}

#[tokio::test]
async fn test_child_errors_surface_when_the_group_has_no_own_rules() {
    let g = group(
        GroupSchema::new("g").field(FieldSchema::new("a").rule(required().message("a required"))),
    )
    .await;

    assert!(g.is_valid());

    g.validate(true).await;
    g.shake(true);

    assert!(!g.is_valid());
    assert_eq!(
        ElementNode::Group(g.clone()).error(),
        Some("a required".into())
    );
    assert_eq!(g.value(), Value::Null);
}

#[tokio::test]
async fn test_validate_without_cascade_leaves_children_untouched() {
    let g = group(scenario_schema()).await;

    g.validate(true).await;
    g.reset();

    g.validate(false).await;
    g.shake(true);

    assert!(!g.is_valid());
    assert_eq!(ElementNode::Group(g.clone()).error(), Some("test".into()));
    assert!(g.child("a").unwrap().valid());
}

#[tokio::test]
async fn test_shake_without_cascade_keeps_child_errors_hidden() {
    let g = group(scenario_schema()).await;

    g.validate(true).await;
    g.shake(false);

    assert!(!g.is_valid());
    assert_eq!(ElementNode::Group(g.clone()).error(), Some("test".into()));
    assert_eq!(g.child("a").unwrap().error(), None);
}

#[tokio::test]
async fn test_reset_returns_the_subtree_to_untested() {
    let g = group(scenario_schema()).await;

    g.validate(true).await;
    assert!(!g.is_valid());

    g.reset();
    assert!(g.is_valid());
    assert!(g.child("a").unwrap().valid());
}

#[tokio::test]
async fn test_set_value_delegates_by_model() {
    let g = group(
        GroupSchema::new("g")
            .field(FieldSchema::new("a"))
            .field(GroupSchema::new("b").field(FieldSchema::new("c"))),
    )
    .await;

    assert_eq!(g.value(), Value::Null);

    let err = g.set_value(Value::Text("test".into())).await.unwrap_err();
    assert!(matches!(err, SchemaError::InvalidValue { .. }));

    let value = g
        .set_value(map(&[
            ("a", Value::Text("test".into())),
            ("b", map(&[("c", Value::Text("abc".into()))])),
        ]))
        .await
        .unwrap();

    assert_eq!(
        value,
        map(&[
            ("a", Value::Text("test".into())),
            ("b", map(&[("c", Value::Text("abc".into()))])),
        ])
    );
    assert_eq!(g.child("a").unwrap().value(), Value::Text("test".into()));
    assert_eq!(
        g.child("b").unwrap().as_group().unwrap().child("c").unwrap().value(),
        Value::Text("abc".into())
    );
}

#[tokio::test]
async fn test_one_invalid_child_nulls_the_whole_aggregate() {
    let g = group(
        GroupSchema::new("g")
            .field(FieldSchema::new("a").rule(required().message("need a")))
            .field(FieldSchema::new("b")),
    )
    .await;

    g.set_value(map(&[
        ("a", Value::Text("x".into())),
        ("b", Value::Text("y".into())),
    ]))
    .await
    .unwrap();
    assert!(g.is_valid());
    assert!(matches!(g.value(), Value::Map(_)));

    // Invalidating one child nulls the aggregate entirely.
    g.set_value(map(&[("a", Value::Text("".into()))])).await.unwrap();
    assert!(!g.is_valid());
    assert_eq!(g.value(), Value::Null);
}

#[tokio::test]
async fn test_clear_empties_children_and_revalidates() {
    let g = group(scenario_schema()).await;

    g.set_value(map(&[("a", Value::Text("filled".into()))]))
        .await
        .unwrap();
    assert!(g.is_valid());

    g.clear().await;

    assert!(!g.is_valid());
    assert_eq!(g.value(), Value::Null);
    assert_eq!(g.child("a").unwrap().as_field().unwrap().raw(), "");
}

#[tokio::test]
async fn test_add_field_inserts_and_rejects_duplicates() {
    let g = group(GroupSchema::new("g").field(FieldSchema::new("a"))).await;

    g.add_field(FieldSchema::new("b").into(), None).await.unwrap();
    g.add_field(FieldSchema::new("front").into(), Some(0)).await.unwrap();

    let models: Vec<String> = g.children().iter().map(|c| c.model()).collect();
    assert_eq!(models, vec!["front", "a", "b"]);

    let err = g.add_field(FieldSchema::new("a").into(), None).await.unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateChild { .. }));
    assert_eq!(g.children().len(), 3);
}

#[tokio::test]
async fn test_remove_field_is_strict_and_emits() {
    let g = group(GroupSchema::new("g").field(FieldSchema::new("a"))).await;
    let removed_events = Arc::new(AtomicUsize::new(0));

    let counter = removed_events.clone();
    g.base().events().on(
        "fieldremoved",
        Callback::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let err = g.remove_field("missing").await.unwrap_err();
    assert!(matches!(err, SchemaError::UnknownChild { .. }));
    assert_eq!(g.children().len(), 1);

    let removed = g.remove_field("a").await.unwrap();
    assert_eq!(removed.form_id(), "a");
    assert!(g.children().is_empty());
    assert_eq!(removed_events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_internal_wiring_survives_user_off() {
    let g = group(GroupSchema::new("g").field(FieldSchema::new("a"))).await;
    let a = g.child("a").unwrap();

    // Detaching every user-facing handler must not break aggregation.
    a.events().off("changed");
    a.events().off("validated");

    a.set_value(Value::Text("x".into())).await.unwrap();
    assert_eq!(g.value(), map(&[("a", Value::Text("x".into()))]));
}

#[tokio::test]
async fn test_child_events_bubble_to_the_group() {
    let g = group(GroupSchema::new("g").field(FieldSchema::new("a"))).await;
    let changed = Arc::new(AtomicUsize::new(0));
    let field_changed = Arc::new(AtomicUsize::new(0));

    let counter = changed.clone();
    g.base().events().on(
        "changed",
        Callback::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let counter = field_changed.clone();
    g.base().events().on(
        "fieldchanged",
        Callback::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    g.child("a").unwrap().set_value(Value::Text("x".into())).await.unwrap();

    assert_eq!(changed.load(Ordering::SeqCst), 1);
    assert_eq!(field_changed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_props_look_up_through_ancestors() {
    let g = group(
        GroupSchema::new("g")
            .prop("theme", "dark")
            .field(FieldSchema::new("a").prop("own", 1i64)),
    )
    .await;

    let a = g.child("a").unwrap();
    assert_eq!(a.prop("own"), Some(Value::Number(1.0)));
    assert_eq!(a.prop("theme"), None);
    assert_eq!(a.prop_up("theme"), Some(Value::Text("dark".into())));

    let ancestors = a.ancestors();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].form_id(), "g");
}
