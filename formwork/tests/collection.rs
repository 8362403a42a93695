//! Tests for collections: repeatable items, positional identity, templates.

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use formwork::config::Config;
use formwork::element::{Collection, SetListOptions};
use formwork::error::SchemaError;
use formwork::event::Callback;
use formwork::schema::{CollectionSchema, FieldSchema, ItemSchema};
use formwork::validation::required;
use formwork::value::Value;

fn item_with_a() -> ItemSchema {
    ItemSchema::new().field(FieldSchema::new("a"))
}

async fn collection(schema: CollectionSchema) -> Collection {
    let config = Config::new();
    let node = config.create(schema).await.expect("collection should build");
    node.as_collection().expect("a collection").clone()
}

fn entry(value: &str) -> Value {
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), Value::Text(value.into()));
    Value::Map(map)
}

fn item_value(collection: &Collection, index: usize) -> Value {
    collection.groups()[index]
        .child("a")
        .expect("field a")
        .value()
}

#[tokio::test]
async fn test_starts_empty_with_a_template() {
    common::init_logging();
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;

    assert!(c.groups().is_empty());
    assert_eq!(c.value(), Value::Null);
    assert!(c.dummy().is_some());
}

#[tokio::test]
async fn test_items_get_positional_identity() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;

    let first = c.add_group().await.unwrap();
    let second = c.add_group().await.unwrap();

    assert_eq!(first.index(), Some(0));
    assert_eq!(second.index(), Some(1));
    assert_eq!(first.form_id(), "list0");
    assert_eq!(second.form_id(), "list1");
}

#[tokio::test]
async fn test_removal_reindexes_remaining_items() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;
    c.add_group().await.unwrap();
    let second = c.add_group().await.unwrap();

    let removed_events = Arc::new(AtomicUsize::new(0));
    let counter = removed_events.clone();
    c.base().events().on(
        "groupremoved",
        Callback::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    c.remove_group(0).await.unwrap();

    assert_eq!(c.groups().len(), 1);
    assert_eq!(second.index(), Some(0));
    assert_eq!(second.form_id(), "list0");
    assert_eq!(removed_events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remove_group_is_strict_about_bounds() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;

    let err = c.remove_group(0).await.unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnknownItem {
            form_id: "list".to_string(),
            index: 0
        }
    );
}

#[tokio::test]
async fn test_set_value_auto_adds_items() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;

    let value = c
        .set_value(Value::List(vec![entry("x"), entry("y")]))
        .await
        .unwrap();

    assert_eq!(c.groups().len(), 2);
    assert_eq!(item_value(&c, 0), Value::Text("x".into()));
    assert_eq!(item_value(&c, 1), Value::Text("y".into()));
    assert!(matches!(value, Value::List(_)));
}

#[tokio::test]
async fn test_set_value_from_updates_existing_items_in_place() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;
    c.set_value(Value::List(vec![entry("zero"), entry("one")]))
        .await
        .unwrap();

    c.set_value_with(
        Value::List(vec![entry("updated")]),
        SetListOptions {
            from: 1,
            auto_add: true,
        },
    )
    .await
    .unwrap();

    // The item at index >= from was updated in place, earlier ones untouched.
    assert_eq!(c.groups().len(), 2);
    assert_eq!(item_value(&c, 0), Value::Text("zero".into()));
    assert_eq!(item_value(&c, 1), Value::Text("updated".into()));
}

#[tokio::test]
async fn test_set_value_without_auto_add_drops_the_surplus() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;
    c.set_value(Value::List(vec![entry("zero")])).await.unwrap();

    c.set_value_with(
        Value::List(vec![entry("a"), entry("b"), entry("c")]),
        SetListOptions {
            from: 0,
            auto_add: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(c.groups().len(), 1);
    assert_eq!(item_value(&c, 0), Value::Text("a".into()));
}

#[tokio::test]
async fn test_set_value_rejects_non_arrays() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;

    let err = c.set_value(Value::Text("nope".into())).await.unwrap_err();
    assert_eq!(
        err,
        SchemaError::InvalidValue {
            form_id: "list".to_string(),
            expected: "an array value"
        }
    );
    assert!(c.groups().is_empty());
}

#[tokio::test]
async fn test_one_invalid_item_nulls_the_whole_aggregate() {
    let c = collection(
        CollectionSchema::new("list").group(
            ItemSchema::new().field(FieldSchema::new("a").rule(required().message("need a"))),
        ),
    )
    .await;

    c.set_value(Value::List(vec![entry("x"), entry("y")]))
        .await
        .unwrap();
    assert!(c.is_valid());
    assert!(matches!(c.value(), Value::List(_)));

    c.groups()[1]
        .child("a")
        .unwrap()
        .set_value(Value::Text("".into()))
        .await
        .unwrap();

    assert!(!c.is_valid());
    assert_eq!(c.value(), Value::Null);
}

#[tokio::test]
async fn test_template_edits_propagate_to_all_items() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;
    c.add_group().await.unwrap();

    c.add_field(FieldSchema::new("b").into(), None).await.unwrap();

    // Existing items gained the field.
    assert!(c.groups()[0].child("b").is_some());

    // Future items are built from the updated shape.
    let fresh = c.add_group().await.unwrap();
    assert!(fresh.child("a").is_some());
    assert!(fresh.child("b").is_some());

    // And removal propagates the same way.
    c.remove_field("b").await.unwrap();
    assert!(c.groups()[0].child("b").is_none());
    let after = c.add_group().await.unwrap();
    assert!(after.child("b").is_none());
}

#[tokio::test]
async fn test_collection_rules_cascade_into_items() {
    let c = collection(
        CollectionSchema::new("list")
            .rule(required().cascade().message("from collection"))
            .group(item_with_a()),
    )
    .await;

    let item = c.add_group().await.unwrap();
    let rule = item.base().validation().rule("required").expect("cascaded");
    assert_eq!(
        rule.message(),
        Some(formwork::schema::Message::Text("from collection".into()))
    );
}

#[tokio::test]
async fn test_item_changes_bubble_as_groupchanged() {
    let c = collection(CollectionSchema::new("list").group(item_with_a())).await;
    let count = Arc::new(AtomicUsize::new(0));

    let counter = count.clone();
    c.base().events().on(
        "groupchanged",
        Callback::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    c.set_value(Value::List(vec![entry("x")])).await.unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reset_and_clear_cascade_over_items() {
    let c = collection(
        CollectionSchema::new("list").group(
            ItemSchema::new().field(FieldSchema::new("a").default_value("fallback")),
        ),
    )
    .await;
    c.set_value(Value::List(vec![entry("x")])).await.unwrap();

    c.reset();
    assert_eq!(
        c.groups()[0].child("a").unwrap().as_field().unwrap().raw(),
        "fallback"
    );

    c.clear().await;
    assert_eq!(c.groups()[0].child("a").unwrap().as_field().unwrap().raw(), "");
}
