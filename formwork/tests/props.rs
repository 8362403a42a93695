//! Tests for plain and derived element properties.

use std::sync::{Arc, Mutex};

use formwork::props::Props;
use formwork::value::Value;

#[test]
fn test_plain_values_and_path_lookup() {
    let props = Props::new();
    props.set("simple", Value::Number(12.0));

    let mut nested = std::collections::BTreeMap::new();
    nested.insert("inner".to_string(), Value::Text("deep".into()));
    props.set("obj", Value::Map(nested));

    assert_eq!(props.get("simple"), Some(Value::Number(12.0)));
    assert_eq!(props.get_path("obj.inner"), Some(Value::Text("deep".into())));
    assert_eq!(props.get_path("obj.missing"), None);
    assert_eq!(props.get("absent"), None);
}

#[test]
fn test_set_replaces_existing_entries() {
    let props = Props::new();
    props.set("key", Value::Number(1.0));
    props.set("key", Value::Number(2.0));

    assert_eq!(props.get("key"), Some(Value::Number(2.0)));
    assert_eq!(props.snapshot().len(), 1);
}

#[tokio::test]
async fn test_derived_cell_exposes_cached_value_until_refreshed() {
    let props = Props::new();
    props.derive(
        "doubled",
        Arc::new(|| Box::pin(async { Value::Number(42.0) })),
    );

    // Before the first refresh the cell exposes its cached (null) value.
    assert_eq!(props.get("doubled"), Some(Value::Null));

    let resolved = props.refresh("doubled").await;
    assert_eq!(resolved, Some(Value::Number(42.0)));
    assert_eq!(props.get("doubled"), Some(Value::Number(42.0)));
}

#[tokio::test]
async fn test_derived_cell_reports_pending_while_resolving() {
    let (tx, rx) = futures::channel::oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(rx)));

    let props = Props::new();
    let compute_gate = gate.clone();
    props.derive(
        "slow",
        Arc::new(move || {
            let gate = compute_gate.lock().unwrap().take();
            Box::pin(async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Value::Text("done".into())
            })
        }),
    );

    let cell = props.derived("slow").expect("a derived cell");
    assert!(!cell.is_pending());

    let observer = {
        let cell = cell.clone();
        async move {
            assert!(cell.is_pending());
            let _ = tx.send(());
        }
    };

    let (resolved, ()) = futures::join!(cell.refresh(), observer);

    assert_eq!(resolved, Value::Text("done".into()));
    assert!(!cell.is_pending());
    assert_eq!(props.get("slow"), Some(Value::Text("done".into())));
}

#[tokio::test]
async fn test_refresh_on_a_plain_prop_returns_its_value() {
    let props = Props::new();
    props.set("plain", Value::Bool(true));

    assert_eq!(props.refresh("plain").await, Some(Value::Bool(true)));
    assert_eq!(props.refresh("absent").await, None);
}

#[test]
fn test_snapshot_contains_every_entry() {
    let props = Props::new();
    props.set("b", Value::Number(2.0));
    props.set("a", Value::Number(1.0));

    let snapshot = props.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(props.contains("a"));
    assert!(props.contains("b"));
}
