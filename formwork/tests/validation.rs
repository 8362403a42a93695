//! Tests for the rule collection owned by an element.

mod common;

use formwork::error::SchemaError;
use formwork::props::PropsSnapshot;
use formwork::schema::RuleSchema;
use formwork::validation::{numeric, required, ValidateOptions, Validation};
use formwork::value::Value;

fn props() -> PropsSnapshot {
    PropsSnapshot::new()
}

#[test]
fn test_add_and_look_up_rules() {
    common::init_logging();
    let validation = Validation::new();

    validation
        .add_rules(vec![numeric(), required()])
        .expect("rules should add");

    assert_eq!(validation.len(), 2);
    assert!(validation.rule("numeric").is_some());
    assert!(validation.rule("required").is_some());
    assert!(validation.rule("missing").is_none());
}

#[test]
fn test_duplicate_rule_name_is_a_structural_error() {
    let validation = Validation::new();
    validation.add_rule(required(), None).unwrap();

    let err = validation.add_rule(required(), None).unwrap_err();

    assert_eq!(
        err,
        SchemaError::DuplicateRule {
            name: "required".to_string()
        }
    );
    assert_eq!(validation.len(), 1);
}

#[test]
fn test_add_rule_at_index_controls_order() {
    let validation = Validation::new();
    validation.add_rule(required(), None).unwrap();
    validation.add_rule(numeric(), Some(0)).unwrap();

    let names: Vec<String> = validation.rules().iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["numeric", "required"]);
}

#[test]
fn test_removing_an_absent_rule_is_a_structural_error() {
    let validation = Validation::new();
    validation.add_rule(required(), None).unwrap();

    let err = validation.remove_rule("numeric").unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnknownRule {
            name: "numeric".to_string()
        }
    );
    // Nothing was mutated by the failed removal.
    assert_eq!(validation.len(), 1);

    validation.remove_rule("required").unwrap();
    assert!(validation.is_empty());
}

#[tokio::test]
async fn test_every_rule_reports_a_fresh_result_without_bail() {
    let validation = Validation::new();
    validation
        .add_rules(vec![
            required().message("first error"),
            RuleSchema::new("never").check(|_| false).message("second error"),
        ])
        .unwrap();

    let valid = validation
        .validate(&Value::Null, &props(), ValidateOptions::default())
        .await;

    assert!(!valid);
    assert_eq!(
        validation.errors(),
        Some(vec!["first error".to_string(), "second error".to_string()])
    );
}

#[tokio::test]
async fn test_valid_tracks_every_owned_rule() {
    let validation = Validation::new();
    validation.add_rules(vec![required(), numeric()]).unwrap();

    assert!(validation.valid());

    validation
        .validate(&Value::Text("12".into()), &props(), ValidateOptions::default())
        .await;
    assert!(validation.valid());
    assert_eq!(validation.errors(), None);

    validation
        .validate(&Value::Text("abc".into()), &props(), ValidateOptions::default())
        .await;
    assert!(!validation.valid());
}

#[tokio::test]
async fn test_only_filter_runs_exactly_the_named_rules() {
    let validation = Validation::new();
    validation
        .add_rules(vec![
            required().message("required failed"),
            RuleSchema::new("never").check(|_| false).message("never failed"),
        ])
        .unwrap();

    validation
        .validate(
            &Value::Null,
            &props(),
            ValidateOptions {
                only: Some(vec!["required".to_string()]),
                excluded: None,
            },
        )
        .await;

    // The filtered-out rule stays untested-valid.
    assert_eq!(
        validation.errors(),
        Some(vec!["required failed".to_string()])
    );
}

#[tokio::test]
async fn test_excluded_filter_skips_the_named_rules() {
    let validation = Validation::new();
    validation
        .add_rules(vec![
            required().message("required failed"),
            RuleSchema::new("never").check(|_| false).message("never failed"),
        ])
        .unwrap();

    validation
        .validate(
            &Value::Null,
            &props(),
            ValidateOptions {
                only: None,
                excluded: Some(vec!["never".to_string()]),
            },
        )
        .await;

    assert_eq!(
        validation.errors(),
        Some(vec!["required failed".to_string()])
    );
}

#[tokio::test]
async fn test_reset_untests_every_rule() {
    let validation = Validation::new();
    validation.add_rules(vec![required(), numeric()]).unwrap();

    validation
        .validate(&Value::Null, &props(), ValidateOptions::default())
        .await;
    assert!(!validation.valid());

    validation.reset();
    assert!(validation.valid());
    assert_eq!(validation.errors(), None);
}

#[test]
fn test_schema_reconstruction_reflects_live_mutations() {
    let validation = Validation::new();
    validation.add_rule(required().message("a"), None).unwrap();

    let schemas = validation.to_schema();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "required");

    validation.add_rule(numeric(), None).unwrap();
    validation.remove_rule("required").unwrap();

    let schemas = validation.to_schema();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "numeric");
}
