//! Tests for single validation rules.

use formwork::props::PropsSnapshot;
use formwork::schema::RuleSchema;
use formwork::validation::{Rule, Verdict};
use formwork::value::Value;

fn props() -> PropsSnapshot {
    PropsSnapshot::new()
}

#[tokio::test]
async fn test_rule_without_validator_is_trivially_valid() {
    let rule = Rule::new(RuleSchema::new("anything"));

    assert!(rule.validate(&Value::Null, &props()).await);
    assert!(rule.valid());
    assert_eq!(rule.error(), None);
}

#[tokio::test]
async fn test_fail_uses_the_rule_message() {
    let rule = Rule::new(
        RuleSchema::new("required")
            .check(|v| !v.is_null())
            .message("value required"),
    );

    assert!(!rule.validate(&Value::Null, &props()).await);
    assert!(!rule.valid());
    assert_eq!(rule.error(), Some("value required".to_string()));

    assert!(rule.validate(&Value::Text("x".into()), &props()).await);
    assert!(rule.valid());
    assert_eq!(rule.error(), None);
}

#[tokio::test]
async fn test_fail_without_message_yields_no_error_text() {
    let rule = Rule::new(RuleSchema::new("required").check(|v| !v.is_null()));

    assert!(!rule.validate(&Value::Null, &props()).await);
    assert!(!rule.valid());
    assert_eq!(rule.error(), None);
}

#[tokio::test]
async fn test_fail_with_carries_its_own_text() {
    let rule = Rule::new(
        RuleSchema::new("strict")
            .validate_with(|_, _| Verdict::FailWith("exact text".to_string()))
            .message("ignored"),
    );

    assert!(!rule.validate(&Value::Null, &props()).await);
    assert_eq!(rule.error(), Some("exact text".to_string()));
}

#[tokio::test]
async fn test_dynamic_message_resolves_against_the_value() {
    let rule = Rule::new(
        RuleSchema::new("shout")
            .check(|_| false)
            .message_with(|value, _| format!("bad: {}", value.stringify())),
    );

    rule.validate(&Value::Text("abc".into()), &props()).await;

    assert_eq!(rule.error(), Some("bad: abc".to_string()));
}

#[tokio::test]
async fn test_reset_restores_untested_valid() {
    let rule = Rule::new(RuleSchema::new("required").check(|v| !v.is_null()).message("no"));

    rule.validate(&Value::Null, &props()).await;
    assert!(!rule.valid());

    rule.reset();
    assert!(rule.valid());
    assert_eq!(rule.error(), None);
}

#[tokio::test]
async fn test_set_message_round_trips_into_the_schema() {
    let rule = Rule::new(RuleSchema::new("required").check(|v| !v.is_null()));

    rule.set_message(Some(formwork::schema::Message::Text("now set".into())));
    rule.validate(&Value::Null, &props()).await;

    assert_eq!(rule.error(), Some("now set".to_string()));
    assert_eq!(
        rule.schema().message,
        Some(formwork::schema::Message::Text("now set".into()))
    );
}
