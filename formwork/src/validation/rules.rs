//! Built-in rule constructors.
//!
//! Each returns a plain [`RuleSchema`] without a message; attach one with
//! `.message(..)` where the failure should surface text.

use regex::Regex;

use crate::schema::RuleSchema;
use crate::value::Value;

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(entries) => entries.is_empty(),
        _ => false,
    }
}

/// Require a non-empty value.
pub fn required() -> RuleSchema {
    RuleSchema::new("required").check(|v| !is_empty(v))
}

/// Require a numeric value (a `Number`, or a `Text` that reads as one).
pub fn numeric() -> RuleSchema {
    RuleSchema::new("numeric").check(|v| match v {
        Value::Number(_) => true,
        Value::Text(s) => crate::value::is_numeric(s),
        _ => false,
    })
}

/// Require a valid email address. Empty is valid; combine with `required`
/// for non-empty.
pub fn email() -> RuleSchema {
    RuleSchema::new("email").check(|v| match v {
        Value::Null => true,
        Value::Text(s) => s.is_empty() || email_address::EmailAddress::is_valid(s),
        _ => false,
    })
}

/// Require a minimum length in characters.
pub fn min_length(min: usize) -> RuleSchema {
    RuleSchema::new("minLength").check(move |v| match v {
        Value::Text(s) => s.chars().count() >= min,
        _ => false,
    })
}

/// Require a maximum length in characters.
pub fn max_length(max: usize) -> RuleSchema {
    RuleSchema::new("maxLength").check(move |v| match v {
        Value::Text(s) => s.chars().count() <= max,
        Value::Null => true,
        _ => false,
    })
}

/// Require the value to match a regex pattern.
pub fn pattern(pattern: &str) -> RuleSchema {
    let re = Regex::new(pattern).expect("Invalid regex pattern");
    RuleSchema::new("pattern").check(move |v| match v {
        Value::Text(s) => re.is_match(s),
        _ => false,
    })
}

/// Require the value to equal another value.
pub fn equals(other: Value) -> RuleSchema {
    RuleSchema::new("equals").check(move |v| *v == other)
}

/// Require a boolean value to be `true`.
pub fn checked() -> RuleSchema {
    RuleSchema::new("checked").check(|v| matches!(v, Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::PropsSnapshot;
    use crate::validation::Verdict;

    async fn run(schema: &RuleSchema, value: Value) -> bool {
        let validator = schema.validator.clone().unwrap();
        validator(value, PropsSnapshot::new()).await == Verdict::Pass
    }

    #[tokio::test]
    async fn required_rejects_empty() {
        let rule = required();
        assert!(!run(&rule, Value::Null).await);
        assert!(!run(&rule, Value::Text("  ".into())).await);
        assert!(run(&rule, Value::Text("x".into())).await);
    }

    #[tokio::test]
    async fn email_accepts_empty() {
        let rule = email();
        assert!(run(&rule, Value::Text(String::new())).await);
        assert!(run(&rule, Value::Text("a@b.co".into())).await);
        assert!(!run(&rule, Value::Text("not-an-email".into())).await);
    }

    #[tokio::test]
    async fn length_bounds() {
        assert!(run(&min_length(2), Value::Text("ab".into())).await);
        assert!(!run(&min_length(3), Value::Text("ab".into())).await);
        assert!(run(&max_length(2), Value::Text("ab".into())).await);
        assert!(!run(&max_length(1), Value::Text("ab".into())).await);
    }
}
