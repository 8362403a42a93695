//! Rule inheritance as pure functions.
//!
//! Cascading is a three-way merge over rule declarations: the parent's
//! cascading rule, the child's own same-named declaration, and the child's
//! `inherit` opt-out. It runs over plain schema values before construction,
//! so it is testable without building any element.

use crate::schema::{ElementSchema, RuleSchema, TypeTag};

/// Resolve the effective rule for a child, given its own declaration (if
/// any) and a parent rule.
///
/// Non-cascading parent rules never apply. A child with `inherit == false`
/// keeps its own declaration untouched. Otherwise the child's declared
/// validator, message and `for` win over the inherited ones, and the result
/// is self-contained (no shared state with the parent declaration). A rule
/// with no child declaration at all is marked inherited-only so schema
/// reconstruction can drop it.
pub fn resolve_rule(own: Option<&RuleSchema>, inherited: &RuleSchema) -> Option<RuleSchema> {
    if !inherited.cascade {
        return own.cloned();
    }

    match own {
        None => {
            let mut effective = inherited.clone();
            effective.inherited = true;
            Some(effective)
        }
        Some(own) if !own.inherit => Some(own.clone()),
        Some(own) => {
            let mut effective = own.clone();
            effective.validator = own
                .validator
                .clone()
                .or_else(|| inherited.validator.clone());
            effective.message = own.message.clone().or_else(|| inherited.message.clone());
            effective.for_types = own
                .for_types
                .clone()
                .or_else(|| inherited.for_types.clone());
            // An inherited rule keeps flowing into deeper composites.
            effective.cascade = true;
            effective.inherited = false;
            Some(effective)
        }
    }
}

/// Merge a parent's cascading rules into a child's rule list.
///
/// Overrides stay at their declared position; newly inherited rules are
/// inserted at the front.
pub fn cascade_rule_set(parent_rules: &[RuleSchema], own_rules: Vec<RuleSchema>) -> Vec<RuleSchema> {
    let mut rules = own_rules;

    for parent_rule in parent_rules {
        let position = rules.iter().position(|r| r.name == parent_rule.name);
        let own = position.map(|i| &rules[i]);

        let Some(effective) = resolve_rule(own, parent_rule) else {
            continue;
        };

        match position {
            Some(i) => rules[i] = effective,
            None => rules.insert(0, effective),
        }
    }

    rules
}

/// Merge a parent's cascading rules into a child schema.
pub fn cascade_rules(parent_rules: &[RuleSchema], child: &mut ElementSchema) {
    let rules = cascade_rule_set(parent_rules, child.rules().to_vec());
    child.set_rules(rules);
}

/// Drop rules whose `for` restriction excludes the element's declared type.
pub fn normalize_rules(rules: &[RuleSchema], tag: TypeTag) -> Vec<RuleSchema> {
    rules
        .iter()
        .filter(|rule| {
            rule.for_types
                .as_ref()
                .is_none_or(|types| types.contains(&tag))
        })
        .cloned()
        .collect()
}
