//! Ordered rule collection bound to one value-bearing node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use log::trace;

use crate::error::SchemaError;
use crate::event::{EventData, Events};
use crate::props::PropsSnapshot;
use crate::schema::RuleSchema;
use crate::value::Value;

use super::Rule;

/// Name filters for a `validate` call.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Run only the named rules.
    pub only: Option<Vec<String>>,
    /// Skip the named rules.
    pub excluded: Option<Vec<String>>,
}

/// The validation attached to one element.
///
/// Owns an ordered sequence of rules (insertion order = evaluation order);
/// the whole set is dispatched concurrently on `validate`, so ordering only
/// affects error listing, never short-circuiting. Cloning shares state.
#[derive(Clone, Default)]
pub struct Validation {
    rules: Arc<RwLock<Vec<Rule>>>,
    events: Events,
    generation: Arc<AtomicU64>,
}

impl Validation {
    /// Create an empty validation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validation from rule declarations.
    pub fn from_schemas(schemas: Vec<RuleSchema>) -> Result<Self, SchemaError> {
        let validation = Self::new();
        validation.add_rules(schemas)?;
        Ok(validation)
    }

    /// `true` iff no owned rule is currently invalid.
    pub fn valid(&self) -> bool {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        !rules.iter().any(|r| !r.valid())
    }

    /// Ordered list of active error strings; `None` when valid.
    pub fn errors(&self) -> Option<Vec<String>> {
        if self.valid() {
            return None;
        }

        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        let errors: Vec<String> = rules.iter().filter_map(|r| r.error()).collect();

        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    /// Look up an owned rule by name.
    pub fn rule(&self, name: &str) -> Option<Rule> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules.iter().find(|r| r.name() == name).cloned()
    }

    /// Snapshot of the owned rules, in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of owned rules.
    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no rules are owned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The validation's event channel.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Add a rule at the given index (default: append).
    ///
    /// A second rule under an existing name is a structural error.
    pub fn add_rule(&self, schema: RuleSchema, at: Option<usize>) -> Result<Rule, SchemaError> {
        let rule = Rule::new(schema);
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());

        let name = rule.name();
        if rules.iter().any(|r| r.name() == name) {
            return Err(SchemaError::DuplicateRule { name });
        }

        let index = at.unwrap_or(rules.len()).min(rules.len());
        rules.insert(index, rule.clone());
        drop(rules);

        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(rule)
    }

    /// Add several rules, appending in order.
    pub fn add_rules(&self, schemas: Vec<RuleSchema>) -> Result<Vec<Rule>, SchemaError> {
        schemas
            .into_iter()
            .map(|schema| self.add_rule(schema, None))
            .collect()
    }

    /// Remove a rule by name.
    ///
    /// Removing an absent rule is a structural error and mutates nothing.
    pub fn remove_rule(&self, name: &str) -> Result<Rule, SchemaError> {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let index = rules
            .iter()
            .position(|r| r.name() == name)
            .ok_or_else(|| SchemaError::UnknownRule {
                name: name.to_string(),
            })?;

        let removed = rules.remove(index);
        drop(rules);

        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(removed)
    }

    /// Remove several rules by name; fails on the first absent one.
    pub fn remove_rules(&self, names: &[&str]) -> Result<Vec<Rule>, SchemaError> {
        names.iter().map(|name| self.remove_rule(name)).collect()
    }

    /// Reset every owned rule to the untested-valid state.
    pub fn reset(&self) {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        for rule in rules.iter() {
            rule.reset();
        }
    }

    /// Run the owned rules against a value.
    ///
    /// All selected rules are dispatched before any result is awaited, then
    /// awaited together; there is no bail on first failure, so every rule
    /// reports a fresh result each call.
    pub async fn validate(
        &self,
        value: &Value,
        props: &PropsSnapshot,
        opts: ValidateOptions,
    ) -> bool {
        self.validate_guarded(value, props, opts, None).await
    }

    /// Like `validate`, but commits the run's outcomes only if `guard`
    /// approves once every rule has settled.
    ///
    /// Outcomes are applied together after the fan-in, so a run is atomic:
    /// observers never see a half-committed mix of two overlapping runs.
    /// Elements pass a guard that refuses runs that lost the
    /// latest-started-wins race.
    pub async fn validate_guarded(
        &self,
        value: &Value,
        props: &PropsSnapshot,
        opts: ValidateOptions,
        guard: Option<&(dyn Fn() -> bool + Send + Sync)>,
    ) -> bool {
        self.events
            .emit("validate", EventData::Validation(self.clone()))
            .await;

        let selected: Vec<Rule> = {
            let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
            rules
                .iter()
                .filter(|r| {
                    let name = r.name();
                    let wanted = opts
                        .only
                        .as_ref()
                        .is_none_or(|only| only.iter().any(|n| *n == name));
                    let skipped = opts
                        .excluded
                        .as_ref()
                        .is_some_and(|excluded| excluded.iter().any(|n| *n == name));
                    wanted && !skipped
                })
                .cloned()
                .collect()
        };

        trace!("validating {} rule(s)", selected.len());

        let outcomes = join_all(selected.iter().map(|rule| rule.evaluate(value, props))).await;

        if guard.is_none_or(|g| g()) {
            for (rule, outcome) in selected.iter().zip(outcomes) {
                rule.apply(outcome);
            }
            for rule in &selected {
                rule.events()
                    .emit("validated", EventData::Rule(rule.clone()))
                    .await;
            }
        }

        self.events
            .emit("validated", EventData::Validation(self.clone()))
            .await;

        self.valid()
    }

    /// Reconstruct the rule declarations this validation currently holds.
    ///
    /// Purely inherited, never-overridden rules are dropped; declared
    /// overrides come back self-contained.
    pub fn to_schema(&self) -> Vec<RuleSchema> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules
            .iter()
            .filter(|r| !r.is_inherited())
            .map(|r| r.schema())
            .collect()
    }

    /// Monotonic counter bumped on every structural mutation; owning
    /// elements use it to cache their reconstructed schema.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
