//! A single validation rule: one validator plus a message.

use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use crate::event::{EventData, Events};
use crate::props::PropsSnapshot;
use crate::schema::{Message, RuleSchema};
use crate::value::Value;

/// Outcome of a validator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The value passed.
    Pass,
    /// The value failed; the rule's own message becomes the error.
    Fail,
    /// The value failed with this exact error text.
    FailWith(String),
}

/// Validator closure: receives the value under test and a snapshot of the
/// owning element's props.
pub type ValidatorFn =
    Arc<dyn Fn(Value, PropsSnapshot) -> BoxFuture<'static, Verdict> + Send + Sync>;

#[derive(Debug)]
struct RuleState {
    valid: bool,
    error: Option<String>,
}

/// One named validation rule.
///
/// A rule starts in the untested-valid state, is mutated in place by every
/// `validate` call, and can be forced back to untested by `reset`. Cloning
/// shares state: every handle observes the same verdict.
#[derive(Clone)]
pub struct Rule {
    schema: Arc<RwLock<RuleSchema>>,
    state: Arc<RwLock<RuleState>>,
    events: Events,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name())
            .field("valid", &self.valid())
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Create a rule from its declaration.
    pub fn new(schema: RuleSchema) -> Self {
        Self {
            schema: Arc::new(RwLock::new(schema)),
            state: Arc::new(RwLock::new(RuleState {
                valid: true,
                error: None,
            })),
            events: Events::new(),
        }
    }

    /// The rule's identity.
    pub fn name(&self) -> String {
        self.schema
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .name
            .clone()
    }

    /// Result of the most recent `validate` call; `true` when untested.
    pub fn valid(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).valid
    }

    /// Active error string, if the rule is currently invalid.
    pub fn error(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .error
            .clone()
    }

    /// The rule's current message.
    pub fn message(&self) -> Option<Message> {
        self.schema
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .message
            .clone()
    }

    /// Replace the rule's message; reflected in reconstructed schemas.
    pub fn set_message(&self, message: Option<Message>) {
        self.schema
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .message = message;
    }

    /// The rule's event channel.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Snapshot of the rule's declaration.
    pub fn schema(&self) -> RuleSchema {
        self.schema.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn is_inherited(&self) -> bool {
        self.schema
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .inherited
    }

    /// Force the rule back to the untested-valid state.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.valid = true;
        state.error = None;
    }

    /// Run the validator against a value.
    ///
    /// Absent validators are trivially valid. A `Fail` verdict derives the
    /// error from the rule's message; `FailWith` carries its own text.
    /// Emits `validate` before running and `validated` after.
    pub async fn validate(&self, value: &Value, props: &PropsSnapshot) -> bool {
        let outcome = self.evaluate(value, props).await;
        let valid = outcome.valid;
        self.apply(outcome);
        self.events
            .emit("validated", EventData::Rule(self.clone()))
            .await;
        valid
    }

    /// Run the validator and derive the outcome without committing it.
    ///
    /// Emits `validate`; the matching `validated` is emitted by whoever
    /// applies the outcome. Keeping evaluation and commit separate lets an
    /// owning validation apply a whole run's outcomes atomically, or refuse
    /// a run that lost the overlapping-validate race.
    pub(crate) async fn evaluate(&self, value: &Value, props: &PropsSnapshot) -> RuleOutcome {
        self.events
            .emit("validate", EventData::Rule(self.clone()))
            .await;

        let (validator, message) = {
            let schema = self.schema.read().unwrap_or_else(|e| e.into_inner());
            (schema.validator.clone(), schema.message.clone())
        };

        let verdict = match validator {
            Some(f) => f(value.clone(), props.clone()).await,
            None => Verdict::Pass,
        };

        match verdict {
            Verdict::Pass => RuleOutcome {
                valid: true,
                error: None,
            },
            Verdict::Fail => RuleOutcome {
                valid: false,
                error: message.map(|m| m.resolve(value, props)),
            },
            Verdict::FailWith(text) => RuleOutcome {
                valid: false,
                error: Some(text),
            },
        }
    }

    /// Commit a previously evaluated outcome.
    pub(crate) fn apply(&self, outcome: RuleOutcome) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.valid = outcome.valid;
        state.error = outcome.error;
    }
}

/// The derived result of one validator run, not yet committed.
#[derive(Debug, Clone)]
pub(crate) struct RuleOutcome {
    pub valid: bool,
    pub error: Option<String>,
}
