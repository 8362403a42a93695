//! Leaf element holding a raw string and its typed cast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::debug;

use crate::config::Config;
use crate::error::SchemaError;
use crate::event::EventData;
use crate::schema::{ElementSchema, FieldSchema, FieldType};
use crate::validation::ValidateOptions;
use crate::value::{is_numeric, Value};

use super::base::{BaseParts, ElementBase};
use super::node::{ElementNode, WeakNode};

struct FieldInner {
    raw: String,
    formatted: Option<String>,
    checked_value: Option<String>,
    /// Declared initial value, consumed by the post-construction pass.
    initial: Option<Value>,
}

/// A leaf element.
///
/// The raw string representation is the source of truth; the typed value is
/// derived from it by the declared cast, and only observable while the field
/// is valid. Cloning shares state.
#[derive(Clone)]
pub struct Field {
    base: ElementBase,
    decl: Arc<FieldSchema>,
    inner: Arc<RwLock<FieldInner>>,
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("form_id", &self.base.form_id())
            .field("uid", &self.base.uid())
            .finish_non_exhaustive()
    }
}

impl Field {
    pub(crate) fn build(
        schema: FieldSchema,
        parent: Option<WeakNode>,
        config: Arc<Config>,
    ) -> Result<Self, SchemaError> {
        let base = ElementBase::new(
            BaseParts {
                form_id: &schema.form_id,
                model: schema.model.as_deref(),
                rules: &schema.rules,
                props: &schema.props,
                on: &schema.on,
                options: schema.options,
                tag: schema.field_type.tag(),
            },
            parent,
            config,
        )?;

        let initial = schema.value.clone().or_else(|| schema.default.clone());
        let checked_value = schema.checked_value.clone();

        Ok(Self {
            base,
            decl: Arc::new(schema),
            inner: Arc::new(RwLock::new(FieldInner {
                raw: String::new(),
                formatted: None,
                checked_value,
                initial,
            })),
        })
    }

    /// Apply the declared initial value, if any.
    pub(crate) async fn init(&self) {
        let initial = self
            .inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .initial
            .take();
        if let Some(value) = initial {
            self.set_value(value).await;
        }
    }

    fn node(&self) -> ElementNode {
        ElementNode::Field(self.clone())
    }

    /// Shared element state.
    pub fn base(&self) -> &ElementBase {
        &self.base
    }

    /// The declared cast type.
    pub fn field_type(&self) -> FieldType {
        self.decl.field_type
    }

    /// The declared reset default.
    pub fn default_value(&self) -> Option<Value> {
        self.decl.default.clone()
    }

    /// The current raw string representation.
    pub fn raw(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .raw
            .clone()
    }

    /// The display string produced by the external formatter, if any.
    pub fn formatted(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .formatted
            .clone()
    }

    /// The checked comparison value.
    pub fn checked_value(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .checked_value
            .clone()
    }

    /// Replace the checked comparison value.
    pub fn set_checked_value(&self, value: Option<String>) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .checked_value = value;
        // Reflected in reconstructed schemas.
        self.base.bump_structure();
    }

    /// Cast a raw string by the declared type. A failed cast yields `Null`.
    pub fn cast(&self, raw: &str) -> Value {
        match self.decl.field_type {
            FieldType::String => Value::Text(raw.to_string()),
            FieldType::Number => {
                if is_numeric(raw) {
                    raw.trim()
                        .parse::<f64>()
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                } else {
                    Value::Null
                }
            }
            FieldType::Boolean => Value::Bool(raw == "true"),
            FieldType::Date => parse_date(raw).map(Value::Date).unwrap_or(Value::Null),
        }
    }

    /// The typed value: the cast of the current raw, observable only while
    /// the field reports valid.
    pub fn value(&self) -> Value {
        if self.is_valid() {
            self.cast(&self.raw())
        } else {
            Value::Null
        }
    }

    /// Whether the field currently reports valid.
    pub fn is_valid(&self) -> bool {
        !self.base.invalidated() && self.base.validation().valid()
    }

    /// The checked state.
    ///
    /// Boolean fields mirror their value; other fields compare the declared
    /// checked value against the stringified current value.
    pub fn checked(&self) -> bool {
        if self.decl.field_type == FieldType::Boolean {
            return self.value() == Value::Bool(true);
        }
        match self.checked_value() {
            Some(checked_value) => {
                let value = self.value();
                !value.is_null() && value.stringify() == checked_value
            }
            None => false,
        }
    }

    /// Store a raw string representation. Equivalent to `set_value`.
    pub async fn set_raw(&self, raw: impl Into<String>) -> Value {
        self.set_value(Value::Text(raw.into())).await
    }

    /// Stringify and store a new value.
    ///
    /// Revalidates immediately when `options.silent`; emits `changed` only
    /// when the raw actually changed. Returns the resulting typed value.
    pub async fn set_value(&self, value: Value) -> Value {
        let old = self.raw();
        let new = value.stringify();

        self.inner.write().unwrap_or_else(|e| e.into_inner()).raw = new.clone();

        if self.base.options().silent {
            self.validate().await;
        }

        if old != new {
            self.base
                .events()
                .emit(
                    "changed",
                    EventData::Changed {
                        element: self.node(),
                        old: Value::Text(old),
                        new: Value::Text(new),
                    },
                )
                .await;
        }

        self.value()
    }

    /// Run the owned rules against the cast of the current raw.
    ///
    /// Emits `validate`/`validated`, recomputes `formatted` through the
    /// external formatter, and returns the final validity. Overlapping calls
    /// race deliberately: the latest-started call commits the final state.
    pub async fn validate(&self) -> bool {
        let token = self.base.begin_run();
        self.base.pending().add("validate");
        self.base
            .events()
            .emit("validate", EventData::Element(self.node()))
            .await;

        let raw = self.raw();
        let typed = self.cast(&raw);
        let props = self.base.props().snapshot();

        let committed = Arc::new(AtomicBool::new(false));
        let guard = {
            let base = self.base.clone();
            let committed = committed.clone();
            move || {
                let won = base.try_commit(token);
                committed.store(won, Ordering::SeqCst);
                won
            }
        };
        self.base
            .validation()
            .validate_guarded(&typed, &props, ValidateOptions::default(), Some(&guard))
            .await;

        if committed.load(Ordering::SeqCst) {
            let formatted = self.decl.format.as_ref().and_then(|format| {
                self.base
                    .config()
                    .formatter()
                    .map(|f| f.format(format, &self.node()))
            });
            self.inner
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .formatted = formatted;
        }

        self.base.pending().kill("validate");
        self.base
            .events()
            .emit("validated", EventData::Element(self.node()))
            .await;

        debug!("field {} validated: {}", self.base.form_id(), self.is_valid());
        self.is_valid()
    }

    /// Restore the raw to the declared default and untest the rules.
    pub fn reset(&self) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).raw = self
            .decl
            .default
            .as_ref()
            .map(Value::stringify)
            .unwrap_or_default();
        self.base.clean_up();
        self.base.validation().reset();
    }

    /// Set the raw to the empty string, ignoring the default.
    pub async fn clear(&self) {
        self.base.clean_up();
        self.set_value(Value::Text(String::new())).await;
    }

    /// Reconstruct the field's declaration with its live rules.
    pub fn schema(&self) -> Arc<ElementSchema> {
        let generation = self.schema_generation();
        self.base.cached_schema(generation, || {
            let mut decl = (*self.decl).clone();
            decl.rules = self.base.validation().to_schema();
            decl.checked_value = self.checked_value();
            ElementSchema::Field(decl)
        })
    }

    pub(crate) fn schema_generation(&self) -> u64 {
        self.base.validation().generation() + self.base.structure_generation()
    }
}

/// Parse a calendar date from the raw formats form input arrives in.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&parsed.and_hms_opt(0, 0, 0)?));
        }
    }

    None
}
