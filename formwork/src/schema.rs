//! Declarative schemas consumed at element construction.
//!
//! Schemas are built with plain fluent builders. They round-trip: a live
//! element reconstructs an equivalent schema from its current state via
//! `schema()`, including programmatic rule and child mutations.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Options;
use crate::event::{Callback, EventName};
use crate::props::{DeriveFn, PropsSnapshot};
use crate::validation::{ValidatorFn, Verdict};
use crate::value::Value;

/// Discriminator for field schemas.
pub const FORM_TYPE_FIELD: &str = "field";
/// Discriminator for group schemas.
pub const FORM_TYPE_GROUP: &str = "group";
/// Discriminator for collection schemas.
pub const FORM_TYPE_COLLECTION: &str = "collection";

/// Declared cast type of a leaf field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Raw string passthrough.
    #[default]
    String,
    /// Strictly recognized numeric strings.
    Number,
    /// `true` iff the raw string is literally `"true"`.
    Boolean,
    /// Calendar-date parsing.
    Date,
}

impl FieldType {
    /// The type tag used by rule `for` restrictions.
    pub fn tag(self) -> TypeTag {
        match self {
            Self::String => TypeTag::String,
            Self::Number => TypeTag::Number,
            Self::Boolean => TypeTag::Boolean,
            Self::Date => TypeTag::Date,
        }
    }
}

/// Declared element type a rule can be restricted to via `for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// String fields.
    String,
    /// Number fields.
    Number,
    /// Boolean fields.
    Boolean,
    /// Date fields.
    Date,
    /// Groups.
    Group,
    /// Collections.
    Collection,
}

/// A rule's error message: fixed text or derived from the failing value.
#[derive(Clone)]
pub enum Message {
    /// Fixed message text.
    Text(String),
    /// Message computed from the failing value and the element's props.
    Dynamic(Arc<dyn Fn(&Value, &PropsSnapshot) -> String + Send + Sync>),
}

impl Message {
    /// Resolve the message against a value and props snapshot.
    pub fn resolve(&self, value: &Value, props: &PropsSnapshot) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Dynamic(f) => f(value, props),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Dynamic(a), Self::Dynamic(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Declaration of one validation rule.
#[derive(Clone)]
pub struct RuleSchema {
    /// Rule identity, unique within one validation.
    pub name: String,
    /// The validator; a rule without one is trivially valid.
    pub validator: Option<ValidatorFn>,
    /// Error message used when the validator fails without its own text.
    pub message: Option<Message>,
    /// Restricts the rule to elements of the listed declared types.
    pub for_types: Option<Vec<TypeTag>>,
    /// Whether descendants inherit this rule.
    pub cascade: bool,
    /// Whether this declaration accepts a same-named inherited rule.
    pub inherit: bool,
    /// Set on rules that arrived purely by cascading; they are dropped from
    /// reconstructed schemas.
    pub(crate) inherited: bool,
}

impl RuleSchema {
    /// Start a rule declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            validator: None,
            message: None,
            for_types: None,
            cascade: false,
            inherit: true,
            inherited: false,
        }
    }

    /// Attach a synchronous predicate; `false` fails with the rule message.
    pub fn check(self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validate_with(move |value, _| {
            if f(value) {
                Verdict::Pass
            } else {
                Verdict::Fail
            }
        })
    }

    /// Attach a synchronous validator with full verdict control.
    pub fn validate_with(
        mut self,
        f: impl Fn(&Value, &PropsSnapshot) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(move |value, props| {
            let verdict = f(&value, &props);
            Box::pin(async move { verdict })
        }));
        self
    }

    /// Attach an asynchronous validator.
    pub fn validate_async(mut self, f: ValidatorFn) -> Self {
        self.validator = Some(f);
        self
    }

    /// Set the fixed error message.
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(Message::Text(text.into()));
        self
    }

    /// Set a message computed from the failing value.
    pub fn message_with(
        mut self,
        f: impl Fn(&Value, &PropsSnapshot) -> String + Send + Sync + 'static,
    ) -> Self {
        self.message = Some(Message::Dynamic(Arc::new(f)));
        self
    }

    /// Restrict the rule to the listed declared types.
    pub fn only_for(mut self, tags: impl IntoIterator<Item = TypeTag>) -> Self {
        self.for_types = Some(tags.into_iter().collect());
        self
    }

    /// Mark the rule as inheritable by descendants.
    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    /// Opt this declaration out of a same-named inherited rule.
    pub fn no_inherit(mut self) -> Self {
        self.inherit = false;
        self
    }

    /// Whether this rule arrived purely by cascading.
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }
}

impl PartialEq for RuleSchema {
    fn eq(&self, other: &Self) -> bool {
        let validators_match = match (&self.validator, &other.validator) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.name == other.name
            && validators_match
            && self.message == other.message
            && self.for_types == other.for_types
            && self.cascade == other.cascade
            && self.inherit == other.inherit
    }
}

impl fmt::Debug for RuleSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSchema")
            .field("name", &self.name)
            .field("validator", &self.validator.as_ref().map(|_| ".."))
            .field("message", &self.message)
            .field("for_types", &self.for_types)
            .field("cascade", &self.cascade)
            .field("inherit", &self.inherit)
            .finish()
    }
}

/// A schema-declared event handler.
#[derive(Clone)]
pub struct HandlerSchema {
    /// The event name the handler listens on.
    pub event: EventName,
    /// The handler itself.
    pub callback: Callback,
}

impl PartialEq for HandlerSchema {
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event
    }
}

impl fmt::Debug for HandlerSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSchema")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// A schema-declared property: plain or derived.
#[derive(Clone)]
pub enum PropSchema {
    /// A plain value, possibly nested.
    Plain(Value),
    /// A derived cell over an async compute closure.
    Derived(DeriveFn),
}

impl PartialEq for PropSchema {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a == b,
            (Self::Derived(a), Self::Derived(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(v) => f.debug_tuple("Plain").field(v).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Schema of a leaf field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSchema {
    /// Declared id, unique among siblings.
    pub form_id: String,
    /// Display/binding key; defaults to the id.
    pub model: Option<String>,
    /// Declared cast type.
    pub field_type: FieldType,
    /// Value restored by `reset`.
    pub default: Option<Value>,
    /// Initial value applied after construction.
    pub value: Option<Value>,
    /// Comparison value backing `checked` on non-boolean fields.
    pub checked_value: Option<String>,
    /// Format declaration handed to the external formatter.
    pub format: Option<String>,
    /// Validation rules.
    pub rules: Vec<RuleSchema>,
    /// User-defined properties.
    pub props: Vec<(String, PropSchema)>,
    /// Event handlers wired at construction.
    pub on: Vec<HandlerSchema>,
    /// Per-element option overrides.
    pub options: Option<Options>,
}

impl FieldSchema {
    /// Start a field schema.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            ..Self::default()
        }
    }

    /// Set the declared cast type.
    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Set the display/binding key.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the initial value.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the reset default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the checked comparison value.
    pub fn checked_value(mut self, value: impl Into<String>) -> Self {
        self.checked_value = Some(value.into());
        self
    }

    /// Set the format declaration.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Add a validation rule.
    pub fn rule(mut self, rule: RuleSchema) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a plain property.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.push((name.into(), PropSchema::Plain(value.into())));
        self
    }

    /// Add a derived property.
    pub fn derived_prop(mut self, name: impl Into<String>, compute: DeriveFn) -> Self {
        self.props.push((name.into(), PropSchema::Derived(compute)));
        self
    }

    /// Wire an event handler.
    pub fn on(mut self, event: impl Into<EventName>, callback: Callback) -> Self {
        self.on.push(HandlerSchema {
            event: event.into(),
            callback,
        });
        self
    }

    /// Override element options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }
}

/// Schema of a group of named child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupSchema {
    /// Declared id, unique among siblings.
    pub form_id: String,
    /// Display/binding key; defaults to the id.
    pub model: Option<String>,
    /// Child element schemas, in order.
    pub fields: Vec<ElementSchema>,
    /// Validation rules; `cascade` rules flow into children.
    pub rules: Vec<RuleSchema>,
    /// User-defined properties.
    pub props: Vec<(String, PropSchema)>,
    /// Event handlers wired at construction.
    pub on: Vec<HandlerSchema>,
    /// Per-element option overrides.
    pub options: Option<Options>,
}

impl GroupSchema {
    /// Start a group schema.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            ..Self::default()
        }
    }

    /// Set the display/binding key.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a child schema.
    pub fn field(mut self, field: impl Into<ElementSchema>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add a validation rule.
    pub fn rule(mut self, rule: RuleSchema) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a plain property.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.push((name.into(), PropSchema::Plain(value.into())));
        self
    }

    /// Add a derived property.
    pub fn derived_prop(mut self, name: impl Into<String>, compute: DeriveFn) -> Self {
        self.props.push((name.into(), PropSchema::Derived(compute)));
        self
    }

    /// Wire an event handler.
    pub fn on(mut self, event: impl Into<EventName>, callback: Callback) -> Self {
        self.on.push(HandlerSchema {
            event: event.into(),
            callback,
        });
        self
    }

    /// Override element options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }
}

/// Schema of the repeatable item inside a collection.
///
/// Items have no declared id: their identity is positional and their ids are
/// derived from the owning collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemSchema {
    /// Child element schemas, in order.
    pub fields: Vec<ElementSchema>,
    /// Validation rules.
    pub rules: Vec<RuleSchema>,
    /// User-defined properties.
    pub props: Vec<(String, PropSchema)>,
    /// Event handlers wired at construction.
    pub on: Vec<HandlerSchema>,
    /// Per-element option overrides.
    pub options: Option<Options>,
}

impl ItemSchema {
    /// Start an item schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child schema.
    pub fn field(mut self, field: impl Into<ElementSchema>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add a validation rule.
    pub fn rule(mut self, rule: RuleSchema) -> Self {
        self.rules.push(rule);
        self
    }

    /// Override element options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }
}

/// Schema of a collection of repeatable group items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionSchema {
    /// Declared id, unique among siblings.
    pub form_id: String,
    /// Display/binding key; defaults to the id.
    pub model: Option<String>,
    /// Template schema every item is built from.
    pub group: ItemSchema,
    /// Validation rules; `cascade` rules flow into items.
    pub rules: Vec<RuleSchema>,
    /// User-defined properties.
    pub props: Vec<(String, PropSchema)>,
    /// Event handlers wired at construction.
    pub on: Vec<HandlerSchema>,
    /// Per-element option overrides.
    pub options: Option<Options>,
}

impl CollectionSchema {
    /// Start a collection schema.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            ..Self::default()
        }
    }

    /// Set the display/binding key.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the item template.
    pub fn group(mut self, item: ItemSchema) -> Self {
        self.group = item;
        self
    }

    /// Add a validation rule.
    pub fn rule(mut self, rule: RuleSchema) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a plain property.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.push((name.into(), PropSchema::Plain(value.into())));
        self
    }

    /// Wire an event handler.
    pub fn on(mut self, event: impl Into<EventName>, callback: Callback) -> Self {
        self.on.push(HandlerSchema {
            event: event.into(),
            callback,
        });
        self
    }

    /// Override element options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }
}

/// Any element schema, discriminated by `formType`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementSchema {
    /// A leaf field.
    Field(FieldSchema),
    /// A composite group.
    Group(GroupSchema),
    /// A repeatable collection.
    Collection(CollectionSchema),
}

impl ElementSchema {
    /// The declared id.
    pub fn form_id(&self) -> &str {
        match self {
            Self::Field(s) => &s.form_id,
            Self::Group(s) => &s.form_id,
            Self::Collection(s) => &s.form_id,
        }
    }

    /// The `formType` discriminator.
    pub fn form_type(&self) -> &'static str {
        match self {
            Self::Field(_) => FORM_TYPE_FIELD,
            Self::Group(_) => FORM_TYPE_GROUP,
            Self::Collection(_) => FORM_TYPE_COLLECTION,
        }
    }

    /// The declared rules.
    pub fn rules(&self) -> &[RuleSchema] {
        match self {
            Self::Field(s) => &s.rules,
            Self::Group(s) => &s.rules,
            Self::Collection(s) => &s.rules,
        }
    }

    /// Replace the declared rules.
    pub fn set_rules(&mut self, rules: Vec<RuleSchema>) {
        match self {
            Self::Field(s) => s.rules = rules,
            Self::Group(s) => s.rules = rules,
            Self::Collection(s) => s.rules = rules,
        }
    }

    /// The declared type tag, used by rule `for` restrictions.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Field(s) => s.field_type.tag(),
            Self::Group(_) => TypeTag::Group,
            Self::Collection(_) => TypeTag::Collection,
        }
    }
}

impl From<FieldSchema> for ElementSchema {
    fn from(schema: FieldSchema) -> Self {
        Self::Field(schema)
    }
}

impl From<GroupSchema> for ElementSchema {
    fn from(schema: GroupSchema) -> Self {
        Self::Group(schema)
    }
}

impl From<CollectionSchema> for ElementSchema {
    fn from(schema: CollectionSchema) -> Self {
        Self::Collection(schema)
    }
}
