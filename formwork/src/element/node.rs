//! The tree node: any element, dispatched by kind.

use std::sync::Arc;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::error::SchemaError;
use crate::event::{EventData, Events};
use crate::pending::Pending;
use crate::props::Props;
use crate::schema::ElementSchema;
use crate::validation::Validation;
use crate::value::Value;

use super::collection::{Collection, WeakCollection};
use super::field::Field;
use super::group::{Group, WeakGroup};

/// Any node in the form tree.
///
/// Cloning clones the underlying handle; both clones address the same
/// element.
#[derive(Clone)]
pub enum ElementNode {
    /// A leaf field.
    Field(Field),
    /// A composite group.
    Group(Group),
    /// A repeatable collection.
    Collection(Collection),
}

/// Weak parent link held by children.
#[derive(Clone)]
pub enum WeakNode {
    /// The parent is a group.
    Group(WeakGroup),
    /// The parent is a collection.
    Collection(WeakCollection),
}

impl std::fmt::Debug for ElementNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(x) => std::fmt::Debug::fmt(x, f),
            Self::Group(x) => std::fmt::Debug::fmt(x, f),
            Self::Collection(x) => std::fmt::Debug::fmt(x, f),
        }
    }
}

impl WeakNode {
    /// Upgrade back to a live handle, if the parent is still alive.
    pub fn upgrade(&self) -> Option<ElementNode> {
        match self {
            Self::Group(weak) => weak.upgrade().map(ElementNode::Group),
            Self::Collection(weak) => weak.upgrade().map(ElementNode::Collection),
        }
    }
}

impl ElementNode {
    fn base(&self) -> &super::ElementBase {
        match self {
            Self::Field(f) => f.base(),
            Self::Group(g) => g.base(),
            Self::Collection(c) => c.base(),
        }
    }

    /// Stable instance identity.
    pub fn uid(&self) -> Uuid {
        self.base().uid()
    }

    /// The field handle, if this node is a field.
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Self::Field(f) => Some(f),
            _ => None,
        }
    }

    /// The group handle, if this node is a group.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    /// The collection handle, if this node is a collection.
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// The element's id; positional for collection items.
    pub fn form_id(&self) -> String {
        match self {
            Self::Field(f) => f.base().form_id().to_string(),
            Self::Group(g) => g.form_id(),
            Self::Collection(c) => c.form_id(),
        }
    }

    /// The display/binding key.
    pub fn model(&self) -> String {
        self.base().model().to_string()
    }

    /// The `formType` discriminator.
    pub fn form_type(&self) -> &'static str {
        match self {
            Self::Field(_) => crate::schema::FORM_TYPE_FIELD,
            Self::Group(_) => crate::schema::FORM_TYPE_GROUP,
            Self::Collection(_) => crate::schema::FORM_TYPE_COLLECTION,
        }
    }

    /// Whether the element (and, for composites, its whole subtree) is
    /// currently valid.
    pub fn valid(&self) -> bool {
        match self {
            Self::Field(f) => f.is_valid(),
            Self::Group(g) => g.is_valid(),
            Self::Collection(c) => c.is_valid(),
        }
    }

    /// The element's current value; `Null` while invalid.
    pub fn value(&self) -> Value {
        match self {
            Self::Field(f) => f.value(),
            Self::Group(g) => g.value(),
            Self::Collection(c) => c.value(),
        }
    }

    /// The user-visible error: `None` unless shaken and invalid.
    ///
    /// A composite with no failing rule of its own surfaces the first
    /// error a shaken descendant reports, in child order.
    pub fn error(&self) -> Option<String> {
        let own = self.base().error_with(self.valid());
        if own.is_some() {
            return own;
        }
        match self {
            Self::Field(_) => None,
            Self::Group(g) => g.children().iter().find_map(ElementNode::error),
            Self::Collection(c) => c
                .groups()
                .iter()
                .find_map(|g| ElementNode::Group(g.clone()).error()),
        }
    }

    /// Mark errors as user-visible; composites cascade unless told not to.
    pub fn shake(&self, cascade: bool) {
        match self {
            Self::Field(f) => f.base().shake(),
            Self::Group(g) => g.shake(cascade),
            Self::Collection(c) => c.shake(cascade),
        }
    }

    /// Whether the element has been shaken.
    pub fn shaked(&self) -> bool {
        self.base().shaked()
    }

    /// Force the element invalid independent of its validation.
    pub fn invalidate(&self, message: Option<String>) {
        self.base().invalidate(message);
    }

    /// Clear the shaken flag and any forced invalidation.
    pub fn clean_up(&self) {
        self.base().clean_up();
    }

    /// Validate the element; composites cascade over children first.
    pub fn validate(&self, cascade: bool) -> BoxFuture<'_, bool> {
        match self {
            Self::Field(f) => Box::pin(f.validate()),
            Self::Group(g) => Box::pin(g.validate(cascade)),
            Self::Collection(c) => Box::pin(c.validate(cascade)),
        }
    }

    /// Set the element's value; shape mismatches are structural errors.
    pub fn set_value(&self, value: Value) -> BoxFuture<'_, Result<Value, SchemaError>> {
        match self {
            Self::Field(f) => Box::pin(async move { Ok(f.set_value(value).await) }),
            Self::Group(g) => Box::pin(g.set_value(value)),
            Self::Collection(c) => Box::pin(c.set_value(value)),
        }
    }

    /// Check a candidate value's shape against this subtree without
    /// mutating anything.
    pub fn check_shape(&self, value: &Value) -> Result<(), SchemaError> {
        match self {
            Self::Field(_) => Ok(()),
            Self::Group(group) => match value {
                Value::Map(entries) => {
                    for (key, entry) in entries {
                        if let Some(child) = group.child(key) {
                            child.check_shape(entry)?;
                        }
                    }
                    Ok(())
                }
                _ => Err(SchemaError::InvalidValue {
                    form_id: group.form_id(),
                    expected: "an object value",
                }),
            },
            Self::Collection(collection) => match value {
                Value::List(items) => {
                    if items.iter().all(|item| matches!(item, Value::Map(_))) {
                        Ok(())
                    } else {
                        Err(SchemaError::InvalidValue {
                            form_id: collection.form_id(),
                            expected: "an object value per item",
                        })
                    }
                }
                _ => Err(SchemaError::InvalidValue {
                    form_id: collection.form_id(),
                    expected: "an array value",
                }),
            },
        }
    }

    /// Restore declared defaults and untest every rule in the subtree.
    pub fn reset(&self) {
        match self {
            Self::Field(f) => f.reset(),
            Self::Group(g) => g.reset(),
            Self::Collection(c) => c.reset(),
        }
    }

    /// Clear the subtree to empty values.
    pub fn clear(&self) -> BoxFuture<'_, ()> {
        match self {
            Self::Field(f) => Box::pin(f.clear()),
            Self::Group(g) => Box::pin(g.clear()),
            Self::Collection(c) => Box::pin(c.clear()),
        }
    }

    /// The element's event channel.
    pub fn events(&self) -> &Events {
        self.base().events()
    }

    /// The element's user-defined properties.
    pub fn props(&self) -> &Props {
        self.base().props()
    }

    /// The owned validation.
    pub fn validation(&self) -> &Validation {
        self.base().validation()
    }

    /// The merged element options.
    pub fn options(&self) -> crate::config::Options {
        self.base().options()
    }

    /// The in-flight operation tracker.
    pub fn pending_tracker(&self) -> &Pending {
        self.base().pending()
    }

    /// Whether any operation is in flight on this element.
    pub fn pending(&self) -> bool {
        self.base().pending().is_any_pending()
    }

    /// The parent element, if attached.
    pub fn parent(&self) -> Option<ElementNode> {
        self.base().parent()
    }

    /// Ancestor path, root first.
    pub fn ancestors(&self) -> Vec<ElementNode> {
        self.base().ancestors()
    }

    /// Own-props lookup by dotted path.
    pub fn prop(&self, path: &str) -> Option<Value> {
        self.base().prop(path)
    }

    /// Props lookup walking up through ancestors on a miss.
    pub fn prop_up(&self, path: &str) -> Option<Value> {
        self.base().prop_up(path)
    }

    /// Reconstruct the element's declaration from its live state.
    ///
    /// Repeated calls with no mutation in between return the same `Arc`.
    pub fn schema(&self) -> Arc<ElementSchema> {
        match self {
            Self::Field(f) => f.schema(),
            Self::Group(g) => g.schema(),
            Self::Collection(c) => c.schema(),
        }
    }

    pub(crate) fn schema_generation(&self) -> u64 {
        match self {
            Self::Field(f) => f.schema_generation(),
            Self::Group(g) => g.schema_generation(),
            Self::Collection(c) => c.schema_generation(),
        }
    }

    /// Run the post-construction pass: apply declared initial values,
    /// then announce the element.
    pub(crate) fn init(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self {
                Self::Field(f) => f.init().await,
                Self::Group(g) => g.init().await,
                Self::Collection(_) => {}
            }
            self.events()
                .emit("created", EventData::Element(self.clone()))
                .await;
        })
    }
}
