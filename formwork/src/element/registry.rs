//! Discriminator-to-builder registry, owned by a configuration.
//!
//! The registry is an explicit value, not process-wide state: independent
//! trees can carry independent type sets, and nothing leaks across tests.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::config::Config;
use crate::error::SchemaError;
use crate::schema::{ElementSchema, FORM_TYPE_COLLECTION, FORM_TYPE_FIELD, FORM_TYPE_GROUP};

use super::collection::Collection;
use super::field::Field;
use super::group::Group;
use super::node::{ElementNode, WeakNode};

/// Builder resolving one `formType` discriminator into a live element.
pub type ElementBuilder = Arc<
    dyn Fn(ElementSchema, Option<WeakNode>, Arc<Config>) -> Result<ElementNode, SchemaError>
        + Send
        + Sync,
>;

/// Maps `formType` discriminators to element builders.
#[derive(Clone)]
pub struct Registry {
    builders: HashMap<String, ElementBuilder>,
}

impl Registry {
    /// An empty registry; every resolution fails until types are registered.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// A registry knowing the built-in `field`, `group` and `collection`
    /// types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register(FORM_TYPE_FIELD, Arc::new(build_field));
        registry.register(FORM_TYPE_GROUP, Arc::new(build_group));
        registry.register(FORM_TYPE_COLLECTION, Arc::new(build_collection));

        registry
    }

    /// Register a builder under a discriminator, replacing any existing one.
    pub fn register(&mut self, form_type: impl Into<String>, builder: ElementBuilder) {
        let form_type = form_type.into();
        debug!("registering element type {form_type:?}");
        self.builders.insert(form_type, builder);
    }

    /// Whether a discriminator resolves.
    pub fn contains(&self, form_type: &str) -> bool {
        self.builders.contains_key(form_type)
    }

    /// Resolve a schema into a live element.
    ///
    /// Fails structurally when no types are registered, when the id is
    /// missing, or when the discriminator does not resolve.
    pub fn build(
        &self,
        schema: ElementSchema,
        parent: Option<WeakNode>,
        config: &Arc<Config>,
    ) -> Result<ElementNode, SchemaError> {
        if self.builders.is_empty() {
            return Err(SchemaError::EmptyRegistry);
        }

        if schema.form_id().is_empty() {
            return Err(SchemaError::MissingFormId {
                form_type: schema.form_type().to_string(),
            });
        }

        let form_type = schema.form_type();
        let builder = self
            .builders
            .get(form_type)
            .ok_or_else(|| SchemaError::UnknownFormType {
                form_id: schema.form_id().to_string(),
                form_type: form_type.to_string(),
            })?;

        builder(schema, parent, config.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_field(
    schema: ElementSchema,
    parent: Option<WeakNode>,
    config: Arc<Config>,
) -> Result<ElementNode, SchemaError> {
    match schema {
        ElementSchema::Field(schema) => {
            Field::build(schema, parent, config).map(ElementNode::Field)
        }
        other => Err(SchemaError::UnknownFormType {
            form_id: other.form_id().to_string(),
            form_type: other.form_type().to_string(),
        }),
    }
}

fn build_group(
    schema: ElementSchema,
    parent: Option<WeakNode>,
    config: Arc<Config>,
) -> Result<ElementNode, SchemaError> {
    match schema {
        ElementSchema::Group(schema) => {
            Group::build(schema, parent, config).map(ElementNode::Group)
        }
        other => Err(SchemaError::UnknownFormType {
            form_id: other.form_id().to_string(),
            form_type: other.form_type().to_string(),
        }),
    }
}

fn build_collection(
    schema: ElementSchema,
    parent: Option<WeakNode>,
    config: Arc<Config>,
) -> Result<ElementNode, SchemaError> {
    match schema {
        ElementSchema::Collection(schema) => {
            Collection::build(schema, parent, config).map(ElementNode::Collection)
        }
        other => Err(SchemaError::UnknownFormType {
            form_id: other.form_id().to_string(),
            form_type: other.form_type().to_string(),
        }),
    }
}
