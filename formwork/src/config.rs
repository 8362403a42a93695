//! Engine configuration: ambient defaults, the element-type registry, and
//! the external formatter collaborator.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::element::{ElementBuilder, ElementNode, Registry};
use crate::error::SchemaError;
use crate::schema::ElementSchema;

/// Per-element behavior options, merged from ambient defaults and the
/// element's own declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Whether setting a value immediately triggers validation.
    pub silent: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { silent: true }
    }
}

/// External formatter collaborator.
///
/// The engine only calls this hook when a field declares a `format` and
/// stores the result in `formatted`; formatting and localization themselves
/// live outside the engine.
pub trait Formatter: Send + Sync {
    /// Produce the display string for a format declaration and element.
    fn format(&self, format: &str, element: &ElementNode) -> String;
}

/// Root configuration a tree is built against.
///
/// Owns the registry and the ambient option defaults, so independent trees
/// can carry independent type sets.
pub struct Config {
    registry: Registry,
    options: Options,
    formatter: Option<Arc<dyn Formatter>>,
}

impl Config {
    /// A configuration with the default registry and options.
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    /// Start building a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            registry: Registry::with_defaults(),
            options: Options::default(),
            formatter: None,
        }
    }

    /// The element-type registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The ambient option defaults.
    pub fn options(&self) -> Options {
        self.options
    }

    /// The formatter collaborator, if installed.
    pub fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.clone()
    }

    /// Build a live element tree from a schema.
    ///
    /// Resolves the root through the registry, then runs the
    /// post-construction pass: declared initial values are applied (with
    /// silent validation) and `created` is emitted bottom-up.
    pub async fn create(
        self: &Arc<Self>,
        schema: impl Into<ElementSchema>,
    ) -> Result<ElementNode, SchemaError> {
        let schema = schema.into();
        debug!(
            "creating {} element {:?}",
            schema.form_type(),
            schema.form_id()
        );
        let node = self.registry.build(schema, None, self)?;
        node.init().await;
        Ok(node)
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    registry: Registry,
    options: Options,
    formatter: Option<Arc<dyn Formatter>>,
}

impl ConfigBuilder {
    /// Replace the registry wholesale.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Register an element type on top of the current registry.
    pub fn register(mut self, form_type: impl Into<String>, builder: ElementBuilder) -> Self {
        self.registry.register(form_type, builder);
        self
    }

    /// Set the ambient `silent` default.
    pub fn silent(mut self, silent: bool) -> Self {
        self.options.silent = silent;
        self
    }

    /// Install the formatter collaborator.
    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> Arc<Config> {
        Arc::new(Config {
            registry: self.registry,
            options: self.options,
            formatter: self.formatter,
        })
    }
}
