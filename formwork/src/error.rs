//! Structural error types.
//!
//! Structural errors are thrown synchronously by mutating operations
//! (construction, `add_field`, `add_group`, `set_value`) and always leave the
//! element tree unchanged. Validation failures are never represented as
//! errors; they live in rule/element state.

use thiserror::Error;

/// Error raised when a schema or a tree mutation is structurally invalid.
///
/// Every variant names the offending element where one exists, so failures
/// deep inside a nested schema stay diagnosable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A schema was declared without a `formId`.
    #[error("(formType: {form_type:?}) missing `formId` in schema")]
    MissingFormId {
        /// Discriminator of the schema that lacks an id.
        form_type: String,
    },

    /// No builder is registered for the schema's `formType` discriminator.
    #[error("(formId: {form_id:?}) unregistered form type {form_type:?}")]
    UnknownFormType {
        /// Declared id of the offending element.
        form_id: String,
        /// The unresolvable discriminator.
        form_type: String,
    },

    /// The registry has no builders at all.
    #[error("no form element types have been registered yet")]
    EmptyRegistry,

    /// A child with the same model already exists under this parent.
    #[error("(formId: {form_id:?}) duplicated child model {model:?}")]
    DuplicateChild {
        /// Id of the parent element.
        form_id: String,
        /// The colliding model key.
        model: String,
    },

    /// A rule with the same name already exists in this validation.
    #[error("duplicated rule {name:?}")]
    DuplicateRule {
        /// The colliding rule name.
        name: String,
    },

    /// A rule removal named a rule that is not present.
    #[error("rule {name:?} not found")]
    UnknownRule {
        /// The missing rule name.
        name: String,
    },

    /// A child removal named a child that is not present.
    #[error("(formId: {form_id:?}) child {target:?} not found")]
    UnknownChild {
        /// Id of the parent element.
        form_id: String,
        /// The missing child's model or id.
        target: String,
    },

    /// A group removal named an item index that is out of bounds.
    #[error("(formId: {form_id:?}) no item at index {index}")]
    UnknownItem {
        /// Id of the owning collection.
        form_id: String,
        /// The out-of-bounds index.
        index: usize,
    },

    /// A value of the wrong shape was handed to a composite element.
    #[error("(formId: {form_id:?}) invalid value, expected {expected}")]
    InvalidValue {
        /// Id of the element that rejected the value.
        form_id: String,
        /// Human-readable description of the expected shape.
        expected: &'static str,
    },
}
