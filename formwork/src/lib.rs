//! Schema-driven hierarchical form validation.
//!
//! A declarative schema of fields, groups and repeatable collections builds
//! a live tree of stateful elements that cast raw input to typed values,
//! run cascading validation rules, aggregate child validity and value into
//! parents, and emit lifecycle events on every transition.

pub mod config;
pub mod element;
pub mod error;
pub mod event;
pub mod pending;
pub mod props;
pub mod schema;
pub mod validation;
pub mod value;

pub mod prelude {
    //! The types most schemas and trees touch.

    pub use crate::config::{Config, Formatter, Options};
    pub use crate::element::{Collection, ElementNode, Field, Group, Registry, SetListOptions};
    pub use crate::error::SchemaError;
    pub use crate::event::{Callback, Event, EventData, EventName};
    pub use crate::schema::{
        CollectionSchema, ElementSchema, FieldSchema, FieldType, GroupSchema, ItemSchema,
        Message, RuleSchema, TypeTag,
    };
    pub use crate::validation::{Rule, ValidateOptions, Validation, Verdict};
    pub use crate::value::Value;
}
