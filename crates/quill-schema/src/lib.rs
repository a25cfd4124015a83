//! Message schema model for Quill.
//!
//! Descriptors are loaded from a TOML description and resolved once; the
//! generators and the runtime only ever borrow them.

mod descriptor;
mod error;
mod load;
pub mod naming;
mod sanitized;
mod schema;

pub use descriptor::{
    DefaultValue, EnumDescriptor, EnumValue, ExtensionScope, FieldDescriptor, FieldKind, Label,
    MessageDescriptor, Revision,
};
pub use error::SchemaError;
pub use sanitized::{SANITIZED_PACKAGE, SanitizedKind};
pub use schema::Schema;
