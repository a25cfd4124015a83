//! Type-directed code generation for message fields.
//!
//! Two generators, both driven by a [`Schema`]:
//!
//! - [`generate_field_access`] reads one field of a message value and
//!   yields its logical value, or null when a checked field is unset.
//! - [`generate_message_construction`] builds a message from named
//!   arguments.
//!
//! Values flow in and out as [`TypedValue`]s: instruction sequences paired
//! with the logical type the expression language sees. The per-field rules
//! (storage, native and logical representations, presence checks) live in
//! [`Coercion`] and [`FieldShape`].

mod access;
mod coerce;
mod construct;
mod error;
mod methods;
mod resolver;
mod shape;
mod value;

pub use access::generate_field_access;
pub use coerce::Coercion;
pub use construct::generate_message_construction;
pub use error::CodegenError;
pub use resolver::{ImmediateResolver, ListResolver};
pub use shape::{FieldShape, PresencePolicy, PresenceTest};
pub use value::{TypedValue, ValueType};

use rhizome_quill_schema::Schema;

/// Generators bound to one schema and list resolver.
pub struct Codegen<'s, R: ListResolver = ImmediateResolver> {
    schema: &'s Schema,
    resolver: R,
}

impl<'s> Codegen<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            resolver: ImmediateResolver,
        }
    }
}

impl<'s, R: ListResolver> Codegen<'s, R> {
    pub fn with_resolver(schema: &'s Schema, resolver: R) -> Self {
        Self { schema, resolver }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Reads `field` of `base`, a `message` value.
    pub fn field_access(
        &self,
        message: &str,
        base: TypedValue,
        field: &str,
    ) -> Result<TypedValue, CodegenError> {
        generate_field_access(self.schema, message, base, field)
    }

    /// Constructs `message` from `(field, value)` arguments.
    pub fn construct(
        &self,
        message: &str,
        args: Vec<(String, TypedValue)>,
    ) -> Result<TypedValue, CodegenError> {
        generate_message_construction(self.schema, message, args, &self.resolver)
    }
}
