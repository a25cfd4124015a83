//! The resolved schema and its lookups.

use crate::descriptor::{EnumDescriptor, EnumValue, FieldDescriptor, MessageDescriptor};
use crate::error::SchemaError;
use crate::load::SchemaFile;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Every message, enum and extension known to the generators.
///
/// Built-in sanitized-content wrapper messages are always present.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) messages: BTreeMap<String, MessageDescriptor>,
    pub(crate) enums: BTreeMap<String, EnumDescriptor>,
    pub(crate) extensions: Vec<FieldDescriptor>,
}

impl Schema {
    /// Load a schema from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and resolve a TOML schema description.
    pub fn from_toml_str(contents: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(contents)?;
        let schema = file.resolve()?;
        tracing::debug!(
            messages = schema.messages.len(),
            enums = schema.enums.len(),
            extensions = schema.extensions.len(),
            "loaded schema"
        );
        Ok(schema)
    }

    pub fn message(&self, full_name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(full_name)
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.values()
    }

    pub fn enum_type(&self, full_name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(full_name)
    }

    /// Declared values of an enum, in declaration order.
    pub fn enum_values(&self, full_name: &str) -> Option<&[EnumValue]> {
        self.enums.get(full_name).map(|desc| desc.values.as_slice())
    }

    /// Looks a field up by name: declared fields first, then extensions
    /// of the message.
    pub fn field(&self, message: &str, name: &str) -> Option<&FieldDescriptor> {
        self.messages
            .get(message)
            .and_then(|desc| desc.field(name))
            .or_else(|| {
                self.extensions
                    .iter()
                    .find(|field| field.containing_type == message && field.name == name)
            })
    }

    /// Extensions whose extendee is `message`.
    pub fn extensions_of<'a>(
        &'a self,
        message: &'a str,
    ) -> impl Iterator<Item = &'a FieldDescriptor> {
        self.extensions
            .iter()
            .filter(move |field| field.containing_type == message)
    }

    pub fn extensions(&self) -> &[FieldDescriptor] {
        &self.extensions
    }

    /// Finds the extension whose identifier is the static `name` on `owner`.
    pub fn extension_by_id(&self, owner: &str, name: &str) -> Option<&FieldDescriptor> {
        self.extensions.iter().find(|field| {
            field.name == name
                && field
                    .extension
                    .as_ref()
                    .is_some_and(|scope| scope.owner() == owner)
        })
    }
}
