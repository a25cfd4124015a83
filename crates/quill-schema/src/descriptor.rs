//! Resolved schema descriptors.

use crate::sanitized::SanitizedKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presence-semantics regime a definition was declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    /// Strict presence: every singular field tracks whether it was set.
    #[default]
    Legacy,
    /// Implicit defaults: only message fields track presence.
    Modern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    #[default]
    Singular,
    Repeated,
}

/// Declared kind of a field. Enum and message kinds carry the full name of
/// the referenced type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Text,
    Bytes,
    Enum(String),
    Message(String),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
            FieldKind::Text => "text",
            FieldKind::Bytes => "bytes",
            FieldKind::Enum(_) => "enum",
            FieldKind::Message(_) => "message",
        }
    }
}

/// Explicit default of a singular scalar field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Text, or the raw bytes of a bytes field.
    Text(String),
    /// Enum default, already resolved to its number.
    Enum(i32),
}

/// Where an extension identifier is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionScope {
    /// Nested in a message; the identifier is a static of that message.
    Message(String),
    /// Top level; the identifier lives on the file's extension holder.
    File(String),
}

impl ExtensionScope {
    /// Full name of the type owning the identifier.
    pub fn owner(&self) -> &str {
        match self {
            ExtensionScope::Message(name) | ExtensionScope::File(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: i32,
    pub kind: FieldKind,
    pub label: Label,
    pub revision: Revision,
    /// Message the field belongs to (the extendee for extensions).
    pub containing_type: String,
    pub oneof: Option<String>,
    pub default: Option<DefaultValue>,
    /// 64-bit values travel as decimal text.
    pub numeric_as_text: bool,
    pub extension: Option<ExtensionScope>,
}

impl FieldDescriptor {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.containing_type, self.name)
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_extension(&self) -> bool {
        self.extension.is_some()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Modern enum fields are accessed through their raw numbers.
    pub fn is_modern_enum(&self) -> bool {
        matches!(self.kind, FieldKind::Enum(_)) && self.revision == Revision::Modern
    }

    /// Content kind when the field holds a sanitized-content wrapper.
    pub fn sanitized_kind(&self) -> Option<SanitizedKind> {
        match &self.kind {
            FieldKind::Message(name) => SanitizedKind::from_message(name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub full_name: String,
    pub revision: Revision,
    pub extendable: bool,
    /// Declared fields in schema order.
    pub fields: Vec<FieldDescriptor>,
    /// Oneof names in order of first appearance.
    pub oneofs: Vec<String>,
}

impl MessageDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_by_number(&self, number: i32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.number == number)
    }

    /// Members of `oneof`, in declaration order.
    pub fn oneof_members<'a>(&'a self, oneof: &'a str) -> impl Iterator<Item = &'a FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |field| field.oneof.as_deref() == Some(oneof))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub full_name: String,
    pub revision: Revision,
    /// Never empty; the first value is the legacy default.
    pub values: Vec<EnumValue>,
}

impl EnumDescriptor {
    pub fn value_by_number(&self, number: i32) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.number == number)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.name == name)
    }

    /// Number an unset field of this enum reads as.
    pub fn default_number(&self) -> i32 {
        match self.revision {
            Revision::Legacy => self.values.first().map_or(0, |value| value.number),
            Revision::Modern => 0,
        }
    }
}
