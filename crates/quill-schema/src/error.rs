//! Schema loading errors.

use thiserror::Error;

/// Errors raised while loading or resolving a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse schema: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate type name: {0}")]
    DuplicateType(String),

    #[error("duplicate field {field} in {message}")]
    DuplicateField { message: String, field: String },

    #[error("duplicate field number {number} in {message}")]
    DuplicateNumber { message: String, number: i32 },

    #[error("{field}: field numbers must be positive, got {number}")]
    InvalidNumber { field: String, number: i32 },

    #[error("{field}: {kind} fields need a type_name")]
    MissingTypeName { field: String, kind: &'static str },

    #[error("{field}: unresolved type {name}")]
    UnresolvedType { field: String, name: String },

    #[error("{field}: numeric_as_text only applies to int64 fields")]
    NumericAsText { field: String },

    #[error("{field}: repeated fields cannot be oneof members")]
    RepeatedOneof { field: String },

    #[error("{field}: extensions cannot be oneof members")]
    ExtensionOneof { field: String },

    #[error("{field}: invalid default: {reason}")]
    InvalidDefault { field: String, reason: String },

    #[error("{field}: {message} is not extendable")]
    NotExtendable { field: String, message: String },

    #[error("enum {0} declares no values")]
    EmptyEnum(String),
}
