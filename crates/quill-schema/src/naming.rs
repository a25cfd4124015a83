//! Names of the generated message and builder operations.
//!
//! Generators emit calls by these names and the runtime resolves them back
//! to fields, so both directions live here.

use crate::descriptor::{FieldDescriptor, MessageDescriptor};

pub const NEW_BUILDER: &str = "new_builder";
pub const DEFAULT_INSTANCE: &str = "default_instance";
pub const BUILD: &str = "build";

fn value_suffix(field: &FieldDescriptor) -> &'static str {
    if field.is_modern_enum() { "_value" } else { "" }
}

/// `get_<f>`, or `get_<f>_value` for modern enums.
pub fn getter(field: &FieldDescriptor) -> String {
    format!("get_{}{}", field.name, value_suffix(field))
}

pub fn hasser(field: &FieldDescriptor) -> String {
    format!("has_{}", field.name)
}

/// Discriminant getter of a oneof.
pub fn case_getter(oneof: &str) -> String {
    format!("get_{}_case", oneof)
}

/// `set_<f>` for singular fields, `add_<f>` for repeated ones.
pub fn setter(field: &FieldDescriptor) -> String {
    let prefix = if field.is_repeated() { "add" } else { "set" };
    format!("{}_{}{}", prefix, field.name, value_suffix(field))
}

/// An instance operation on a generated message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageMethod<'a> {
    Get(&'a FieldDescriptor),
    Has(&'a FieldDescriptor),
    Case(&'a str),
}

/// An instance operation on a generated builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuilderMethod<'a> {
    Set(&'a FieldDescriptor),
    Add(&'a FieldDescriptor),
    Build,
}

pub fn resolve_message_method<'a>(
    message: &'a MessageDescriptor,
    name: &str,
) -> Option<MessageMethod<'a>> {
    if let Some(oneof) = message.oneofs.iter().find(|o| case_getter(o) == name) {
        return Some(MessageMethod::Case(oneof));
    }
    message.fields.iter().find_map(|field| {
        if getter(field) == name {
            Some(MessageMethod::Get(field))
        } else if hasser(field) == name {
            Some(MessageMethod::Has(field))
        } else {
            None
        }
    })
}

pub fn resolve_builder_method<'a>(
    message: &'a MessageDescriptor,
    name: &str,
) -> Option<BuilderMethod<'a>> {
    if name == BUILD {
        return Some(BuilderMethod::Build);
    }
    message
        .fields
        .iter()
        .find(|field| setter(field) == name)
        .map(|field| {
            if field.is_repeated() {
                BuilderMethod::Add(field)
            } else {
                BuilderMethod::Set(field)
            }
        })
}
