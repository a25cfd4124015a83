//! Generated message, builder and enum operations.
//!
//! Slots store one canonical form per kind: primitives as themselves,
//! enums as their number, text, bytes and messages as objects.

use super::Call;
use crate::error::Fault;
use crate::machine::Machine;
use crate::value::{Boxed, FieldValue, MessageData, Object, Value};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rhizome_quill_schema::naming::{self, BuilderMethod, MessageMethod};
use rhizome_quill_schema::{DefaultValue, FieldDescriptor, FieldKind, Schema};
use std::cell::RefCell;

/// Storage value an unset field reads as.
fn default_storage(machine: &mut Machine<'_>, field: &FieldDescriptor) -> Result<Value, Fault> {
    let default = field.default.as_ref();
    Ok(match &field.kind {
        FieldKind::Bool => Value::Bool(matches!(default, Some(DefaultValue::Bool(true)))),
        FieldKind::Int32 => Value::Int(match default {
            Some(DefaultValue::Int(n)) => *n as i32,
            _ => 0,
        }),
        FieldKind::Int64 => Value::Long(match default {
            Some(DefaultValue::Int(n)) => *n,
            _ => 0,
        }),
        FieldKind::Float => Value::Float(match default {
            Some(DefaultValue::Float(x)) => *x as f32,
            _ => 0.0,
        }),
        FieldKind::Double => Value::Double(match default {
            Some(DefaultValue::Float(x)) => *x,
            _ => 0.0,
        }),
        FieldKind::Text => Value::text(match default {
            Some(DefaultValue::Text(s)) => s.clone(),
            _ => String::new(),
        }),
        FieldKind::Bytes => Value::object(Object::ByteString(match default {
            Some(DefaultValue::Text(s)) => s.as_bytes().to_vec(),
            _ => Vec::new(),
        })),
        FieldKind::Enum(name) => Value::Int(match default {
            Some(DefaultValue::Enum(n)) => *n,
            _ if field.is_modern_enum() => 0,
            _ => machine
                .schema()
                .enum_type(name)
                .map_or(0, |desc| desc.default_number()),
        }),
        FieldKind::Message(name) => machine.default_instance(name)?,
    })
}

fn enum_const(field: &FieldDescriptor, number: &Value) -> Value {
    match (&field.kind, number) {
        (FieldKind::Enum(name), Value::Int(n)) => Value::object(Object::EnumConst {
            enum_name: name.clone(),
            number: *n,
        }),
        _ => number.clone(),
    }
}

/// Value returned by the generated getter.
fn getter_view(field: &FieldDescriptor, stored: &Value) -> Value {
    if field.is_modern_enum() {
        stored.clone()
    } else {
        enum_const(field, stored)
    }
}

/// Value returned by `get_extension`: primitives are wrapped.
fn extension_view(field: &FieldDescriptor, stored: &Value) -> Value {
    match (&field.kind, stored) {
        (FieldKind::Enum(_), _) if !field.is_modern_enum() => enum_const(field, stored),
        (_, Value::Ref(_) | Value::Null) => stored.clone(),
        _ => Value::object(Object::Wrapper(stored.clone())),
    }
}

/// Checks a setter operand against the field and converts it to storage.
fn to_storage(call: &Call<'_>, field: &FieldDescriptor, value: &Value) -> Result<Value, Fault> {
    let ok = match (&field.kind, value) {
        (_, Value::Null) => return Err(Fault::NullPointer(call.describe())),
        (FieldKind::Bool, Value::Bool(_))
        | (FieldKind::Int32, Value::Int(_))
        | (FieldKind::Int64, Value::Long(_))
        | (FieldKind::Float, Value::Float(_))
        | (FieldKind::Double, Value::Double(_)) => true,
        (FieldKind::Enum(_), Value::Int(_)) => field.is_modern_enum(),
        (FieldKind::Enum(name), Value::Ref(obj)) => match obj.as_ref() {
            Object::EnumConst { enum_name, number } if enum_name == name => {
                return Ok(Value::Int(*number));
            }
            _ => false,
        },
        (FieldKind::Text, Value::Ref(obj)) => matches!(obj.as_ref(), Object::Text(_)),
        (FieldKind::Bytes, Value::Ref(obj)) => matches!(obj.as_ref(), Object::ByteString(_)),
        (FieldKind::Message(name), Value::Ref(obj)) => {
            matches!(obj.as_ref(), Object::Message(data) if data.type_name() == name)
        }
        _ => false,
    };
    if ok {
        Ok(value.clone())
    } else {
        Err(Fault::ClassCast {
            expected: field.kind.name().to_string(),
            found: value.describe(),
        })
    }
}

/// Unwraps an extension object passed to `set_extension`.
fn extension_storage(call: &Call<'_>, field: &FieldDescriptor, value: &Value) -> Result<Value, Fault> {
    match value.as_object() {
        Some(Object::Wrapper(inner)) => to_storage(call, field, inner),
        _ => to_storage(call, field, value),
    }
}

fn read_field(
    machine: &mut Machine<'_>,
    data: &MessageData,
    field: &FieldDescriptor,
) -> Result<Value, Fault> {
    match data.get(field.number) {
        Some(FieldValue::Single(stored)) => Ok(getter_view(field, stored)),
        Some(FieldValue::Repeated(items)) => Ok(Value::object(Object::List(RefCell::new(
            items.iter().map(|item| getter_view(field, item)).collect(),
        )))),
        None if field.is_repeated() => Ok(Value::object(Object::List(RefCell::new(Vec::new())))),
        None => {
            let stored = default_storage(machine, field)?;
            Ok(getter_view(field, &stored))
        }
    }
}

fn message_data<'c>(call: &'c Call<'_>, type_name: &str) -> Result<&'c MessageData, Fault> {
    match call.receiver_object()? {
        Object::Message(data) if data.type_name() == type_name => Ok(data),
        other => Err(call.cast_error(type_name, other)),
    }
}

fn builder_data<'c>(call: &'c Call<'_>) -> Result<&'c RefCell<MessageData>, Fault> {
    match call.receiver_object()? {
        Object::Builder(data) => Ok(data),
        other => Err(call.cast_error("Builder", other)),
    }
}

pub(super) fn call_message(
    machine: &mut Machine<'_>,
    type_name: &str,
    call: &Call<'_>,
) -> Result<Option<Value>, Fault> {
    let schema = machine.schema();
    let Some(desc) = schema.message(type_name) else {
        return Ok(None);
    };
    if call.method.is_static() {
        return match call.name() {
            naming::DEFAULT_INSTANCE => machine.default_instance(type_name).map(Some),
            naming::NEW_BUILDER => Ok(Some(Value::object(Object::Builder(RefCell::new(
                MessageData::new(type_name),
            ))))),
            _ => Ok(None),
        };
    }

    let data = message_data(call, type_name)?;
    let Some(method) = naming::resolve_message_method(desc, call.name()) else {
        return Ok(None);
    };
    let result = match method {
        MessageMethod::Get(field) => read_field(machine, data, field)?,
        MessageMethod::Has(field) => Value::Bool(data.is_set(field.number)),
        MessageMethod::Case(oneof) => {
            let number = desc
                .oneof_members(oneof)
                .find(|member| data.is_set(member.number))
                .map_or(0, |member| member.number);
            Value::object(Object::OneofCase {
                key: format!("{}.{}", type_name, oneof),
                number,
            })
        }
    };
    Ok(Some(result))
}

pub(super) fn call_builder(
    machine: &mut Machine<'_>,
    type_name: &str,
    call: &Call<'_>,
) -> Result<Option<Value>, Fault> {
    let schema = machine.schema();
    let Some(desc) = schema.message(type_name) else {
        return Ok(None);
    };
    let cell = builder_data(call)?;
    if cell.borrow().type_name() != type_name {
        return Err(call.cast_error(&format!("{}$Builder", type_name), call.receiver_object()?));
    }
    let Some(method) = naming::resolve_builder_method(desc, call.name()) else {
        return Ok(None);
    };
    match method {
        BuilderMethod::Build => {
            let data = cell.borrow().clone();
            return Ok(Some(Value::object(Object::Message(data))));
        }
        BuilderMethod::Set(field) => {
            let stored = to_storage(call, field, call.arg(0)?)?;
            let mut data = cell.borrow_mut();
            if let Some(oneof) = &field.oneof {
                for member in desc.oneof_members(oneof) {
                    data.clear(member.number);
                }
            }
            data.set(field.number, &field.name, FieldValue::Single(stored));
        }
        BuilderMethod::Add(field) => {
            let stored = to_storage(call, field, call.arg(0)?)?;
            cell.borrow_mut().push(field.number, &field.name, stored);
        }
    }
    Ok(Some(call.receiver()?.clone()))
}

/// Resolves an extension identifier argument against the receiver's type.
fn extension_arg<'s>(
    schema: &'s Schema,
    call: &Call<'_>,
    receiver_type: &str,
) -> Result<&'s FieldDescriptor, Fault> {
    let (owner, name) = match call.object_arg(0)? {
        Object::Extension { owner, name } => (owner, name),
        other => return Err(call.cast_error("Extension", other)),
    };
    let field = schema
        .extension_by_id(owner, name)
        .ok_or_else(|| Fault::UnknownField(format!("{}.{}", owner, name)))?;
    if field.containing_type != receiver_type {
        return Err(Fault::IllegalArgument(format!(
            "extension {} does not extend {}",
            field.full_name(),
            receiver_type
        )));
    }
    Ok(field)
}

pub(super) fn call_extendable_message(
    machine: &mut Machine<'_>,
    call: &Call<'_>,
) -> Result<Option<Value>, Fault> {
    let data = match call.receiver_object()? {
        Object::Message(data) => data,
        other => return Err(call.cast_error("ExtendableMessage", other)),
    };
    let field = extension_arg(machine.schema(), call, data.type_name())?;
    let result = match call.name() {
        "has_extension" => Value::Bool(data.is_set(field.number)),
        "get_extension" => match data.get(field.number) {
            Some(FieldValue::Single(stored)) => extension_view(field, stored),
            Some(FieldValue::Repeated(items)) => Value::object(Object::List(RefCell::new(
                items.iter().map(|item| extension_view(field, item)).collect(),
            ))),
            None if field.is_repeated() => Value::object(Object::List(RefCell::new(Vec::new()))),
            None => {
                let stored = default_storage(machine, field)?;
                extension_view(field, &stored)
            }
        },
        _ => return Ok(None),
    };
    Ok(Some(result))
}

pub(super) fn call_extendable_builder(
    machine: &mut Machine<'_>,
    call: &Call<'_>,
) -> Result<Option<Value>, Fault> {
    let cell = builder_data(call)?;
    let type_name = cell.borrow().type_name().to_string();
    let field = extension_arg(machine.schema(), call, &type_name)?;
    let stored = extension_storage(call, field, call.arg(1)?)?;
    match call.name() {
        "set_extension" => {
            cell.borrow_mut()
                .set(field.number, &field.name, FieldValue::Single(stored));
        }
        "add_extension" => cell.borrow_mut().push(field.number, &field.name, stored),
        _ => return Ok(None),
    }
    Ok(Some(call.receiver()?.clone()))
}

pub(super) fn call_enum(
    machine: &mut Machine<'_>,
    enum_name: &str,
    call: &Call<'_>,
) -> Result<Option<Value>, Fault> {
    let Some(desc) = machine.schema().enum_type(enum_name) else {
        return Ok(None);
    };
    match call.name() {
        // Unknown numbers yield null; the caller faults when it uses it.
        "for_number" => match call.arg(0)? {
            Value::Int(n) => Ok(Some(match desc.value_by_number(*n) {
                Some(value) => Value::object(Object::EnumConst {
                    enum_name: enum_name.to_string(),
                    number: value.number,
                }),
                None => Value::Null,
            })),
            other => Err(call.bad_operand("int", other)),
        },
        "get_number" => match call.receiver_object()? {
            Object::EnumConst { number, .. } => Ok(Some(Value::Int(*number))),
            other => Err(call.cast_error(enum_name, other)),
        },
        _ => Ok(None),
    }
}

pub(super) fn call_oneof_case(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    match (call.name(), call.receiver_object()?) {
        ("get_number", Object::OneofCase { number, .. }) => Ok(Some(Value::Int(*number))),
        ("get_number", other) => Err(call.cast_error("OneofCase", other)),
        _ => Ok(None),
    }
}

/// Text held by a sanitized-content wrapper message.
pub(super) fn wrapped_text(data: &MessageData) -> String {
    match data.get(1) {
        Some(FieldValue::Single(value)) => value.as_text().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

/// Host-evaluator view of a stored field value.
pub(super) fn to_boxed(field: &FieldDescriptor, stored: &Value) -> Value {
    let boxed = match (&field.kind, stored) {
        (_, Value::Null) => return Value::Null,
        (FieldKind::Int64, Value::Long(n)) if field.numeric_as_text => Boxed::Text(n.to_string()),
        (FieldKind::Bytes, Value::Ref(obj)) => match obj.as_ref() {
            Object::ByteString(bytes) => Boxed::Text(STANDARD.encode(bytes)),
            _ => return stored.clone(),
        },
        (FieldKind::Message(_), Value::Ref(obj)) => match (field.sanitized_kind(), obj.as_ref()) {
            (Some(kind), Object::Message(data)) => Boxed::Sanitized {
                kind,
                content: wrapped_text(data),
            },
            _ => Boxed::Proto(stored.clone()),
        },
        (_, Value::Bool(b)) => Boxed::Bool(*b),
        (_, Value::Int(_) | Value::Long(_)) => Boxed::Int(stored.as_long().unwrap_or_default()),
        (_, Value::Float(_) | Value::Double(_)) => {
            Boxed::Float(stored.as_double().unwrap_or_default())
        }
        (_, Value::Ref(obj)) => match obj.as_ref() {
            Object::Text(s) => Boxed::Text(s.clone()),
            Object::EnumConst { number, .. } => Boxed::Int((*number).into()),
            _ => return stored.clone(),
        },
    };
    Value::object(Object::Boxed(boxed))
}

/// `get_field` on a boxed message: repeated fields come back as a boxed
/// list, singular ones as a boxed value or null when unset.
pub(super) fn boxed_field(
    machine: &mut Machine<'_>,
    data: &MessageData,
    name: &str,
) -> Result<Value, Fault> {
    let field = machine
        .schema()
        .field(data.type_name(), name)
        .ok_or_else(|| Fault::UnknownField(format!("{}.{}", data.type_name(), name)))?;
    match data.get(field.number) {
        Some(FieldValue::Repeated(items)) => Ok(Value::object(Object::Boxed(Boxed::List(
            items.iter().map(|item| to_boxed(field, item)).collect(),
        )))),
        Some(FieldValue::Single(stored)) => Ok(to_boxed(field, stored)),
        None if field.is_repeated() => Ok(Value::object(Object::Boxed(Boxed::List(Vec::new())))),
        None if field.default.is_none() => Ok(Value::Null),
        None => {
            let stored = default_storage(machine, field)?;
            Ok(to_boxed(field, &stored))
        }
    }
}
