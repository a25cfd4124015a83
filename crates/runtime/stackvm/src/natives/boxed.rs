//! Host-evaluator values: boxing, unboxing and field lookup by name.

use super::Call;
use super::message::boxed_field;
use crate::error::Fault;
use crate::machine::Machine;
use crate::value::{Boxed, FieldValue, MessageData, Object, Value};
use rhizome_quill_ir::BoxedKind;
use rhizome_quill_schema::SanitizedKind;
use std::cell::RefCell;

fn boxed(value: Boxed) -> Value {
    Value::object(Object::Boxed(value))
}

fn for_value(kind: BoxedKind, call: &Call<'_>) -> Result<Value, Fault> {
    let arg = call.arg(0)?;
    let result = match (kind, arg) {
        (BoxedKind::Bool, Value::Bool(b)) => Boxed::Bool(*b),
        (BoxedKind::Int, Value::Long(n)) => Boxed::Int(*n),
        (BoxedKind::Float, Value::Double(x)) => Boxed::Float(*x),
        (_, Value::Null) => return Err(Fault::NullPointer(call.describe())),
        (BoxedKind::Text, _) => Boxed::Text(call.text_arg(0)?.to_string()),
        (BoxedKind::Proto, _) => match call.object_arg(0)? {
            Object::Message(_) => Boxed::Proto(arg.clone()),
            other => return Err(call.cast_error("Message", other)),
        },
        (BoxedKind::List, _) => match call.object_arg(0)? {
            Object::List(items) => Boxed::List(items.borrow().clone()),
            other => return Err(call.cast_error("List", other)),
        },
        _ => return Err(call.bad_operand(kind.name(), arg)),
    };
    Ok(boxed(result))
}

fn ordain(call: &Call<'_>) -> Result<Value, Fault> {
    let content = call.text_arg(0)?.to_string();
    let kind = match call.arg(1)? {
        Value::Int(ordinal) => SanitizedKind::from_ordinal(*ordinal).ok_or_else(|| {
            Fault::IllegalArgument(format!("no sanitized kind with ordinal {}", ordinal))
        })?,
        other => return Err(call.bad_operand("int", other)),
    };
    Ok(boxed(Boxed::Sanitized { kind, content }))
}

/// Builds the wrapper message for a sanitized value.
fn to_safe_proto(machine: &Machine<'_>, call: &Call<'_>, boxed: &Boxed) -> Result<Option<Value>, Fault> {
    let Boxed::Sanitized { kind, content } = boxed else {
        return Err(call.cast_error("SanitizedContent", call.receiver_object()?));
    };
    let Some(target) = SanitizedKind::ALL
        .into_iter()
        .find(|k| k.to_proto_method() == call.name())
    else {
        return Ok(None);
    };
    if target != *kind {
        return Err(Fault::IllegalArgument(format!(
            "{} content cannot become {}",
            kind,
            target.message_name()
        )));
    }
    let type_name = target.message_name();
    if machine.schema().message(&type_name).is_none() {
        return Err(Fault::UnknownMethod(call.describe()));
    }
    let mut data = MessageData::new(type_name);
    data.set(
        1,
        &target.wrapped_field(),
        FieldValue::Single(Value::text(content.clone())),
    );
    Ok(Some(Value::object(Object::Message(data))))
}

pub(super) fn call(
    machine: &mut Machine<'_>,
    kind: BoxedKind,
    call: &Call<'_>,
) -> Result<Option<Value>, Fault> {
    if call.method.is_static() {
        return match call.name() {
            "for_value" => for_value(kind, call).map(Some),
            "ordain" if kind == BoxedKind::Sanitized => ordain(call).map(Some),
            _ => Ok(None),
        };
    }

    let receiver = call.receiver_object()?;
    let Object::Boxed(value) = receiver else {
        return Err(call.cast_error(kind.name(), receiver));
    };
    let mismatch = || call.cast_error(call.name(), receiver);
    let result = match call.name() {
        "boolean_value" => match value {
            Boxed::Bool(b) => Value::Bool(*b),
            _ => return Err(mismatch()),
        },
        "long_value" => match value {
            Boxed::Int(n) => Value::Long(*n),
            _ => return Err(mismatch()),
        },
        "float_value" => match value {
            Boxed::Float(x) => Value::Double(*x),
            Boxed::Int(n) => Value::Double(*n as f64),
            _ => return Err(mismatch()),
        },
        "string_value" => match value {
            Boxed::Text(s) | Boxed::Sanitized { content: s, .. } => Value::text(s.clone()),
            _ => return Err(mismatch()),
        },
        "get_proto" => match value {
            Boxed::Proto(inner) => inner.clone(),
            _ => return Err(mismatch()),
        },
        "get_field" => {
            let name = call.text_arg(0)?;
            match value {
                Boxed::Proto(inner) => {
                    let data = inner.as_message().ok_or_else(mismatch)?;
                    boxed_field(machine, data, name)?
                }
                _ => return Err(mismatch()),
            }
        }
        "as_list" => match value {
            Boxed::List(items) => Value::object(Object::List(RefCell::new(items.clone()))),
            _ => return Err(mismatch()),
        },
        _ => return to_safe_proto(machine, call, value),
    };
    Ok(Some(result))
}

/// `resolve` on a deferred value; host values resolve to themselves.
pub(super) fn call_provider(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    if call.name() != "resolve" {
        return Ok(None);
    }
    let receiver = call.receiver()?;
    match call.receiver_object()? {
        Object::Provider(inner) => Ok(Some(inner.clone())),
        Object::Boxed(_) => Ok(Some(receiver.clone())),
        other => Err(call.cast_error("Provider", other)),
    }
}
