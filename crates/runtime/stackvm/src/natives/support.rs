//! Runtime library: wrappers, byte strings, the base64 codec and lists.

use super::Call;
use crate::error::Fault;
use crate::value::{Boxed, Object, Value};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rhizome_quill_ir::{NativeType, RefType};
use std::cell::RefCell;

fn list(items: Vec<Value>) -> Value {
    Value::object(Object::List(RefCell::new(items)))
}

fn bytes_arg<'c>(call: &'c Call<'_>, idx: usize) -> Result<&'c [u8], Fault> {
    match call.object_arg(idx)? {
        Object::ByteArray(bytes) | Object::ByteString(bytes) => Ok(bytes),
        other => Err(call.cast_error("byte[]", other)),
    }
}

fn list_arg<'c>(call: &'c Call<'_>, idx: usize) -> Result<&'c RefCell<Vec<Value>>, Fault> {
    match call.object_arg(idx)? {
        Object::List(items) => Ok(items),
        other => Err(call.cast_error("List", other)),
    }
}

fn int_arg(call: &Call<'_>, idx: usize) -> Result<i32, Fault> {
    match call.arg(idx)? {
        Value::Int(n) => Ok(*n),
        other => Err(call.bad_operand("int", other)),
    }
}

fn call_wrapper(prim: &NativeType, call: &Call<'_>) -> Result<Option<Value>, Fault> {
    let result = match (prim, call.name()) {
        (NativeType::Long, "to_string") => match call.arg(0)? {
            Value::Long(n) => Value::text(n.to_string()),
            other => return Err(call.bad_operand("long", other)),
        },
        (NativeType::Long, "parse") => {
            let text = call.text_arg(0)?;
            let n = text
                .parse::<i64>()
                .map_err(|_| Fault::NumberFormat(text.to_string()))?;
            Value::Long(n)
        }
        (NativeType::Bool, "boolean_value") => {
            let receiver = call.receiver()?;
            Value::Bool(
                receiver
                    .as_bool()
                    .ok_or_else(|| call.bad_operand("Wrapper<bool>", receiver))?,
            )
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_number(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    let receiver = call.receiver()?;
    let result = match call.name() {
        "long_value" => Value::Long(
            receiver
                .as_long()
                .ok_or_else(|| call.bad_operand("Number", receiver))?,
        ),
        "double_value" => Value::Double(
            receiver
                .as_double()
                .or_else(|| receiver.as_long().map(|n| n as f64))
                .ok_or_else(|| call.bad_operand("Number", receiver))?,
        ),
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_object(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    if call.name() != "to_string" {
        return Ok(None);
    }
    let text = match call.receiver_object()? {
        Object::Text(s) => s.clone(),
        Object::Boxed(Boxed::Text(s)) => s.clone(),
        other => other.to_string(),
    };
    Ok(Some(Value::text(text)))
}

fn call_byte_string(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    let result = match call.name() {
        "copy_from" => Value::object(Object::ByteString(bytes_arg(call, 0)?.to_vec())),
        "to_byte_array" => match call.receiver_object()? {
            Object::ByteString(bytes) => Value::object(Object::ByteArray(bytes.clone())),
            other => return Err(call.cast_error("ByteString", other)),
        },
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_codec(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    let result = match call.name() {
        "base64" => Value::object(Object::Codec),
        "encode" => Value::text(STANDARD.encode(bytes_arg(call, 0)?)),
        "decode" => {
            let text = call.text_arg(0)?;
            let bytes = STANDARD
                .decode(text)
                .map_err(|err| Fault::IllegalArgument(format!("bad base64 {:?}: {}", text, err)))?;
            Value::object(Object::ByteArray(bytes))
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_list(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    let items = match call.receiver_object()? {
        Object::List(items) => items,
        other => return Err(call.cast_error("List", other)),
    };
    let result = match call.name() {
        "size" => Value::Int(i32::try_from(items.borrow().len()).unwrap_or(i32::MAX)),
        "get" => {
            let idx = int_arg(call, 0)?;
            let items = items.borrow();
            usize::try_from(idx)
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .ok_or_else(|| {
                    Fault::IllegalArgument(format!(
                        "index {} out of bounds for length {}",
                        idx,
                        items.len()
                    ))
                })?
        }
        "add" => {
            items.borrow_mut().push(call.arg(0)?.clone());
            Value::Bool(true)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn call_runtime(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    let result = match call.name() {
        "new_list" => list(Vec::new()),
        "provider" => Value::object(Object::Provider(call.arg(0)?.clone())),
        "resolve_all" => {
            let resolved = list_arg(call, 0)?
                .borrow()
                .iter()
                .map(|item| match item.as_object() {
                    Some(Object::Provider(inner)) => inner.clone(),
                    _ => item.clone(),
                })
                .collect();
            list(resolved)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

pub(super) fn call(call: &Call<'_>) -> Result<Option<Value>, Fault> {
    match &call.method.owner {
        RefType::Wrapper(prim) => call_wrapper(prim, call),
        RefType::Number => call_number(call),
        RefType::Object => call_object(call),
        RefType::ByteString => call_byte_string(call),
        RefType::Codec => call_codec(call),
        RefType::List => call_list(call),
        RefType::Runtime => call_runtime(call),
        _ => Ok(None),
    }
}
