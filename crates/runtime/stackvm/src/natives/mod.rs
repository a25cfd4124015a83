//! Native method implementations, dispatched on the owner type.
//!
//! Each group returns `Ok(None)` when it does not know the method, which
//! surfaces as [`Fault::UnknownMethod`].

mod boxed;
mod message;
mod support;

use crate::error::Fault;
use crate::machine::Machine;
use crate::value::{Object, Value};
use rhizome_quill_ir::{MethodRef, RefType};

/// One native call with its operands already popped.
pub(crate) struct Call<'a> {
    pub(crate) method: &'a MethodRef,
    pub(crate) receiver: Option<Value>,
    pub(crate) args: Vec<Value>,
}

impl Call<'_> {
    pub(crate) fn name(&self) -> &str {
        &self.method.name
    }

    pub(crate) fn describe(&self) -> String {
        self.method.to_string()
    }

    pub(crate) fn receiver(&self) -> Result<&Value, Fault> {
        self.receiver
            .as_ref()
            .ok_or_else(|| Fault::NullPointer(self.describe()))
    }

    pub(crate) fn receiver_object(&self) -> Result<&Object, Fault> {
        self.receiver()?
            .as_object()
            .ok_or_else(|| Fault::ClassCast {
                expected: self.method.owner.to_string(),
                found: self.receiver.as_ref().map(Value::describe).unwrap_or_default(),
            })
    }

    pub(crate) fn arg(&self, idx: usize) -> Result<&Value, Fault> {
        self.args
            .get(idx)
            .ok_or_else(|| Fault::StackUnderflow(self.describe()))
    }

    /// Argument that must be a non-null object.
    pub(crate) fn object_arg(&self, idx: usize) -> Result<&Object, Fault> {
        let value = self.arg(idx)?;
        value
            .as_object()
            .ok_or_else(|| match value {
                Value::Null => Fault::NullPointer(self.describe()),
                other => Fault::BadOperand {
                    op: self.describe(),
                    expected: "object".to_string(),
                    found: other.describe(),
                },
            })
    }

    pub(crate) fn text_arg(&self, idx: usize) -> Result<&str, Fault> {
        match self.object_arg(idx)? {
            Object::Text(s) => Ok(s),
            other => Err(self.cast_error("Text", other)),
        }
    }

    pub(crate) fn cast_error(&self, expected: &str, found: &Object) -> Fault {
        Fault::ClassCast {
            expected: expected.to_string(),
            found: found.type_name(),
        }
    }

    pub(crate) fn bad_operand(&self, expected: &str, found: &Value) -> Fault {
        Fault::BadOperand {
            op: self.describe(),
            expected: expected.to_string(),
            found: found.describe(),
        }
    }
}

pub(crate) fn invoke(machine: &mut Machine<'_>, call: Call<'_>) -> Result<Value, Fault> {
    let result = match &call.method.owner {
        RefType::Message(name) => message::call_message(machine, name, &call)?,
        RefType::Builder(name) => message::call_builder(machine, name, &call)?,
        RefType::ExtendableMessage => message::call_extendable_message(machine, &call)?,
        RefType::ExtendableBuilder => message::call_extendable_builder(machine, &call)?,
        RefType::Enum(name) => message::call_enum(machine, name, &call)?,
        RefType::OneofCase(_) => message::call_oneof_case(&call)?,
        RefType::Boxed(kind) => boxed::call(machine, *kind, &call)?,
        RefType::Provider => boxed::call_provider(&call)?,
        _ => support::call(&call)?,
    };
    result.ok_or_else(|| Fault::UnknownMethod(call.describe()))
}
