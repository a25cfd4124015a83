//! Field accessor generation.
//!
//! Reading a field yields its logical value. Checked fields produce null
//! when the field is unset; every other read is never null.

use crate::coerce::Coercion;
use crate::error::CodegenError;
use crate::methods;
use crate::shape::{FieldShape, PresencePolicy, PresenceTest};
use crate::value::{TypedValue, ValueType, emit_box};
use rhizome_quill_ir::{BoxedKind, CodeBuilder, Constant, NativeType, RefType, Test};
use rhizome_quill_schema::{FieldDescriptor, Schema};

/// Generates code reading `field` of `base`, a value of message type
/// `message` in boxed or native form.
pub fn generate_field_access(
    schema: &Schema,
    message: &str,
    base: TypedValue,
    field: &str,
) -> Result<TypedValue, CodegenError> {
    if schema.message(message).is_none() {
        return Err(CodegenError::UnknownMessage(message.to_string()));
    }
    let descriptor = schema
        .field(message, field)
        .ok_or_else(|| CodegenError::UnknownField {
            message: message.to_string(),
            field: field.to_string(),
        })?;
    let shape = FieldShape::classify(schema, descriptor)?;
    tracing::debug!(field = %descriptor.full_name(), ?shape, "generating field access");
    if !base.is_boxed() && base.native_type() != &NativeType::message(message) {
        return Err(CodegenError::BaseMismatch {
            message: message.to_string(),
            found: base.native_type().to_string(),
        });
    }

    match shape {
        FieldShape::Repeated { element, .. } => access_repeated(base, descriptor, &element),
        FieldShape::Extension { coercion, presence } => {
            let b = normalize_base(base, message)?;
            access_extension(b, descriptor, &coercion, presence)
        }
        FieldShape::Singular {
            coercion,
            presence,
            test,
        } => {
            let b = normalize_base(base, message)?;
            access_singular(b, descriptor, &coercion, presence, &test)
        }
    }
}

/// Repeated fields are read through the boxed message so each element
/// comes back already boxed.
fn access_repeated(
    base: TypedValue,
    field: &FieldDescriptor,
    element: &Coercion,
) -> Result<TypedValue, CodegenError> {
    let base = base.box_value()?;
    let mut b = CodeBuilder::with_inputs(base.code().inputs().to_vec());
    b.append(base.code())?;
    b.check_cast(RefType::Boxed(BoxedKind::Proto))?;
    b.push_const(Constant::Text(field.name.clone()));
    b.invoke(&methods::get_field())?;
    b.invoke(&methods::resolve())?;
    b.check_cast(RefType::Boxed(BoxedKind::List))?;
    TypedValue::new(
        b.finish_expression(true)?,
        ValueType::list(element.logical_type()),
    )
}

/// Starts a builder holding the base as a native message.
fn normalize_base(base: TypedValue, message: &str) -> Result<CodeBuilder, CodegenError> {
    let mut b = CodeBuilder::with_inputs(base.code().inputs().to_vec());
    b.append(base.code())?;
    if base.is_boxed() {
        b.check_cast(RefType::Boxed(BoxedKind::Proto))?;
        b.invoke(&methods::get_proto())?;
        b.check_cast(RefType::Message(message.to_string()))?;
    }
    Ok(b)
}

/// Boxes a primitive so it can merge with the null of the absent arm.
fn box_primitive_result(b: &mut CodeBuilder, ty: &ValueType) -> Result<(), CodegenError> {
    if b.top()?.is_primitive() {
        emit_box(b, ty, false)?;
    }
    Ok(())
}

fn access_extension(
    mut b: CodeBuilder,
    field: &FieldDescriptor,
    coercion: &Coercion,
    presence: PresencePolicy,
) -> Result<TypedValue, CodegenError> {
    let id = methods::extension_id(field)?;
    let ty = coercion.logical_type();
    if !presence.checks() {
        b.get_static(&id);
        b.invoke(&methods::get_extension())?;
        coercion.interpret_extension(&mut b)?;
        return TypedValue::new(b.finish_expression(true)?, ty);
    }

    b.dup()?;
    b.get_static(&id);
    b.invoke(&methods::has_extension())?;
    b.branch(
        Test::IsTrue,
        |present| {
            present.get_static(&id);
            present.invoke(&methods::get_extension())?;
            coercion.interpret_extension(present)?;
            box_primitive_result(present, &ty)
        },
        absent,
    )?;
    TypedValue::new(b.finish_expression(false)?, ty)
}

fn access_singular(
    mut b: CodeBuilder,
    field: &FieldDescriptor,
    coercion: &Coercion,
    presence: PresencePolicy,
    test: &PresenceTest,
) -> Result<TypedValue, CodegenError> {
    let getter = methods::getter(field, coercion.storage_type());
    let ty = coercion.logical_type();
    if !presence.checks() {
        b.invoke(&getter)?;
        coercion.interpret(&mut b)?;
        return TypedValue::new(b.finish_expression(true)?, ty);
    }

    b.dup()?;
    let branch_test = match test {
        PresenceTest::Hasser => {
            b.invoke(&methods::hasser(field))?;
            Test::IsTrue
        }
        PresenceTest::OneofCase { oneof, number } => {
            b.invoke(&methods::case_getter(&field.containing_type, oneof))?;
            b.invoke(&methods::case_number(&field.containing_type, oneof))?;
            b.push_const(Constant::Int(*number));
            Test::IntEq
        }
    };
    b.branch(
        branch_test,
        |present| {
            present.invoke(&getter)?;
            coercion.interpret(present)?;
            box_primitive_result(present, &ty)
        },
        absent,
    )?;
    TypedValue::new(b.finish_expression(false)?, ty)
}

/// The unset arm: drop the message, yield null.
fn absent(b: &mut CodeBuilder) -> Result<(), CodegenError> {
    b.pop()?;
    b.push_null();
    Ok(())
}
