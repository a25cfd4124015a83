//! Message construction.
//!
//! A construction with no arguments is the shared default instance.
//! Otherwise a builder is created, one setter is emitted per argument in
//! argument order, and the builder is built.

use crate::coerce::Coercion;
use crate::error::CodegenError;
use crate::methods;
use crate::resolver::ListResolver;
use crate::shape::FieldShape;
use crate::value::{TypedValue, ValueType, emit_box, emit_unbox};
use rhizome_quill_ir::{BoxedKind, CodeBuilder, Constant, Local, NativeType, RefType, Test};
use rhizome_quill_schema::{FieldDescriptor, Schema};

/// Generates code constructing `message` from `(field name, value)` pairs.
///
/// Argument sequences must be self-contained: they may not take stack
/// inputs. Arguments typed `null` leave the field unset.
pub fn generate_message_construction(
    schema: &Schema,
    message: &str,
    args: Vec<(String, TypedValue)>,
    resolver: &dyn ListResolver,
) -> Result<TypedValue, CodegenError> {
    if schema.message(message).is_none() {
        return Err(CodegenError::UnknownMessage(message.to_string()));
    }
    let mut b = CodeBuilder::new();
    if args.is_empty() {
        b.invoke(&methods::default_instance(message))?;
        return TypedValue::new(
            b.finish_expression(true)?,
            ValueType::Message(message.to_string()),
        );
    }

    b.invoke(&methods::new_builder(message))?;
    for (name, arg) in &args {
        let field = schema
            .field(message, name)
            .ok_or_else(|| CodegenError::UnknownField {
                message: message.to_string(),
                field: name.clone(),
            })?;
        if !arg.code().inputs().is_empty() {
            return Err(CodegenError::Unsupported {
                context: field.full_name(),
                what: "argument that takes stack inputs".to_string(),
            });
        }
        if *arg.value_type() == ValueType::Null {
            tracing::trace!(field = %field.full_name(), "skipping null argument");
            continue;
        }
        let shape = FieldShape::classify(schema, field)?;
        check_argument(field, &shape, arg.value_type())?;
        tracing::trace!(field = %field.full_name(), arg = %arg.value_type(), "emitting setter");

        match &shape {
            FieldShape::Repeated { element, extension } => {
                set_repeated(&mut b, field, element, *extension, arg, resolver)?
            }
            FieldShape::Extension { coercion, .. } => set_extension(&mut b, field, coercion, arg)?,
            FieldShape::Singular { coercion, .. } => set_singular(&mut b, field, coercion, arg)?,
        }
    }
    b.invoke(&methods::build(message))?;
    TypedValue::new(
        b.finish_expression(true)?,
        ValueType::Message(message.to_string()),
    )
}

fn accepts(expected: &ValueType, found: &ValueType) -> bool {
    match (expected, found) {
        (_, ValueType::Any) | (_, ValueType::Null) => true,
        (ValueType::Float, ValueType::Int) => true,
        (expected, found) => expected == found,
    }
}

fn check_argument(
    field: &FieldDescriptor,
    shape: &FieldShape,
    found: &ValueType,
) -> Result<(), CodegenError> {
    let logical = shape.coercion().logical_type();
    let ok = match shape {
        FieldShape::Repeated { .. } => match found {
            ValueType::List(element) => accepts(&logical, element),
            ValueType::EmptyList | ValueType::Any | ValueType::Null => true,
            _ => false,
        },
        _ => accepts(&logical, found),
    };
    if ok {
        return Ok(());
    }
    let expected = match shape {
        FieldShape::Repeated { .. } => ValueType::list(logical),
        _ => logical,
    };
    Err(CodegenError::ArgumentMismatch {
        field: field.full_name(),
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

/// Whether the value needs a runtime null test before it is stored.
fn needs_null_test(arg: &TypedValue) -> bool {
    arg.is_nullable() && !arg.native_type().is_primitive()
}

/// Brings the value on top of the stack to the form [`Coercion::coerce`]
/// expects.
fn unbox_for(b: &mut CodeBuilder, coercion: &Coercion, ty: &ValueType) -> Result<(), CodegenError> {
    match coercion.unbox_target() {
        Some(target) => emit_unbox(b, &target),
        None if b.top()?.boxed_kind().is_none() => emit_box(b, ty, false),
        None => Ok(()),
    }
}

/// `[builder, value] -> [builder]` through the field's setter.
fn store_value(
    b: &mut CodeBuilder,
    field: &FieldDescriptor,
    coercion: &Coercion,
    ty: &ValueType,
) -> Result<(), CodegenError> {
    unbox_for(b, coercion, ty)?;
    coercion.coerce(b)?;
    b.invoke(&methods::setter(field, coercion.storage_type()))?;
    Ok(())
}

fn set_singular(
    b: &mut CodeBuilder,
    field: &FieldDescriptor,
    coercion: &Coercion,
    arg: &TypedValue,
) -> Result<(), CodegenError> {
    b.append(arg.code())?;
    if !needs_null_test(arg) {
        return store_value(b, field, coercion, arg.value_type());
    }
    b.dup()?;
    b.branch::<CodegenError, _, _>(
        Test::IsNull,
        |null| Ok(null.pop()?),
        |present| store_value(present, field, coercion, arg.value_type()),
    )
}

/// `[value] -> [extension value]`, boxing primitives for storage.
fn extension_value(
    b: &mut CodeBuilder,
    coercion: &Coercion,
    ty: &ValueType,
) -> Result<(), CodegenError> {
    unbox_for(b, coercion, ty)?;
    coercion.coerce(b)?;
    if b.top()?.is_primitive() {
        b.box_primitive()?;
    }
    Ok(())
}

fn set_extension(
    b: &mut CodeBuilder,
    field: &FieldDescriptor,
    coercion: &Coercion,
    arg: &TypedValue,
) -> Result<(), CodegenError> {
    let id = methods::extension_id(field)?;
    let mutate = methods::mutate_extension(false);
    b.check_cast(RefType::ExtendableBuilder)?;
    if !needs_null_test(arg) {
        b.get_static(&id);
        b.append(arg.code())?;
        extension_value(b, coercion, arg.value_type())?;
        b.invoke(&mutate)?;
    } else {
        b.append(arg.code())?;
        b.dup()?;
        b.branch::<CodegenError, _, _>(
            Test::IsNull,
            |null| Ok(null.pop()?),
            |present| {
                extension_value(present, coercion, arg.value_type())?;
                present.get_static(&id);
                present.swap()?;
                present.invoke(&mutate)?;
                Ok(())
            },
        )?;
    }
    b.check_cast(RefType::Builder(field.containing_type.clone()))?;
    Ok(())
}

/// Adds each element of a list argument in order.
fn set_repeated(
    b: &mut CodeBuilder,
    field: &FieldDescriptor,
    element: &Coercion,
    extension: bool,
    arg: &TypedValue,
    resolver: &dyn ListResolver,
) -> Result<(), CodegenError> {
    if *arg.value_type() == ValueType::EmptyList {
        return Ok(());
    }
    let element_type = match arg.value_type() {
        ValueType::List(element) => (**element).clone(),
        _ => ValueType::Any,
    };
    let add = |b: &mut CodeBuilder| -> Result<(), CodegenError> {
        emit_unbox(b, &NativeType::object(RefType::List))?;
        b.append(&resolver.resolve_list()?)?;
        add_all(b, field, element, extension, &element_type)
    };

    b.append(arg.code())?;
    if !needs_null_test(arg) {
        return add(b);
    }
    b.dup()?;
    b.branch::<CodegenError, _, _>(Test::IsNull, |null| Ok(null.pop()?), add)
}

/// `[builder, list] -> [builder]`, iterating with an index local.
fn add_all(
    b: &mut CodeBuilder,
    field: &FieldDescriptor,
    element: &Coercion,
    extension: bool,
    element_type: &ValueType,
) -> Result<(), CodegenError> {
    let kind = element_type.boxed_kind();
    b.scope::<CodegenError, _>(|s| {
        let list = s.declare_local(format!("{}__list", field.name), NativeType::object(RefType::List));
        s.store(&list)?;
        let size = s.declare_local(format!("{}__size", field.name), NativeType::Int);
        s.load(&list);
        s.invoke(&methods::list_size())?;
        s.store(&size)?;
        let index = s.declare_local(format!("{}__index", field.name), NativeType::Int);
        s.push_const(Constant::Int(0));
        s.store(&index)?;

        s.while_loop::<CodegenError, _, _>(
            |cond| {
                cond.load(&index);
                cond.load(&size);
                Ok(())
            },
            Test::IntLt,
            |body| {
                if extension {
                    add_extension_element(body, field, element, element_type, &list, &index, kind)?;
                } else {
                    load_element(body, &list, &index, kind)?;
                    store_value(body, field, element, element_type)?;
                }
                body.increment(&index, 1)?;
                Ok(())
            },
        )
    })
}

/// Pushes `list[index]`, resolved and cast to the element's boxed kind.
fn load_element(
    b: &mut CodeBuilder,
    list: &Local,
    index: &Local,
    kind: BoxedKind,
) -> Result<(), CodegenError> {
    b.load(list);
    b.load(index);
    b.invoke(&methods::list_get())?;
    b.check_cast(RefType::Provider)?;
    b.invoke(&methods::resolve())?;
    b.check_cast(RefType::Boxed(kind))?;
    Ok(())
}

fn add_extension_element(
    b: &mut CodeBuilder,
    field: &FieldDescriptor,
    element: &Coercion,
    element_type: &ValueType,
    list: &Local,
    index: &Local,
    kind: BoxedKind,
) -> Result<(), CodegenError> {
    b.check_cast(RefType::ExtendableBuilder)?;
    b.get_static(&methods::extension_id(field)?);
    load_element(b, list, index, kind)?;
    extension_value(b, element, element_type)?;
    b.invoke(&methods::mutate_extension(true))?;
    b.check_cast(RefType::Builder(field.containing_type.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ImmediateResolver;
    use rhizome_quill_ir::Op;

    const DEMO: &str = include_str!("../../quill-schema/testdata/demo.toml");

    fn schema() -> Schema {
        Schema::from_toml_str(DEMO).unwrap()
    }

    #[test]
    fn test_no_arguments_is_default_instance() {
        let value =
            generate_message_construction(&schema(), "demo.Person", vec![], &ImmediateResolver)
                .unwrap();
        assert_eq!(value.code().len(), 1);
        assert!(!value.code().contains(|op| matches!(op, Op::Invoke(m) if m.name == "build")));
    }

    #[test]
    fn test_argument_type_checked() {
        let err = generate_message_construction(
            &schema(),
            "demo.Person",
            vec![("age".to_string(), TypedValue::text("old"))],
            &ImmediateResolver,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodegenError::ArgumentMismatch {
                field: "demo.Person.age".to_string(),
                expected: "int".to_string(),
                found: "string".to_string(),
            }
        );
    }

    #[test]
    fn test_int_accepted_for_float_field() {
        let value = generate_message_construction(
            &schema(),
            "modern.Account",
            vec![("rate".to_string(), TypedValue::long(2))],
            &ImmediateResolver,
        );
        assert!(value.is_ok());
    }

    #[test]
    fn test_null_argument_leaves_field_unset() {
        let value = generate_message_construction(
            &schema(),
            "demo.Person",
            vec![("name".to_string(), TypedValue::null())],
            &ImmediateResolver,
        )
        .unwrap();
        assert!(!value.code().contains(|op| matches!(op, Op::Invoke(m) if m.name.starts_with("set_"))));
    }

    #[test]
    fn test_repeated_loop_declares_locals() {
        let list = TypedValue::list_of(ValueType::Int, vec![TypedValue::long(1)]).unwrap();
        let value = generate_message_construction(
            &schema(),
            "demo.Person",
            vec![("lucky_numbers".to_string(), list)],
            &ImmediateResolver,
        )
        .unwrap();
        assert!(value.code().max_locals() >= 3);
        assert!(value.code().contains(|op| matches!(op, Op::Suspend(_))));
    }
}
