//! Signatures of every operation the generators call.

use crate::error::CodegenError;
use rhizome_quill_ir::{BoxedKind, FieldRef, MethodRef, NativeType, RefType};
use rhizome_quill_schema::naming;
use rhizome_quill_schema::{ExtensionScope, FieldDescriptor, SanitizedKind};

fn object() -> NativeType {
    NativeType::object(RefType::Object)
}

pub(crate) fn boxed(kind: BoxedKind) -> NativeType {
    NativeType::boxed(kind)
}

fn message_type(name: &str) -> RefType {
    RefType::Message(name.to_string())
}

fn builder_type(name: &str) -> RefType {
    RefType::Builder(name.to_string())
}

// Generated messages

pub(crate) fn getter(field: &FieldDescriptor, returns: NativeType) -> MethodRef {
    MethodRef::instance(
        message_type(&field.containing_type),
        naming::getter(field),
        vec![],
        Some(returns),
    )
    .non_null()
}

pub(crate) fn hasser(field: &FieldDescriptor) -> MethodRef {
    MethodRef::instance(
        message_type(&field.containing_type),
        naming::hasser(field),
        vec![],
        Some(NativeType::Bool),
    )
}

pub(crate) fn oneof_case_type(message: &str, oneof: &str) -> RefType {
    RefType::OneofCase(format!("{}.{}", message, oneof))
}

pub(crate) fn case_getter(message: &str, oneof: &str) -> MethodRef {
    MethodRef::instance(
        message_type(message),
        naming::case_getter(oneof),
        vec![],
        Some(NativeType::object(oneof_case_type(message, oneof))),
    )
    .non_null()
}

pub(crate) fn case_number(message: &str, oneof: &str) -> MethodRef {
    MethodRef::instance(
        oneof_case_type(message, oneof),
        "get_number",
        vec![],
        Some(NativeType::Int),
    )
}

pub(crate) fn default_instance(message: &str) -> MethodRef {
    MethodRef::static_method(
        message_type(message),
        naming::DEFAULT_INSTANCE,
        vec![],
        Some(NativeType::message(message)),
    )
    .non_null()
}

pub(crate) fn new_builder(message: &str) -> MethodRef {
    MethodRef::static_method(
        message_type(message),
        naming::NEW_BUILDER,
        vec![],
        Some(NativeType::builder(message)),
    )
    .non_null()
}

pub(crate) fn build(message: &str) -> MethodRef {
    MethodRef::instance(
        builder_type(message),
        naming::BUILD,
        vec![],
        Some(NativeType::message(message)),
    )
    .non_null()
}

/// `set_<f>` / `add_<f>` taking the field's storage type.
pub(crate) fn setter(field: &FieldDescriptor, param: NativeType) -> MethodRef {
    MethodRef::instance(
        builder_type(&field.containing_type),
        naming::setter(field),
        vec![param],
        Some(NativeType::builder(&field.containing_type)),
    )
    .non_null()
}

// Extensions

fn extension() -> NativeType {
    NativeType::object(RefType::Extension)
}

/// The static identifier of an extension field.
pub(crate) fn extension_id(field: &FieldDescriptor) -> Result<FieldRef, CodegenError> {
    let owner = match &field.extension {
        Some(ExtensionScope::Message(name)) => RefType::Message(name.clone()),
        Some(ExtensionScope::File(holder)) => RefType::ExtensionHolder(holder.clone()),
        None => {
            return Err(CodegenError::Unsupported {
                context: field.full_name(),
                what: "extension access on a declared field".to_string(),
            });
        }
    };
    Ok(FieldRef {
        owner,
        name: field.name.clone(),
        ty: extension(),
    })
}

pub(crate) fn has_extension() -> MethodRef {
    MethodRef::instance(
        RefType::ExtendableMessage,
        "has_extension",
        vec![extension()],
        Some(NativeType::Bool),
    )
    .non_null()
}

pub(crate) fn get_extension() -> MethodRef {
    MethodRef::instance(
        RefType::ExtendableMessage,
        "get_extension",
        vec![extension()],
        Some(object()),
    )
    .non_null()
}

/// `set_extension` for singular extensions, `add_extension` for repeated.
pub(crate) fn mutate_extension(repeated: bool) -> MethodRef {
    let name = if repeated { "add_extension" } else { "set_extension" };
    MethodRef::instance(
        RefType::ExtendableBuilder,
        name,
        vec![extension(), object()],
        Some(NativeType::object(RefType::ExtendableBuilder)),
    )
    .non_null()
}

// Enums

pub(crate) fn enum_number(enum_name: &str) -> MethodRef {
    MethodRef::instance(
        RefType::Enum(enum_name.to_string()),
        "get_number",
        vec![],
        Some(NativeType::Int),
    )
}

/// Unknown numbers produce null, which faults at the setter.
pub(crate) fn enum_for_number(enum_name: &str) -> MethodRef {
    let ty = RefType::Enum(enum_name.to_string());
    MethodRef::static_method(
        ty.clone(),
        "for_number",
        vec![NativeType::Int],
        Some(NativeType::object(ty)),
    )
    .non_null()
}

// Wrappers and numbers

fn long_wrapper() -> RefType {
    RefType::Wrapper(NativeType::Long)
}

pub(crate) fn long_to_string() -> MethodRef {
    MethodRef::static_method(
        long_wrapper(),
        "to_string",
        vec![NativeType::Long],
        Some(NativeType::text()),
    )
    .non_null()
}

pub(crate) fn long_parse() -> MethodRef {
    MethodRef::static_method(
        long_wrapper(),
        "parse",
        vec![NativeType::text()],
        Some(NativeType::Long),
    )
}

pub(crate) fn number_long_value() -> MethodRef {
    MethodRef::instance(RefType::Number, "long_value", vec![], Some(NativeType::Long))
}

pub(crate) fn number_double_value() -> MethodRef {
    MethodRef::instance(
        RefType::Number,
        "double_value",
        vec![],
        Some(NativeType::Double),
    )
}

pub(crate) fn wrapper_boolean_value() -> MethodRef {
    MethodRef::instance(
        RefType::Wrapper(NativeType::Bool),
        "boolean_value",
        vec![],
        Some(NativeType::Bool),
    )
}

pub(crate) fn object_to_string() -> MethodRef {
    MethodRef::instance(RefType::Object, "to_string", vec![], Some(NativeType::text()))
        .non_null()
}

// Bytes

pub(crate) fn byte_string_to_array() -> MethodRef {
    MethodRef::instance(
        RefType::ByteString,
        "to_byte_array",
        vec![],
        Some(NativeType::object(RefType::ByteArray)),
    )
    .non_null()
}

pub(crate) fn byte_string_copy_from() -> MethodRef {
    MethodRef::static_method(
        RefType::ByteString,
        "copy_from",
        vec![NativeType::object(RefType::ByteArray)],
        Some(NativeType::object(RefType::ByteString)),
    )
    .non_null()
}

pub(crate) fn base64() -> MethodRef {
    MethodRef::static_method(
        RefType::Codec,
        "base64",
        vec![],
        Some(NativeType::object(RefType::Codec)),
    )
    .non_null()
}

pub(crate) fn base64_encode() -> MethodRef {
    MethodRef::instance(
        RefType::Codec,
        "encode",
        vec![NativeType::object(RefType::ByteArray)],
        Some(NativeType::text()),
    )
    .non_null()
}

pub(crate) fn base64_decode() -> MethodRef {
    MethodRef::instance(
        RefType::Codec,
        "decode",
        vec![NativeType::text()],
        Some(NativeType::object(RefType::ByteArray)),
    )
    .non_null()
}

// Lists and the runtime library

fn list() -> NativeType {
    NativeType::object(RefType::List)
}

pub(crate) fn list_get() -> MethodRef {
    MethodRef::instance(RefType::List, "get", vec![NativeType::Int], Some(object()))
}

pub(crate) fn list_size() -> MethodRef {
    MethodRef::instance(RefType::List, "size", vec![], Some(NativeType::Int))
}

pub(crate) fn list_add() -> MethodRef {
    MethodRef::instance(RefType::List, "add", vec![object()], Some(NativeType::Bool))
}

pub(crate) fn new_list() -> MethodRef {
    MethodRef::static_method(RefType::Runtime, "new_list", vec![], Some(list())).non_null()
}

pub(crate) fn provider() -> MethodRef {
    MethodRef::static_method(
        RefType::Runtime,
        "provider",
        vec![boxed(BoxedKind::Any)],
        Some(NativeType::object(RefType::Provider)),
    )
    .non_null()
}

pub(crate) fn resolve_all() -> MethodRef {
    MethodRef::static_method(RefType::Runtime, "resolve_all", vec![list()], Some(list()))
        .non_null()
}

// Boxed host values

pub(crate) fn get_proto() -> MethodRef {
    MethodRef::instance(
        RefType::Boxed(BoxedKind::Proto),
        "get_proto",
        vec![],
        Some(object()),
    )
    .non_null()
}

pub(crate) fn get_field() -> MethodRef {
    MethodRef::instance(
        RefType::Boxed(BoxedKind::Proto),
        "get_field",
        vec![NativeType::text()],
        Some(NativeType::object(RefType::Provider)),
    )
}

pub(crate) fn resolve() -> MethodRef {
    MethodRef::instance(
        RefType::Provider,
        "resolve",
        vec![],
        Some(boxed(BoxedKind::Any)),
    )
}

/// Boxes a native value of the given kind.
pub(crate) fn for_value(kind: BoxedKind) -> MethodRef {
    let param = match kind {
        BoxedKind::Bool => NativeType::Bool,
        BoxedKind::Int => NativeType::Long,
        BoxedKind::Float => NativeType::Double,
        BoxedKind::Text => NativeType::text(),
        BoxedKind::List => list(),
        _ => object(),
    };
    MethodRef::static_method(
        RefType::Boxed(kind),
        "for_value",
        vec![param],
        Some(boxed(kind)),
    )
    .non_null()
}

pub(crate) fn ordain() -> MethodRef {
    MethodRef::static_method(
        RefType::Boxed(BoxedKind::Sanitized),
        "ordain",
        vec![NativeType::text(), NativeType::Int],
        Some(boxed(BoxedKind::Sanitized)),
    )
    .non_null()
}

/// Unboxing accessor on any boxed value.
pub(crate) fn unbox(name: &str, returns: NativeType) -> MethodRef {
    MethodRef::instance(RefType::Boxed(BoxedKind::Any), name, vec![], Some(returns))
}

pub(crate) fn as_list() -> MethodRef {
    MethodRef::instance(RefType::Boxed(BoxedKind::List), "as_list", vec![], Some(list()))
        .non_null()
}

/// Sanitized value to its wrapper message.
pub(crate) fn to_safe_proto(kind: SanitizedKind) -> MethodRef {
    MethodRef::instance(
        RefType::Boxed(BoxedKind::Sanitized),
        kind.to_proto_method(),
        vec![],
        Some(NativeType::message(kind.message_name())),
    )
}

/// Accessor for the text wrapped by a sanitized-content message.
pub(crate) fn wrapped_value(kind: SanitizedKind) -> MethodRef {
    MethodRef::instance(
        RefType::Message(kind.message_name()),
        format!("get_{}", kind.wrapped_field()),
        vec![],
        Some(NativeType::text()),
    )
    .non_null()
}
