//! Type coercion rules shared by both generators.
//!
//! Every field has three representations: the *storage* type its generated
//! getter returns and its setter takes, the *native* type generated code
//! computes with, and the *logical* type the expression language sees.
//! [`Coercion`] maps between them.

use crate::error::CodegenError;
use crate::methods;
use crate::value::ValueType;
use rhizome_quill_ir::{BoxedKind, CodeBuilder, NativeType, RefType};
use rhizome_quill_schema::{FieldDescriptor, FieldKind, Revision, SanitizedKind, Schema};

#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    Bool,
    Int32,
    Int64,
    /// 64-bit integer exchanged as decimal text.
    Int64AsText,
    Float,
    Double,
    Text,
    /// Opaque bytes, exchanged as base64 text.
    Bytes,
    /// Enum accessed through its constants.
    LegacyEnum(String),
    /// Enum accessed through raw numbers, tolerating unknown values.
    ModernEnum(String),
    Message(String),
    Sanitized(SanitizedKind),
}

impl Coercion {
    pub fn of(field: &FieldDescriptor, schema: &Schema) -> Result<Self, CodegenError> {
        let unsupported = |what: String| CodegenError::Unsupported {
            context: field.full_name(),
            what,
        };
        if field.numeric_as_text && field.kind != FieldKind::Int64 {
            return Err(unsupported(format!(
                "numeric-as-text on {} field",
                field.kind.name()
            )));
        }
        let coercion = match &field.kind {
            FieldKind::Bool => Coercion::Bool,
            FieldKind::Int32 => Coercion::Int32,
            FieldKind::Int64 if field.numeric_as_text => Coercion::Int64AsText,
            FieldKind::Int64 => Coercion::Int64,
            FieldKind::Float => Coercion::Float,
            FieldKind::Double => Coercion::Double,
            FieldKind::Text => Coercion::Text,
            FieldKind::Bytes => Coercion::Bytes,
            FieldKind::Enum(name) => {
                if schema.enum_type(name).is_none() {
                    return Err(unsupported(format!("unresolved enum {}", name)));
                }
                match field.revision {
                    Revision::Legacy => Coercion::LegacyEnum(name.clone()),
                    Revision::Modern => Coercion::ModernEnum(name.clone()),
                }
            }
            FieldKind::Message(name) => match field.sanitized_kind() {
                Some(kind) => Coercion::Sanitized(kind),
                None if schema.message(name).is_some() => Coercion::Message(name.clone()),
                None => return Err(unsupported(format!("unresolved message {}", name))),
            },
        };
        Ok(coercion)
    }

    /// Type the generated getter returns and the setter takes.
    pub fn storage_type(&self) -> NativeType {
        match self {
            Coercion::Bool => NativeType::Bool,
            Coercion::Int32 | Coercion::ModernEnum(_) => NativeType::Int,
            Coercion::Int64 | Coercion::Int64AsText => NativeType::Long,
            Coercion::Float => NativeType::Float,
            Coercion::Double => NativeType::Double,
            Coercion::Text => NativeType::text(),
            Coercion::Bytes => NativeType::object(RefType::ByteString),
            Coercion::LegacyEnum(name) => NativeType::object(RefType::Enum(name.clone())),
            Coercion::Message(name) => NativeType::message(name),
            Coercion::Sanitized(kind) => NativeType::message(kind.message_name()),
        }
    }

    /// Type generated code computes with.
    pub fn native_representation(&self) -> NativeType {
        match self {
            Coercion::Bool => NativeType::Bool,
            Coercion::Int32
            | Coercion::Int64
            | Coercion::LegacyEnum(_)
            | Coercion::ModernEnum(_) => NativeType::Long,
            Coercion::Float | Coercion::Double => NativeType::Double,
            Coercion::Int64AsText | Coercion::Text | Coercion::Bytes | Coercion::Sanitized(_) => {
                NativeType::text()
            }
            Coercion::Message(name) => NativeType::message(name),
        }
    }

    pub fn logical_type(&self) -> ValueType {
        match self {
            Coercion::Bool => ValueType::Bool,
            Coercion::Int32
            | Coercion::Int64
            | Coercion::LegacyEnum(_)
            | Coercion::ModernEnum(_) => ValueType::Int,
            Coercion::Float | Coercion::Double => ValueType::Float,
            Coercion::Int64AsText | Coercion::Text | Coercion::Bytes => ValueType::Text,
            Coercion::Message(name) => ValueType::Message(name.clone()),
            Coercion::Sanitized(kind) => ValueType::Sanitized(*kind),
        }
    }

    /// Native type a boxed argument is unboxed to before [`coerce`]. `None`
    /// for sanitized content, which stays boxed.
    ///
    /// [`coerce`]: Coercion::coerce
    pub fn unbox_target(&self) -> Option<NativeType> {
        match self {
            Coercion::Sanitized(_) => None,
            other => Some(other.native_representation()),
        }
    }

    /// Getter result (storage type) to native representation.
    pub fn interpret(&self, b: &mut CodeBuilder) -> Result<(), CodegenError> {
        match self {
            Coercion::Bool | Coercion::Double | Coercion::Text | Coercion::Int64 => {}
            Coercion::Float => b.convert(NativeType::Double)?,
            Coercion::Int32 | Coercion::ModernEnum(_) => b.convert(NativeType::Long)?,
            Coercion::Int64AsText => b.invoke(&methods::long_to_string())?,
            Coercion::LegacyEnum(name) => {
                b.invoke(&methods::enum_number(name))?;
                b.convert(NativeType::Long)?;
            }
            Coercion::Bytes => encode_bytes(b)?,
            Coercion::Message(name) => b.check_cast(RefType::Message(name.clone()))?,
            Coercion::Sanitized(kind) => unwrap_sanitized(b, *kind)?,
        }
        Ok(())
    }

    /// Result of `get_extension` (an untyped object) to native
    /// representation.
    pub fn interpret_extension(&self, b: &mut CodeBuilder) -> Result<(), CodegenError> {
        match self {
            Coercion::Float | Coercion::Double => {
                b.check_cast(RefType::Number)?;
                b.invoke(&methods::number_double_value())?;
            }
            Coercion::Int32 | Coercion::Int64 | Coercion::ModernEnum(_) => {
                b.check_cast(RefType::Number)?;
                b.invoke(&methods::number_long_value())?;
            }
            Coercion::Int64AsText => b.invoke(&methods::object_to_string())?,
            Coercion::LegacyEnum(name) => {
                b.check_cast(RefType::Enum(name.clone()))?;
                b.invoke(&methods::enum_number(name))?;
                b.convert(NativeType::Long)?;
            }
            Coercion::Bool => {
                b.check_cast(RefType::Wrapper(NativeType::Bool))?;
                b.invoke(&methods::wrapper_boolean_value())?;
            }
            Coercion::Text => b.check_cast(RefType::Text)?,
            Coercion::Bytes => {
                b.check_cast(RefType::ByteString)?;
                encode_bytes(b)?;
            }
            Coercion::Message(name) => b.check_cast(RefType::Message(name.clone()))?,
            Coercion::Sanitized(kind) => unwrap_sanitized(b, *kind)?,
        }
        Ok(())
    }

    /// Unboxed argument to the setter's storage type.
    pub fn coerce(&self, b: &mut CodeBuilder) -> Result<(), CodegenError> {
        match self {
            Coercion::Bool | Coercion::Double | Coercion::Text | Coercion::Int64 => {}
            Coercion::Float => b.convert(NativeType::Float)?,
            Coercion::Int32 | Coercion::ModernEnum(_) => b.convert(NativeType::Int)?,
            Coercion::Int64AsText => b.invoke(&methods::long_parse())?,
            Coercion::LegacyEnum(name) => {
                b.convert(NativeType::Int)?;
                b.invoke(&methods::enum_for_number(name))?;
            }
            Coercion::Bytes => {
                b.invoke(&methods::base64())?;
                b.swap()?;
                b.invoke(&methods::base64_decode())?;
                b.invoke(&methods::byte_string_copy_from())?;
            }
            Coercion::Message(name) => b.check_cast(RefType::Message(name.clone()))?,
            Coercion::Sanitized(kind) => {
                b.check_cast(RefType::Boxed(BoxedKind::Sanitized))?;
                b.invoke(&methods::to_safe_proto(*kind))?;
            }
        }
        Ok(())
    }
}

/// `ByteString` on top of the stack to base64 text.
fn encode_bytes(b: &mut CodeBuilder) -> Result<(), CodegenError> {
    b.invoke(&methods::byte_string_to_array())?;
    b.invoke(&methods::base64())?;
    b.swap()?;
    b.invoke(&methods::base64_encode())?;
    Ok(())
}

fn unwrap_sanitized(b: &mut CodeBuilder, kind: SanitizedKind) -> Result<(), CodegenError> {
    b.check_cast(RefType::Message(kind.message_name()))?;
    b.invoke(&methods::wrapped_value(kind))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../quill-schema/testdata/demo.toml");

    fn coercion(message: &str, field: &str) -> Coercion {
        let schema = Schema::from_toml_str(DEMO).unwrap();
        let desc = schema.field(message, field).unwrap().clone();
        Coercion::of(&desc, &schema).unwrap()
    }

    #[test]
    fn test_classification() {
        assert_eq!(coercion("demo.Person", "age"), Coercion::Int32);
        assert_eq!(coercion("demo.Person", "id_text"), Coercion::Int64AsText);
        assert_eq!(
            coercion("demo.Person", "color"),
            Coercion::LegacyEnum("demo.Color".to_string())
        );
        assert_eq!(
            coercion("modern.Account", "status"),
            Coercion::ModernEnum("modern.Status".to_string())
        );
        assert_eq!(
            coercion("demo.Person", "bio"),
            Coercion::Sanitized(SanitizedKind::Html)
        );
        assert_eq!(
            coercion("demo.Person", "friend"),
            Coercion::Message("demo.Person".to_string())
        );
    }

    #[test]
    fn test_representations() {
        let float = Coercion::Float;
        assert_eq!(float.storage_type(), NativeType::Float);
        assert_eq!(float.native_representation(), NativeType::Double);

        let bytes = Coercion::Bytes;
        assert_eq!(bytes.storage_type(), NativeType::object(RefType::ByteString));
        assert_eq!(bytes.logical_type(), ValueType::Text);

        let modern = Coercion::ModernEnum("modern.Status".to_string());
        assert_eq!(modern.storage_type(), NativeType::Int);
        assert_eq!(modern.native_representation(), NativeType::Long);

        assert_eq!(Coercion::Sanitized(SanitizedKind::Url).unbox_target(), None);
    }

    #[test]
    fn test_bytes_encode_is_stack_neutral() {
        let mut b = CodeBuilder::with_inputs(vec![NativeType::object(RefType::ByteString)]);
        Coercion::Bytes.interpret(&mut b).unwrap();
        assert_eq!(b.stack(), &[NativeType::text()]);

        let mut b = CodeBuilder::with_inputs(vec![NativeType::text()]);
        Coercion::Bytes.coerce(&mut b).unwrap();
        assert_eq!(b.stack(), &[NativeType::object(RefType::ByteString)]);
    }

    #[test]
    fn test_legacy_enum_coerce_goes_through_for_number() {
        let mut b = CodeBuilder::with_inputs(vec![NativeType::Long]);
        Coercion::LegacyEnum("demo.Color".to_string())
            .coerce(&mut b)
            .unwrap();
        assert_eq!(
            b.stack(),
            &[NativeType::object(RefType::Enum("demo.Color".to_string()))]
        );
    }
}
