//! Operand-stack types of the target machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime kinds of boxed host values.
///
/// Boxed values carry their own tag at runtime; `Any` is the common
/// supertype every other kind is assignable to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxedKind {
    Any,
    Bool,
    Int,
    Float,
    Text,
    Proto,
    List,
    Sanitized,
}

impl BoxedKind {
    pub fn name(self) -> &'static str {
        match self {
            BoxedKind::Any => "Value",
            BoxedKind::Bool => "BoolValue",
            BoxedKind::Int => "IntValue",
            BoxedKind::Float => "FloatValue",
            BoxedKind::Text => "TextValue",
            BoxedKind::Proto => "ProtoValue",
            BoxedKind::List => "ListValue",
            BoxedKind::Sanitized => "SanitizedValue",
        }
    }
}

/// Reference (object) types known to the machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    /// Root of the reference hierarchy.
    Object,
    /// Type of the `null` constant; assignable to every reference type.
    Null,
    Text,
    ByteString,
    ByteArray,
    /// Binary-to-text codec instance.
    Codec,
    /// Native indexable list.
    List,
    /// Not-yet-materialized value provider.
    Provider,
    Boxed(BoxedKind),
    /// Common supertype of the numeric primitive wrappers.
    Number,
    /// Wrapper object for a primitive (the result of `valueOf`).
    Wrapper(NativeType),
    /// Generated message type, by full name.
    Message(String),
    /// Generated builder type, by message full name.
    Builder(String),
    /// Generated legacy enum type, by full name.
    Enum(String),
    /// Oneof discriminant type, keyed `message.oneof`.
    OneofCase(String),
    ExtendableMessage,
    ExtendableBuilder,
    /// Extension identifier object.
    Extension,
    /// Static holder of file-level extension identifiers.
    ExtensionHolder(String),
    /// Runtime support library (static helpers only).
    Runtime,
}

impl RefType {
    /// Whether a value of `self` can be used where `target` is expected.
    pub fn is_assignable_to(&self, target: &RefType) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (_, RefType::Object) => true,
            (RefType::Null, _) => true,
            (RefType::Boxed(_), RefType::Boxed(BoxedKind::Any)) => true,
            (RefType::Message(_), RefType::ExtendableMessage) => true,
            (RefType::Builder(_), RefType::ExtendableBuilder) => true,
            (RefType::Wrapper(prim), RefType::Number) => prim.is_numeric(),
            _ => false,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefType::Object => write!(f, "Object"),
            RefType::Null => write!(f, "null"),
            RefType::Text => write!(f, "Text"),
            RefType::ByteString => write!(f, "ByteString"),
            RefType::ByteArray => write!(f, "byte[]"),
            RefType::Codec => write!(f, "Codec"),
            RefType::List => write!(f, "List"),
            RefType::Provider => write!(f, "Provider"),
            RefType::Boxed(kind) => write!(f, "{}", kind.name()),
            RefType::Number => write!(f, "Number"),
            RefType::Wrapper(prim) => write!(f, "Wrapper<{}>", prim),
            RefType::Message(name) => write!(f, "{}", name),
            RefType::Builder(name) => write!(f, "{}$Builder", name),
            RefType::Enum(name) => write!(f, "{}", name),
            RefType::OneofCase(key) => write!(f, "{}$Case", key),
            RefType::ExtendableMessage => write!(f, "ExtendableMessage"),
            RefType::ExtendableBuilder => write!(f, "ExtendableBuilder"),
            RefType::Extension => write!(f, "Extension"),
            RefType::ExtensionHolder(name) => write!(f, "{}", name),
            RefType::Runtime => write!(f, "Runtime"),
        }
    }
}

/// Type of a single operand-stack slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    Bool,
    Int,
    Long,
    Float,
    Double,
    Ref(Box<RefType>),
}

impl NativeType {
    /// Shorthand for a reference type.
    pub fn object(ty: RefType) -> Self {
        NativeType::Ref(Box::new(ty))
    }

    pub fn text() -> Self {
        NativeType::object(RefType::Text)
    }

    pub fn null() -> Self {
        NativeType::object(RefType::Null)
    }

    pub fn boxed(kind: BoxedKind) -> Self {
        NativeType::object(RefType::Boxed(kind))
    }

    pub fn message(name: impl Into<String>) -> Self {
        NativeType::object(RefType::Message(name.into()))
    }

    pub fn builder(name: impl Into<String>) -> Self {
        NativeType::object(RefType::Builder(name.into()))
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, NativeType::Ref(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            NativeType::Int | NativeType::Long | NativeType::Float | NativeType::Double
        )
    }

    /// Returns the reference type, if this is one.
    pub fn as_ref_type(&self) -> Option<&RefType> {
        match self {
            NativeType::Ref(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns the boxed host kind, if this is a boxed value.
    pub fn boxed_kind(&self) -> Option<BoxedKind> {
        match self.as_ref_type() {
            Some(RefType::Boxed(kind)) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_assignable_to(&self, target: &NativeType) -> bool {
        match (self, target) {
            (NativeType::Ref(from), NativeType::Ref(to)) => from.is_assignable_to(to),
            _ => self == target,
        }
    }

    /// Least common type of two stack slots reaching the same merge point.
    ///
    /// Primitives only merge with themselves. References merge to the wider
    /// of the two when one is assignable to the other; `null` merges with
    /// any reference.
    pub fn merge(&self, other: &NativeType) -> Option<NativeType> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (NativeType::Ref(a), NativeType::Ref(b)) => {
                if a.is_assignable_to(b) {
                    Some(other.clone())
                } else if b.is_assignable_to(a) {
                    Some(self.clone())
                } else {
                    Some(NativeType::object(RefType::Object))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Bool => write!(f, "bool"),
            NativeType::Int => write!(f, "int"),
            NativeType::Long => write!(f, "long"),
            NativeType::Float => write!(f, "float"),
            NativeType::Double => write!(f, "double"),
            NativeType::Ref(ty) => write!(f, "{}", ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_assignable_to_references_only() {
        assert!(NativeType::null().is_assignable_to(&NativeType::text()));
        assert!(NativeType::null().is_assignable_to(&NativeType::message("a.B")));
        assert!(!NativeType::null().is_assignable_to(&NativeType::Long));
    }

    #[test]
    fn test_generated_types_widen_to_extendable() {
        assert!(NativeType::message("a.B")
            .is_assignable_to(&NativeType::object(RefType::ExtendableMessage)));
        assert!(NativeType::builder("a.B")
            .is_assignable_to(&NativeType::object(RefType::ExtendableBuilder)));
        assert!(!NativeType::message("a.B").is_assignable_to(&NativeType::message("a.C")));
    }

    #[test]
    fn test_wrappers_are_numbers() {
        let long = NativeType::object(RefType::Wrapper(NativeType::Long));
        let flag = NativeType::object(RefType::Wrapper(NativeType::Bool));
        assert!(long.is_assignable_to(&NativeType::object(RefType::Number)));
        assert!(!flag.is_assignable_to(&NativeType::object(RefType::Number)));
    }

    #[test]
    fn test_merge() {
        assert_eq!(
            NativeType::null().merge(&NativeType::boxed(BoxedKind::Int)),
            Some(NativeType::boxed(BoxedKind::Int))
        );
        assert_eq!(
            NativeType::boxed(BoxedKind::Int).merge(&NativeType::boxed(BoxedKind::Any)),
            Some(NativeType::boxed(BoxedKind::Any))
        );
        assert_eq!(NativeType::Long.merge(&NativeType::Int), None);
        assert_eq!(NativeType::Long.merge(&NativeType::null()), None);
    }
}
