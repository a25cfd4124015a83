//! Runtime values.

use rhizome_quill_ir::{BoxedKind, NativeType, RefType};
use rhizome_quill_schema::SanitizedKind;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// One operand-stack slot or local.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Ref(Rc<Object>),
}

impl Value {
    pub fn object(obj: Object) -> Self {
        Value::Ref(Rc::new(obj))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::object(Object::Text(s.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    /// Integer view, looking through wrappers and boxed values.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some((*n).into()),
            Value::Long(n) => Some(*n),
            Value::Ref(obj) => match obj.as_ref() {
                Object::Wrapper(inner) => inner.as_long(),
                Object::Boxed(Boxed::Int(n)) => Some(*n),
                Object::EnumConst { number, .. } => Some((*number).into()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some((*x).into()),
            Value::Double(x) => Some(*x),
            Value::Ref(obj) => match obj.as_ref() {
                Object::Wrapper(inner) => inner.as_double(),
                Object::Boxed(Boxed::Float(x)) => Some(*x),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Ref(obj) => match obj.as_ref() {
                Object::Wrapper(inner) => inner.as_bool(),
                Object::Boxed(Boxed::Bool(b)) => Some(*b),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text view: plain text, boxed text or sanitized content.
    pub fn as_text(&self) -> Option<&str> {
        match self.as_object()? {
            Object::Text(s) => Some(s),
            Object::Boxed(Boxed::Text(s)) => Some(s),
            Object::Boxed(Boxed::Sanitized { content, .. }) => Some(content),
            _ => None,
        }
    }

    /// Message view, looking through a boxed message.
    pub fn as_message(&self) -> Option<&MessageData> {
        match self.as_object()? {
            Object::Message(data) => Some(data),
            Object::Boxed(Boxed::Proto(inner)) => inner.as_message(),
            _ => None,
        }
    }

    /// Elements of a native or boxed list.
    pub fn list_items(&self) -> Option<Vec<Value>> {
        match self.as_object()? {
            Object::List(items) => Some(items.borrow().clone()),
            Object::Boxed(Boxed::List(items)) => Some(items.clone()),
            _ => None,
        }
    }

    /// Same object, not merely an equal one.
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn native_type(&self) -> Option<NativeType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(NativeType::Bool),
            Value::Int(_) => Some(NativeType::Int),
            Value::Long(_) => Some(NativeType::Long),
            Value::Float(_) => Some(NativeType::Float),
            Value::Double(_) => Some(NativeType::Double),
            Value::Ref(_) => None,
        }
    }

    /// Whether this value may be stored where `ty` is expected.
    pub fn is_instance_of(&self, ty: &RefType) -> bool {
        match self {
            Value::Null => true,
            Value::Ref(obj) => obj.is_instance_of(ty),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Ref(obj) => obj.type_name(),
            other => other
                .native_type()
                .map(|ty| ty.to_string())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Ref(obj) => write!(f, "{}", obj),
        }
    }
}

/// Host-evaluator values.
#[derive(Debug, Clone)]
pub enum Boxed {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Holds a `Value::Ref` to a message.
    Proto(Value),
    List(Vec<Value>),
    Sanitized {
        kind: SanitizedKind,
        content: String,
    },
}

impl Boxed {
    pub fn kind(&self) -> BoxedKind {
        match self {
            Boxed::Bool(_) => BoxedKind::Bool,
            Boxed::Int(_) => BoxedKind::Int,
            Boxed::Float(_) => BoxedKind::Float,
            Boxed::Text(_) => BoxedKind::Text,
            Boxed::Proto(_) => BoxedKind::Proto,
            Boxed::List(_) => BoxedKind::List,
            Boxed::Sanitized { .. } => BoxedKind::Sanitized,
        }
    }
}

/// A value stored in a message slot.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Single(Value),
    Repeated(Vec<Value>),
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) value: FieldValue,
}

/// Contents of a message or builder. Slots hold field storage values
/// keyed by field number; unset fields have no slot.
#[derive(Debug, Clone)]
pub struct MessageData {
    type_name: String,
    pub(crate) slots: BTreeMap<i32, Slot>,
}

impl MessageData {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_set(&self, number: i32) -> bool {
        self.slots.contains_key(&number)
    }

    pub fn get(&self, number: i32) -> Option<&FieldValue> {
        self.slots.get(&number).map(|slot| &slot.value)
    }

    pub(crate) fn set(&mut self, number: i32, name: &str, value: FieldValue) {
        self.slots.insert(
            number,
            Slot {
                name: name.to_string(),
                value,
            },
        );
    }

    pub(crate) fn clear(&mut self, number: i32) {
        self.slots.remove(&number);
    }

    pub(crate) fn push(&mut self, number: i32, name: &str, value: Value) {
        match self.slots.get_mut(&number) {
            Some(Slot {
                value: FieldValue::Repeated(items),
                ..
            }) => items.push(value),
            _ => self.set(number, name, FieldValue::Repeated(vec![value])),
        }
    }
}

impl fmt::Display for MessageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.type_name)?;
        for (idx, slot) in self.slots.values().enumerate() {
            let sep = if idx == 0 { " " } else { ", " };
            match &slot.value {
                FieldValue::Single(value) => write!(f, "{}{}: {}", sep, slot.name, value)?,
                FieldValue::Repeated(items) => {
                    write!(f, "{}{}: [", sep, slot.name)?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", item)?;
                    }
                    write!(f, "]")?;
                }
            }
        }
        if self.slots.is_empty() {
            write!(f, "}}")
        } else {
            write!(f, " }}")
        }
    }
}

/// Heap objects.
#[derive(Debug)]
pub enum Object {
    Text(String),
    ByteString(Vec<u8>),
    ByteArray(Vec<u8>),
    Codec,
    /// Result of boxing a primitive.
    Wrapper(Value),
    Boxed(Boxed),
    Message(MessageData),
    Builder(RefCell<MessageData>),
    EnumConst {
        enum_name: String,
        number: i32,
    },
    OneofCase {
        key: String,
        number: i32,
    },
    /// Extension identifier: the static `name` declared on `owner`.
    Extension {
        owner: String,
        name: String,
    },
    List(RefCell<Vec<Value>>),
    /// Deferred value, materialized by `resolve`.
    Provider(Value),
}

impl Object {
    pub fn type_name(&self) -> String {
        match self {
            Object::Text(_) => "Text".to_string(),
            Object::ByteString(_) => "ByteString".to_string(),
            Object::ByteArray(_) => "byte[]".to_string(),
            Object::Codec => "Codec".to_string(),
            Object::Wrapper(inner) => format!("Wrapper<{}>", inner.describe()),
            Object::Boxed(boxed) => boxed.kind().name().to_string(),
            Object::Message(data) => data.type_name().to_string(),
            Object::Builder(data) => format!("{}$Builder", data.borrow().type_name()),
            Object::EnumConst { enum_name, .. } => enum_name.clone(),
            Object::OneofCase { key, .. } => format!("{}$Case", key),
            Object::Extension { .. } => "Extension".to_string(),
            Object::List(_) => "List".to_string(),
            Object::Provider(_) => "Provider".to_string(),
        }
    }

    pub fn is_instance_of(&self, ty: &RefType) -> bool {
        match (ty, self) {
            (RefType::Object, _) => true,
            (RefType::Text, Object::Text(_)) => true,
            (RefType::ByteString, Object::ByteString(_)) => true,
            (RefType::ByteArray, Object::ByteArray(_)) => true,
            (RefType::Codec, Object::Codec) => true,
            (RefType::List, Object::List(_)) => true,
            // Host values are their own providers.
            (RefType::Provider, Object::Provider(_) | Object::Boxed(_)) => true,
            (RefType::Boxed(BoxedKind::Any), Object::Boxed(_)) => true,
            (RefType::Boxed(kind), Object::Boxed(boxed)) => boxed.kind() == *kind,
            (RefType::Number, Object::Wrapper(inner)) => {
                inner.native_type().is_some_and(|ty| ty.is_numeric())
            }
            (RefType::Wrapper(prim), Object::Wrapper(inner)) => {
                inner.native_type().as_ref() == Some(prim)
            }
            (RefType::Message(name), Object::Message(data)) => data.type_name() == name,
            (RefType::Builder(name), Object::Builder(data)) => data.borrow().type_name() == name,
            (RefType::Enum(name), Object::EnumConst { enum_name, .. }) => enum_name == name,
            (RefType::OneofCase(name), Object::OneofCase { key, .. }) => key == name,
            (RefType::ExtendableMessage, Object::Message(_)) => true,
            (RefType::ExtendableBuilder, Object::Builder(_)) => true,
            (RefType::Extension, Object::Extension { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Text(s) => write!(f, "{:?}", s),
            Object::ByteString(bytes) | Object::ByteArray(bytes) => write!(f, "bytes{:?}", bytes),
            Object::Codec => write!(f, "base64"),
            Object::Wrapper(inner) => write!(f, "{}", inner),
            Object::Boxed(boxed) => match boxed {
                Boxed::Bool(b) => write!(f, "{}", b),
                Boxed::Int(n) => write!(f, "{}", n),
                Boxed::Float(x) => write!(f, "{}", x),
                Boxed::Text(s) => write!(f, "{:?}", s),
                Boxed::Proto(inner) => write!(f, "{}", inner),
                Boxed::List(items) => {
                    write!(f, "[")?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", item)?;
                    }
                    write!(f, "]")
                }
                Boxed::Sanitized { kind, content } => write!(f, "{}({:?})", kind, content),
            },
            Object::Message(data) => write!(f, "{}", data),
            Object::Builder(data) => write!(f, "builder of {}", data.borrow()),
            Object::EnumConst { enum_name, number } => write!(f, "{}#{}", enum_name, number),
            Object::OneofCase { key, number } => write!(f, "{}#{}", key, number),
            Object::Extension { owner, name } => write!(f, "{}.{}", owner, name),
            Object::List(items) => write!(f, "list of {}", items.borrow().len()),
            Object::Provider(inner) => write!(f, "provider({})", inner),
        }
    }
}
