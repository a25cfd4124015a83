//! Typed compiled values.
//!
//! A [`TypedValue`] is an instruction sequence producing one value together
//! with the value's logical type. It is *boxed* when the sequence produces a
//! host-evaluator value and *native* otherwise.

use crate::error::CodegenError;
use crate::methods;
use rhizome_quill_ir::{
    BoxedKind, CodeBuilder, Constant, InstructionSequence, NativeType, RefType, Test,
};
use rhizome_quill_schema::SanitizedKind;
use std::fmt;

/// Logical type of a compiled value, as the expression language sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Any,
    Null,
    Bool,
    Int,
    Float,
    Text,
    Message(String),
    Sanitized(SanitizedKind),
    List(Box<ValueType>),
    /// The literal `[]`, known empty at generation time.
    EmptyList,
}

impl ValueType {
    pub fn list(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    /// Runtime tag carried by the boxed form.
    pub fn boxed_kind(&self) -> BoxedKind {
        match self {
            ValueType::Any | ValueType::Null => BoxedKind::Any,
            ValueType::Bool => BoxedKind::Bool,
            ValueType::Int => BoxedKind::Int,
            ValueType::Float => BoxedKind::Float,
            ValueType::Text => BoxedKind::Text,
            ValueType::Message(_) => BoxedKind::Proto,
            ValueType::Sanitized(_) => BoxedKind::Sanitized,
            ValueType::List(_) | ValueType::EmptyList => BoxedKind::List,
        }
    }

    /// Unboxed representation. Sanitized values travel as plain text.
    pub fn native_type(&self) -> NativeType {
        match self {
            ValueType::Any => NativeType::boxed(BoxedKind::Any),
            ValueType::Null => NativeType::null(),
            ValueType::Bool => NativeType::Bool,
            ValueType::Int => NativeType::Long,
            ValueType::Float => NativeType::Double,
            ValueType::Text | ValueType::Sanitized(_) => NativeType::text(),
            ValueType::Message(name) => NativeType::message(name),
            ValueType::List(_) | ValueType::EmptyList => NativeType::object(RefType::List),
        }
    }

    pub fn boxed_type(&self) -> NativeType {
        NativeType::boxed(self.boxed_kind())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "?"),
            ValueType::Null => write!(f, "null"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "string"),
            ValueType::Message(name) => write!(f, "{}", name),
            ValueType::Sanitized(kind) => write!(f, "{}", kind),
            ValueType::List(element) => write!(f, "list<{}>", element),
            ValueType::EmptyList => write!(f, "list<?>"),
        }
    }
}

/// An instruction sequence producing one value, with its logical type.
#[derive(Debug, Clone)]
pub struct TypedValue {
    code: InstructionSequence,
    native: NativeType,
    ty: ValueType,
}

impl TypedValue {
    /// Wraps a finished expression sequence.
    pub fn new(code: InstructionSequence, ty: ValueType) -> Result<Self, CodegenError> {
        let native = code.output().cloned().ok_or_else(|| CodegenError::Unsupported {
            context: ty.to_string(),
            what: "statement sequence as a value".to_string(),
        })?;
        Ok(Self { code, native, ty })
    }

    fn constant(constant: Constant, ty: ValueType) -> Self {
        Self {
            native: constant.native_type(),
            code: InstructionSequence::constant(constant),
            ty,
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::constant(Constant::Bool(value), ValueType::Bool)
    }

    pub fn long(value: i64) -> Self {
        Self::constant(Constant::Long(value), ValueType::Int)
    }

    pub fn double(value: f64) -> Self {
        Self::constant(Constant::Double(value), ValueType::Float)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::constant(Constant::Text(value.into()), ValueType::Text)
    }

    pub fn null() -> Self {
        Self::constant(Constant::Null, ValueType::Null)
    }

    /// A boxed sanitized-content literal.
    pub fn sanitized(kind: SanitizedKind, content: impl Into<String>) -> Result<Self, CodegenError> {
        let mut b = CodeBuilder::new();
        b.push_const(Constant::Text(content.into()));
        b.push_const(Constant::Int(kind.ordinal()));
        b.invoke(&methods::ordain())?;
        Self::new(b.finish_expression(true)?, ValueType::Sanitized(kind))
    }

    /// A boxed list literal. Each item is boxed and wrapped in a provider,
    /// mirroring how list values reach generated code.
    pub fn list_of(element: ValueType, items: Vec<TypedValue>) -> Result<Self, CodegenError> {
        let mut b = CodeBuilder::new();
        b.invoke(&methods::new_list())?;
        for item in items {
            if !item.code.inputs().is_empty() {
                return Err(CodegenError::Unsupported {
                    context: format!("list<{}>", element),
                    what: "list item with inputs".to_string(),
                });
            }
            b.dup()?;
            b.append(&item.code)?;
            emit_box(&mut b, &item.ty, item.is_nullable())?;
            b.invoke(&methods::provider())?;
            b.invoke(&methods::list_add())?;
            b.pop()?;
        }
        b.invoke(&methods::for_value(BoxedKind::List))?;
        Self::new(b.finish_expression(true)?, ValueType::list(element))
    }

    /// The literal `[]`.
    pub fn empty_list() -> Result<Self, CodegenError> {
        let mut b = CodeBuilder::new();
        b.invoke(&methods::new_list())?;
        b.invoke(&methods::for_value(BoxedKind::List))?;
        Self::new(b.finish_expression(true)?, ValueType::EmptyList)
    }

    /// A value supplied on the stack by the caller, boxed or native.
    pub fn input(ty: ValueType, boxed: bool, nullable: bool) -> Result<Self, CodegenError> {
        let native = if boxed {
            ty.boxed_type()
        } else {
            ty.native_type()
        };
        let b = CodeBuilder::with_inputs(vec![native]);
        Self::new(b.finish_expression(!nullable)?, ty)
    }

    pub fn code(&self) -> &InstructionSequence {
        &self.code
    }

    pub fn value_type(&self) -> &ValueType {
        &self.ty
    }

    pub fn native_type(&self) -> &NativeType {
        &self.native
    }

    pub fn is_boxed(&self) -> bool {
        self.native.boxed_kind().is_some()
    }

    pub fn is_nullable(&self) -> bool {
        !self.code.is_non_null()
    }

    pub fn as_nullable(mut self) -> Self {
        self.code = self.code.with_non_null(false);
        self
    }

    pub fn into_parts(self) -> (InstructionSequence, ValueType) {
        (self.code, self.ty)
    }

    fn extend<F>(self, ty: ValueType, emit: F) -> Result<Self, CodegenError>
    where
        F: FnOnce(&mut CodeBuilder, bool) -> Result<(), CodegenError>,
    {
        let nullable = self.is_nullable();
        let mut b = CodeBuilder::with_inputs(self.code.inputs().to_vec());
        b.append(&self.code)?;
        emit(&mut b, nullable)?;
        Self::new(b.finish_expression(!nullable)?, ty)
    }

    /// Boxed form of the value. Null stays null.
    pub fn box_value(self) -> Result<Self, CodegenError> {
        if self.is_boxed() {
            return Ok(self);
        }
        let ty = self.ty.clone();
        self.extend(ty.clone(), |b, nullable| emit_box(b, &ty, nullable))
    }

    /// Native form of the value as `target`.
    pub fn unbox_as(self, target: &NativeType) -> Result<Self, CodegenError> {
        let ty = self.ty.clone();
        self.extend(ty, |b, _| emit_unbox(b, target))
    }

    /// Runtime-checked downcast.
    pub fn cast(self, to: RefType) -> Result<Self, CodegenError> {
        let ty = self.ty.clone();
        self.extend(ty, |b, _| Ok(b.check_cast(to)?))
    }
}

/// Boxes the value on top of the stack. A nullable reference is tested
/// first so null stays null.
pub(crate) fn emit_box(b: &mut CodeBuilder, ty: &ValueType, nullable: bool) -> Result<(), CodegenError> {
    let top = b.top()?.clone();
    if top.boxed_kind().is_some() {
        return Ok(());
    }
    if nullable && !top.is_primitive() {
        b.dup()?;
        return b.branch(
            Test::IsNull,
            |null| {
                null.pop()?;
                null.push_null();
                Ok(())
            },
            |present| box_top(present, ty),
        );
    }
    box_top(b, ty)
}

fn box_top(b: &mut CodeBuilder, ty: &ValueType) -> Result<(), CodegenError> {
    let top = b.top()?.clone();
    match (&top, ty) {
        (NativeType::Bool, _) => b.invoke(&methods::for_value(BoxedKind::Bool))?,
        (NativeType::Int | NativeType::Long, _) => {
            b.convert(NativeType::Long)?;
            b.invoke(&methods::for_value(BoxedKind::Int))?;
        }
        (NativeType::Float | NativeType::Double, _) => {
            b.convert(NativeType::Double)?;
            b.invoke(&methods::for_value(BoxedKind::Float))?;
        }
        (NativeType::Ref(r), ValueType::Sanitized(kind)) if **r == RefType::Text => {
            b.push_const(Constant::Int(kind.ordinal()));
            b.invoke(&methods::ordain())?;
        }
        (NativeType::Ref(r), _) => match r.as_ref() {
            RefType::Text => b.invoke(&methods::for_value(BoxedKind::Text))?,
            RefType::Message(_) => b.invoke(&methods::for_value(BoxedKind::Proto))?,
            RefType::List => b.invoke(&methods::for_value(BoxedKind::List))?,
            RefType::Null => b.check_cast(RefType::Boxed(BoxedKind::Any))?,
            _ => {
                return Err(CodegenError::Unsupported {
                    context: ty.to_string(),
                    what: format!("boxing of {}", top),
                });
            }
        },
    }
    Ok(())
}

/// Converts the value on top of the stack to the native `target`. Boxed
/// values are unwrapped; native numbers are widened or narrowed.
pub(crate) fn emit_unbox(b: &mut CodeBuilder, target: &NativeType) -> Result<(), CodegenError> {
    let top = b.top()?.clone();
    if top.boxed_kind().is_none() {
        if top.is_assignable_to(target) {
            return Ok(());
        }
        if top.is_numeric() && target.is_numeric() {
            b.convert(target.clone())?;
            return Ok(());
        }
        if let (Some(RefType::Object), NativeType::Ref(_)) = (top.as_ref_type(), target) {
            b.check_cast(RefType::Boxed(BoxedKind::Any))?;
            return emit_unbox(b, target);
        }
        return Err(CodegenError::Unsupported {
            context: format!("unbox to {}", target),
            what: format!("value of type {}", top),
        });
    }
    match target {
        NativeType::Bool => b.invoke(&methods::unbox("boolean_value", NativeType::Bool))?,
        NativeType::Int | NativeType::Long => {
            b.invoke(&methods::unbox("long_value", NativeType::Long))?;
            b.convert(target.clone())?;
        }
        NativeType::Float | NativeType::Double => {
            b.invoke(&methods::unbox("float_value", NativeType::Double))?;
            b.convert(target.clone())?;
        }
        NativeType::Ref(r) => match r.as_ref() {
            RefType::Text => b.invoke(&methods::unbox("string_value", NativeType::text()))?,
            RefType::List => {
                b.check_cast(RefType::Boxed(BoxedKind::List))?;
                b.invoke(&methods::as_list())?;
            }
            RefType::Object => {
                b.check_cast(RefType::Boxed(BoxedKind::Proto))?;
                b.invoke(&methods::get_proto())?;
            }
            RefType::Message(_) => {
                b.check_cast(RefType::Boxed(BoxedKind::Proto))?;
                b.invoke(&methods::get_proto())?;
                b.check_cast(r.as_ref().clone())?;
            }
            _ => {
                return Err(CodegenError::Unsupported {
                    context: format!("unbox to {}", target),
                    what: format!("value of type {}", top),
                });
            }
        },
    }
    Ok(())
}
