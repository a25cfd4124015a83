//! Instruction definitions.
//!
//! Control flow is structured: branches, loops and local scopes are nested
//! op lists rather than raw jumps, so a spliced sequence can never jump
//! outside its own extent. Labels only exist in rendered listings.

use crate::types::{NativeType, RefType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a method is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Static,
    Instance,
}

/// A named operation on the target machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: RefType,
    pub name: String,
    pub kind: CallKind,
    pub params: Vec<NativeType>,
    /// `None` for operations that return nothing.
    pub returns: Option<NativeType>,
    /// The operation never produces `null`.
    pub non_null: bool,
}

impl MethodRef {
    pub fn instance(
        owner: RefType,
        name: impl Into<String>,
        params: Vec<NativeType>,
        returns: Option<NativeType>,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            kind: CallKind::Instance,
            params,
            returns,
            non_null: false,
        }
    }

    pub fn static_method(
        owner: RefType,
        name: impl Into<String>,
        params: Vec<NativeType>,
        returns: Option<NativeType>,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            kind: CallKind::Static,
            params,
            returns,
            non_null: false,
        }
    }

    /// Marks the result as never null.
    pub fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    pub fn is_static(&self) -> bool {
        self.kind == CallKind::Static
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.owner, self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        match &self.returns {
            Some(ret) => write!(f, ") -> {}", ret),
            None => write!(f, ")"),
        }
    }
}

/// A static field, used for extension identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: RefType,
    pub name: String,
    pub ty: NativeType,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} : {}", self.owner, self.name, self.ty)
    }
}

/// Constants that can be pushed directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
}

impl Constant {
    pub fn native_type(&self) -> NativeType {
        match self {
            Constant::Null => NativeType::null(),
            Constant::Bool(_) => NativeType::Bool,
            Constant::Int(_) => NativeType::Int,
            Constant::Long(_) => NativeType::Long,
            Constant::Double(_) => NativeType::Double,
            Constant::Text(_) => NativeType::text(),
        }
    }
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Local {
    pub index: u16,
    pub ty: NativeType,
}

/// A local declared by a [`Scope`], kept for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub local: Local,
}

/// Condition consumed by a branch or loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Test {
    /// Pops a reference, true when null.
    IsNull,
    /// Pops a reference, true when not null.
    NonNull,
    /// Pops a bool.
    IsTrue,
    /// Pops an int, true when zero.
    IsZero,
    /// Pops two ints, true when equal.
    IntEq,
    /// Pops two ints `a, b`, true when `a < b`.
    IntLt,
}

impl Test {
    /// Operand types popped by the test, deepest first.
    pub fn operands(self) -> Vec<NativeType> {
        match self {
            Test::IsNull | Test::NonNull => vec![NativeType::object(RefType::Object)],
            Test::IsTrue => vec![NativeType::Bool],
            Test::IsZero => vec![NativeType::Int],
            Test::IntEq | Test::IntLt => vec![NativeType::Int, NativeType::Int],
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Test::IsNull => "ifnull",
            Test::NonNull => "ifnonnull",
            Test::IsTrue => "ifne",
            Test::IsZero => "ifeq",
            Test::IntEq => "if_icmpeq",
            Test::IntLt => "if_icmplt",
        }
    }

    /// Mnemonic of the jump taken when the test fails.
    pub fn inverse_mnemonic(self) -> &'static str {
        match self {
            Test::IsNull => "ifnonnull",
            Test::NonNull => "ifnull",
            Test::IsTrue => "ifeq",
            Test::IsZero => "ifne",
            Test::IntEq => "if_icmpne",
            Test::IntLt => "if_icmpge",
        }
    }
}

/// Two-armed conditional; both arms end with the same stack shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub test: Test,
    pub then_ops: Vec<Op>,
    pub else_ops: Vec<Op>,
}

/// `while (condition; test) { body }`. The condition pushes exactly the
/// test operands and the body is stack-neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub condition: Vec<Op>,
    pub test: Test,
    pub body: Vec<Op>,
}

/// Lexical region owning its locals; they are released at exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub locals: Vec<LocalDecl>,
    pub body: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Push(Constant),
    Dup,
    Pop,
    Swap,
    Load(Local),
    Store(Local),
    Increment { local: Local, delta: i32 },
    Invoke(MethodRef),
    /// Like `Invoke`, but hands control to the surrounding scheduler
    /// which may pause the current unit until the call completes.
    Suspend(MethodRef),
    GetStatic(FieldRef),
    Convert { from: NativeType, to: NativeType },
    CheckCast(RefType),
    /// Wraps the primitive on top of the stack into its wrapper object.
    Box(NativeType),
    Branch(Branch),
    Loop(Loop),
    Scope(Scope),
}

impl Op {
    /// Shifts every local index by `offset`.
    pub(crate) fn relocate(&mut self, offset: u16) {
        match self {
            Op::Load(local) | Op::Store(local) | Op::Increment { local, .. } => {
                local.index += offset;
            }
            Op::Branch(branch) => {
                relocate_all(&mut branch.then_ops, offset);
                relocate_all(&mut branch.else_ops, offset);
            }
            Op::Loop(lp) => {
                relocate_all(&mut lp.condition, offset);
                relocate_all(&mut lp.body, offset);
            }
            Op::Scope(scope) => {
                for decl in &mut scope.locals {
                    decl.local.index += offset;
                }
                relocate_all(&mut scope.body, offset);
            }
            _ => {}
        }
    }
}

pub(crate) fn relocate_all(ops: &mut [Op], offset: u16) {
    if offset == 0 {
        return;
    }
    for op in ops {
        op.relocate(offset);
    }
}
