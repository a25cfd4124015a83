//! Target-machine model for Quill.
//!
//! This crate defines what generated code is made of:
//!
//! - [`NativeType`] / [`RefType`]: operand-stack slot types
//! - [`Op`]: instructions, with structured branches, loops and scopes
//! - [`CodeBuilder`]: the stack-tracking assembler generators emit through
//! - [`InstructionSequence`]: a finished sequence and its net stack effect
//!
//! Example listing of a presence-checked read:
//!
//! ```text
//! ; () -> IntValue
//!     invokestatic demo.Person.default_instance() -> demo.Person
//!     dup
//!     invokevirtual demo.Person.has_age() -> bool
//!     ifne L0
//!     pop
//!     push Null
//!     goto L1
//! L0:
//!     invokevirtual demo.Person.get_age() -> int
//!     ...
//! L1:
//! ```

mod builder;
mod ops;
mod sequence;
mod types;

pub use builder::{CodeBuilder, EmitError};
pub use ops::{
    Branch, CallKind, Constant, FieldRef, Local, LocalDecl, Loop, MethodRef, Op, Scope, Test,
};
pub use sequence::InstructionSequence;
pub use types::{BoxedKind, NativeType, RefType};

#[cfg(test)]
mod tests;
