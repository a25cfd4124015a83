//! Reference stack machine for Quill.
//!
//! Executes [`InstructionSequence`](rhizome_quill_ir::InstructionSequence)s
//! against dynamic messages described by a
//! [`Schema`](rhizome_quill_schema::Schema). Generated message methods,
//! host-value boxing and the runtime library are implemented natively.

mod error;
mod machine;
mod natives;
mod value;

pub use error::Fault;
pub use machine::{Machine, execute};
pub use value::{Boxed, FieldValue, MessageData, Object, Value};

#[cfg(test)]
mod tests;
