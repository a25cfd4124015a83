//! Materializing list arguments before they are iterated.

use crate::methods;
use rhizome_quill_ir::{CodeBuilder, EmitError, InstructionSequence, NativeType, RefType};

/// Produces a sequence `(List) -> List` that waits until every element
/// provider in the list is resolved.
///
/// The wait is a suspension point, so how it is emitted depends on the
/// surrounding generator.
pub trait ListResolver {
    fn resolve_list(&self) -> Result<InstructionSequence, EmitError>;
}

/// Resolves every element in place with a single suspending call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateResolver;

impl ListResolver for ImmediateResolver {
    fn resolve_list(&self) -> Result<InstructionSequence, EmitError> {
        let mut b = CodeBuilder::with_inputs(vec![NativeType::object(RefType::List)]);
        b.suspend(&methods::resolve_all())?;
        b.finish_expression(true)
    }
}
