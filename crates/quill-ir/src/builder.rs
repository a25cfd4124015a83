//! Stack-tracking assembler.
//!
//! `CodeBuilder` records ops while simulating the operand-stack type
//! signature, so malformed sequences are rejected when they are generated
//! instead of when the machine verifies them.

use crate::ops::{Branch, Constant, FieldRef, Local, LocalDecl, Loop, MethodRef, Op, Scope, Test};
use crate::sequence::InstructionSequence;
use crate::types::{NativeType, RefType};
use thiserror::Error;

/// Errors raised while assembling a sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmitError {
    #[error("stack underflow in {op}")]
    StackUnderflow { op: String },

    #[error("type mismatch in {op}: expected {expected}, found {found}")]
    TypeMismatch {
        op: String,
        expected: NativeType,
        found: NativeType,
    },

    #[error("{op} requires a primitive, found {found}")]
    NotPrimitive { op: String, found: NativeType },

    #[error("branch arms disagree: then leaves [{then_stack}], else leaves [{else_stack}]")]
    BranchMismatch {
        then_stack: String,
        else_stack: String,
    },

    #[error("{what} must leave the stack unchanged: expected [{expected}], found [{found}]")]
    NotNeutral {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("sequence must leave exactly one value, found [{found}]")]
    NotAnExpression { found: String },
}

fn render_stack(stack: &[NativeType]) -> String {
    stack
        .iter()
        .map(|ty| ty.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Assembler for one sequence (or one arm of a structured op).
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    ops: Vec<Op>,
    inputs: Vec<NativeType>,
    stack: Vec<NativeType>,
    next_local: u16,
    max_locals: u16,
    declared: Vec<LocalDecl>,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    /// Creates a builder with an empty stack.
    pub fn new() -> Self {
        Self::with_inputs(Vec::new())
    }

    /// Creates a builder whose stack starts with `inputs` (deepest first).
    pub fn with_inputs(inputs: Vec<NativeType>) -> Self {
        Self {
            ops: Vec::new(),
            stack: inputs.clone(),
            inputs,
            next_local: 0,
            max_locals: 0,
            declared: Vec::new(),
        }
    }

    /// Child builder for a nested region, sharing stack and local numbering.
    fn fork(&self) -> Self {
        Self {
            ops: Vec::new(),
            inputs: Vec::new(),
            stack: self.stack.clone(),
            next_local: self.next_local,
            max_locals: self.next_local,
            declared: Vec::new(),
        }
    }

    /// Takes over the locals a nested region declared outside any inner
    /// scope. They stay live until the enclosing scope ends.
    fn adopt_locals(&mut self, region: &mut CodeBuilder) {
        self.next_local = self.next_local.max(region.next_local);
        self.max_locals = self.max_locals.max(region.max_locals);
        self.declared.append(&mut region.declared);
    }

    pub fn stack(&self) -> &[NativeType] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Type currently on top of the stack.
    pub fn top(&self) -> Result<&NativeType, EmitError> {
        self.stack.last().ok_or_else(|| EmitError::StackUnderflow {
            op: "top".to_string(),
        })
    }

    fn pop_type(&mut self, op: &str) -> Result<NativeType, EmitError> {
        self.stack.pop().ok_or_else(|| EmitError::StackUnderflow {
            op: op.to_string(),
        })
    }

    fn pop_expect(&mut self, expected: &NativeType, op: &str) -> Result<NativeType, EmitError> {
        let found = self.pop_type(op)?;
        if !found.is_assignable_to(expected) {
            return Err(EmitError::TypeMismatch {
                op: op.to_string(),
                expected: expected.clone(),
                found,
            });
        }
        Ok(found)
    }

    fn pop_test_operands(&mut self, test: Test) -> Result<(), EmitError> {
        for expected in test.operands().iter().rev() {
            self.pop_expect(expected, test.mnemonic())?;
        }
        Ok(())
    }

    pub fn push_const(&mut self, constant: Constant) {
        self.stack.push(constant.native_type());
        self.ops.push(Op::Push(constant));
    }

    pub fn push_null(&mut self) {
        self.push_const(Constant::Null);
    }

    pub fn dup(&mut self) -> Result<(), EmitError> {
        let top = self.top()?.clone();
        self.stack.push(top);
        self.ops.push(Op::Dup);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<(), EmitError> {
        self.pop_type("pop")?;
        self.ops.push(Op::Pop);
        Ok(())
    }

    pub fn swap(&mut self) -> Result<(), EmitError> {
        let a = self.pop_type("swap")?;
        let b = self.pop_type("swap")?;
        self.stack.push(a);
        self.stack.push(b);
        self.ops.push(Op::Swap);
        Ok(())
    }

    /// Calls `method`, popping its receiver and arguments.
    pub fn invoke(&mut self, method: &MethodRef) -> Result<(), EmitError> {
        self.apply_call(method)?;
        self.ops.push(Op::Invoke(method.clone()));
        Ok(())
    }

    /// Calls `method` at a suspension point.
    pub fn suspend(&mut self, method: &MethodRef) -> Result<(), EmitError> {
        self.apply_call(method)?;
        self.ops.push(Op::Suspend(method.clone()));
        Ok(())
    }

    fn apply_call(&mut self, method: &MethodRef) -> Result<(), EmitError> {
        let op = format!("call {}.{}", method.owner, method.name);
        for param in method.params.iter().rev() {
            self.pop_expect(param, &op)?;
        }
        if !method.is_static() {
            self.pop_expect(&NativeType::object(method.owner.clone()), &op)?;
        }
        if let Some(ret) = &method.returns {
            self.stack.push(ret.clone());
        }
        Ok(())
    }

    pub fn get_static(&mut self, field: &FieldRef) {
        self.stack.push(field.ty.clone());
        self.ops.push(Op::GetStatic(field.clone()));
    }

    /// Numeric conversion of the top of the stack. A no-op when the type
    /// already matches.
    pub fn convert(&mut self, to: NativeType) -> Result<(), EmitError> {
        let from = self.pop_type("convert")?;
        if from == to {
            self.stack.push(from);
            return Ok(());
        }
        if !from.is_numeric() {
            return Err(EmitError::NotPrimitive {
                op: format!("convert to {}", to),
                found: from,
            });
        }
        if !to.is_numeric() {
            return Err(EmitError::NotPrimitive {
                op: format!("convert from {}", from),
                found: to,
            });
        }
        self.stack.push(to.clone());
        self.ops.push(Op::Convert { from, to });
        Ok(())
    }

    /// Runtime-checked downcast of the reference on top of the stack.
    pub fn check_cast(&mut self, to: RefType) -> Result<(), EmitError> {
        let op = format!("checkcast {}", to);
        let from = self.pop_expect(&NativeType::object(RefType::Object), &op)?;
        // An upcast needs no instruction.
        if from.is_assignable_to(&NativeType::object(to.clone())) && from != NativeType::null() {
            self.stack.push(from);
            return Ok(());
        }
        self.stack.push(NativeType::object(to.clone()));
        self.ops.push(Op::CheckCast(to));
        Ok(())
    }

    /// Wraps the primitive on top of the stack (`valueOf`).
    pub fn box_primitive(&mut self) -> Result<(), EmitError> {
        let prim = self.pop_type("box")?;
        if !prim.is_primitive() {
            return Err(EmitError::NotPrimitive {
                op: "box".to_string(),
                found: prim,
            });
        }
        self.stack
            .push(NativeType::object(RefType::Wrapper(prim.clone())));
        self.ops.push(Op::Box(prim));
        Ok(())
    }

    /// Allocates a local in the current region.
    pub fn declare_local(&mut self, name: impl Into<String>, ty: NativeType) -> Local {
        let local = Local {
            index: self.next_local,
            ty,
        };
        self.next_local += 1;
        self.max_locals = self.max_locals.max(self.next_local);
        self.declared.push(LocalDecl {
            name: name.into(),
            local: local.clone(),
        });
        local
    }

    pub fn load(&mut self, local: &Local) {
        self.stack.push(local.ty.clone());
        self.ops.push(Op::Load(local.clone()));
    }

    pub fn store(&mut self, local: &Local) -> Result<(), EmitError> {
        self.pop_expect(&local.ty, "store")?;
        self.ops.push(Op::Store(local.clone()));
        Ok(())
    }

    pub fn increment(&mut self, local: &Local, delta: i32) -> Result<(), EmitError> {
        if local.ty != NativeType::Int {
            return Err(EmitError::TypeMismatch {
                op: "iinc".to_string(),
                expected: NativeType::Int,
                found: local.ty.clone(),
            });
        }
        self.ops.push(Op::Increment {
            local: local.clone(),
            delta,
        });
        Ok(())
    }

    /// Splices `seq` in place: its inputs are popped and its output pushed.
    /// Locals used by `seq` are renumbered above the ones in use here.
    pub fn append(&mut self, seq: &InstructionSequence) -> Result<(), EmitError> {
        for input in seq.inputs().iter().rev() {
            self.pop_expect(input, "append")?;
        }
        if let Some(output) = seq.output() {
            self.stack.push(output.clone());
        }
        let offset = self.next_local;
        let mut ops = seq.ops().to_vec();
        crate::ops::relocate_all(&mut ops, offset);
        self.ops.extend(ops);
        self.max_locals = self.max_locals.max(offset + seq.max_locals());
        Ok(())
    }

    /// Emits `if (test) { then_arm } else { else_arm }`.
    ///
    /// The test operands are consumed before either arm runs. Both arms must
    /// leave stacks that merge slot by slot.
    pub fn branch<E, T, F>(&mut self, test: Test, then_arm: T, else_arm: F) -> Result<(), E>
    where
        E: From<EmitError>,
        T: FnOnce(&mut CodeBuilder) -> Result<(), E>,
        F: FnOnce(&mut CodeBuilder) -> Result<(), E>,
    {
        self.pop_test_operands(test)?;

        let mut then_builder = self.fork();
        then_arm(&mut then_builder)?;
        let mut else_builder = self.fork();
        else_arm(&mut else_builder)?;

        let merged = merge_stacks(&then_builder.stack, &else_builder.stack)?;
        tracing::trace!(test = test.mnemonic(), depth = merged.len(), "merged branch");

        // Arms are exclusive, so they may share local numbers.
        self.adopt_locals(&mut then_builder);
        self.adopt_locals(&mut else_builder);
        self.stack = merged;
        self.ops.push(Op::Branch(Branch {
            test,
            then_ops: then_builder.ops,
            else_ops: else_builder.ops,
        }));
        Ok(())
    }

    /// Emits `while (condition; test) { body }`.
    pub fn while_loop<E, C, B>(&mut self, condition: C, test: Test, body: B) -> Result<(), E>
    where
        E: From<EmitError>,
        C: FnOnce(&mut CodeBuilder) -> Result<(), E>,
        B: FnOnce(&mut CodeBuilder) -> Result<(), E>,
    {
        let mut cond_builder = self.fork();
        condition(&mut cond_builder)?;
        cond_builder.pop_test_operands(test)?;
        self.expect_unchanged("loop condition", &cond_builder.stack)?;
        self.adopt_locals(&mut cond_builder);

        let mut body_builder = self.fork();
        body(&mut body_builder)?;
        self.expect_unchanged("loop body", &body_builder.stack)?;
        self.adopt_locals(&mut body_builder);
        self.ops.push(Op::Loop(Loop {
            condition: cond_builder.ops,
            test,
            body: body_builder.ops,
        }));
        Ok(())
    }

    /// Opens a lexical region. Locals declared inside are released when
    /// `body` returns.
    pub fn scope<E, B>(&mut self, body: B) -> Result<(), E>
    where
        E: From<EmitError>,
        B: FnOnce(&mut CodeBuilder) -> Result<(), E>,
    {
        let mut inner = self.fork();
        body(&mut inner)?;
        self.max_locals = self.max_locals.max(inner.max_locals);
        self.stack = inner.stack;
        self.ops.push(Op::Scope(Scope {
            locals: inner.declared,
            body: inner.ops,
        }));
        Ok(())
    }

    fn expect_unchanged(&self, what: &'static str, found: &[NativeType]) -> Result<(), EmitError> {
        if found != self.stack.as_slice() {
            return Err(EmitError::NotNeutral {
                what,
                expected: render_stack(&self.stack),
                found: render_stack(found),
            });
        }
        Ok(())
    }

    /// Finishes a sequence that leaves exactly one value.
    pub fn finish_expression(self, non_null: bool) -> Result<InstructionSequence, EmitError> {
        if self.stack.len() != 1 {
            return Err(EmitError::NotAnExpression {
                found: render_stack(&self.stack),
            });
        }
        let output = self.stack[0].clone();
        Ok(InstructionSequence::new(
            self.ops,
            self.inputs,
            Some(output),
            non_null,
            self.max_locals,
        ))
    }

    /// Finishes a sequence that consumes its inputs and leaves nothing.
    pub fn finish_statement(self) -> Result<InstructionSequence, EmitError> {
        if !self.stack.is_empty() {
            return Err(EmitError::NotNeutral {
                what: "statement",
                expected: String::new(),
                found: render_stack(&self.stack),
            });
        }
        Ok(InstructionSequence::new(
            self.ops,
            self.inputs,
            None,
            false,
            self.max_locals,
        ))
    }
}

fn merge_stacks(a: &[NativeType], b: &[NativeType]) -> Result<Vec<NativeType>, EmitError> {
    let mismatch = || EmitError::BranchMismatch {
        then_stack: render_stack(a),
        else_stack: render_stack(b),
    };
    if a.len() != b.len() {
        return Err(mismatch());
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| x.merge(y).ok_or_else(mismatch))
        .collect()
}
