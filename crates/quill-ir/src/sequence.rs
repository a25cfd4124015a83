//! Finished instruction sequences and their listings.

use crate::ops::{CallKind, Constant, Op};
use crate::types::NativeType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered ops plus their net effect on the operand stack.
///
/// A sequence consumes `inputs` (deepest first) and leaves `output` on the
/// stack; it never leaves anything else behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionSequence {
    ops: Vec<Op>,
    inputs: Vec<NativeType>,
    output: Option<NativeType>,
    non_null: bool,
    max_locals: u16,
}

impl InstructionSequence {
    pub(crate) fn new(
        ops: Vec<Op>,
        inputs: Vec<NativeType>,
        output: Option<NativeType>,
        non_null: bool,
        max_locals: u16,
    ) -> Self {
        Self {
            ops,
            inputs,
            output,
            non_null,
            max_locals,
        }
    }

    /// A sequence pushing one constant.
    pub fn constant(constant: Constant) -> Self {
        let output = constant.native_type();
        let non_null = constant != Constant::Null;
        Self::new(vec![Op::Push(constant)], Vec::new(), Some(output), non_null, 0)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn inputs(&self) -> &[NativeType] {
        &self.inputs
    }

    pub fn output(&self) -> Option<&NativeType> {
        self.output.as_ref()
    }

    /// The produced value is never null.
    pub fn is_non_null(&self) -> bool {
        self.non_null
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Same ops, different nullability claim.
    pub fn with_non_null(mut self, non_null: bool) -> Self {
        self.non_null = non_null;
        self
    }

    /// Number of ops, counting nested regions.
    pub fn len(&self) -> usize {
        count_ops(&self.ops)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether any op (at any depth) satisfies `pred`.
    pub fn contains(&self, pred: impl Fn(&Op) -> bool + Copy) -> bool {
        any_op(&self.ops, pred)
    }
}

fn count_ops(ops: &[Op]) -> usize {
    ops.iter()
        .map(|op| match op {
            Op::Branch(branch) => 1 + count_ops(&branch.then_ops) + count_ops(&branch.else_ops),
            Op::Loop(lp) => 1 + count_ops(&lp.condition) + count_ops(&lp.body),
            Op::Scope(scope) => count_ops(&scope.body),
            _ => 1,
        })
        .sum()
}

fn any_op(ops: &[Op], pred: impl Fn(&Op) -> bool + Copy) -> bool {
    ops.iter().any(|op| {
        pred(op)
            || match op {
                Op::Branch(branch) => {
                    any_op(&branch.then_ops, pred) || any_op(&branch.else_ops, pred)
                }
                Op::Loop(lp) => any_op(&lp.condition, pred) || any_op(&lp.body, pred),
                Op::Scope(scope) => any_op(&scope.body, pred),
                _ => false,
            }
    })
}

/// Flattens structured ops into a labelled listing.
struct Listing<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    next_label: usize,
}

impl Listing<'_, '_> {
    fn label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    fn line(&mut self, text: impl fmt::Display) -> fmt::Result {
        writeln!(self.f, "    {}", text)
    }

    fn mark(&mut self, label: &str) -> fmt::Result {
        writeln!(self.f, "{}:", label)
    }

    fn ops(&mut self, ops: &[Op]) -> fmt::Result {
        for op in ops {
            self.op(op)?;
        }
        Ok(())
    }

    fn op(&mut self, op: &Op) -> fmt::Result {
        match op {
            Op::Push(constant) => self.line(format_args!("push {:?}", constant)),
            Op::Dup => self.line("dup"),
            Op::Pop => self.line("pop"),
            Op::Swap => self.line("swap"),
            Op::Load(local) => self.line(format_args!("load {}", local.index)),
            Op::Store(local) => self.line(format_args!("store {}", local.index)),
            Op::Increment { local, delta } => {
                self.line(format_args!("iinc {} {}", local.index, delta))
            }
            Op::Invoke(method) => {
                let mnemonic = match method.kind {
                    CallKind::Static => "invokestatic",
                    CallKind::Instance => "invokevirtual",
                };
                self.line(format_args!("{} {}", mnemonic, method))
            }
            Op::Suspend(method) => self.line(format_args!("suspend {}", method)),
            Op::GetStatic(field) => self.line(format_args!("getstatic {}", field)),
            Op::Convert { from, to } => self.line(format_args!("convert {} -> {}", from, to)),
            Op::CheckCast(ty) => self.line(format_args!("checkcast {}", ty)),
            Op::Box(prim) => self.line(format_args!("valueof {}", prim)),
            Op::Branch(branch) => {
                let then_label = self.label();
                let end_label = self.label();
                self.line(format_args!("{} {}", branch.test.mnemonic(), then_label))?;
                self.ops(&branch.else_ops)?;
                self.line(format_args!("goto {}", end_label))?;
                self.mark(&then_label)?;
                self.ops(&branch.then_ops)?;
                self.mark(&end_label)
            }
            Op::Loop(lp) => {
                let start_label = self.label();
                let end_label = self.label();
                self.mark(&start_label)?;
                self.ops(&lp.condition)?;
                self.line(format_args!("{} {}", lp.test.inverse_mnemonic(), end_label))?;
                self.ops(&lp.body)?;
                self.line(format_args!("goto {}", start_label))?;
                self.mark(&end_label)
            }
            Op::Scope(scope) => {
                for decl in &scope.locals {
                    self.line(format_args!(
                        ".local {} {} : {}",
                        decl.local.index, decl.name, decl.local.ty
                    ))?;
                }
                self.ops(&scope.body)?;
                for decl in &scope.locals {
                    self.line(format_args!(".release {}", decl.local.index))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for InstructionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs = self
            .inputs
            .iter()
            .map(|ty| ty.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let output = match &self.output {
            Some(ty) if self.non_null => format!("{} (non-null)", ty),
            Some(ty) => ty.to_string(),
            None => "void".to_string(),
        };
        writeln!(f, "; ({}) -> {}", inputs, output)?;
        let mut listing = Listing { f, next_label: 0 };
        listing.ops(&self.ops)
    }
}
