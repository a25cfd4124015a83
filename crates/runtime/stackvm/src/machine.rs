//! The interpreter loop.

use crate::error::Fault;
use crate::natives::{self, Call};
use crate::value::{MessageData, Object, Value};
use rhizome_quill_ir::{
    Constant, InstructionSequence, Local, MethodRef, NativeType, Op, RefType, Test,
};
use rhizome_quill_schema::Schema;
use std::collections::HashMap;

/// Executes instruction sequences against dynamic messages described by a
/// schema.
pub struct Machine<'s> {
    schema: &'s Schema,
    default_instances: HashMap<String, Value>,
    suspensions: usize,
}

struct Frame {
    stack: Vec<Value>,
    locals: Vec<Value>,
}

impl Frame {
    fn pop(&mut self, op: &str) -> Result<Value, Fault> {
        self.stack
            .pop()
            .ok_or_else(|| Fault::StackUnderflow(op.to_string()))
    }

    fn top(&self, op: &str) -> Result<&Value, Fault> {
        self.stack
            .last()
            .ok_or_else(|| Fault::StackUnderflow(op.to_string()))
    }

    fn local(&mut self, local: &Local) -> Result<&mut Value, Fault> {
        self.locals
            .get_mut(usize::from(local.index))
            .ok_or_else(|| Fault::IllegalArgument(format!("local {} out of range", local.index)))
    }
}

impl<'s> Machine<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            default_instances: HashMap::new(),
            suspensions: 0,
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Number of suspension points passed so far.
    pub fn suspensions(&self) -> usize {
        self.suspensions
    }

    /// Runs `seq` with `inputs` on the stack (deepest first) and returns
    /// its output, if it has one.
    pub fn run(
        &mut self,
        seq: &InstructionSequence,
        inputs: Vec<Value>,
    ) -> Result<Option<Value>, Fault> {
        if inputs.len() != seq.inputs().len() {
            return Err(Fault::IllegalArgument(format!(
                "sequence takes {} inputs, got {}",
                seq.inputs().len(),
                inputs.len()
            )));
        }
        let mut frame = Frame {
            stack: inputs,
            locals: vec![Value::Null; usize::from(seq.max_locals())],
        };
        self.exec_all(&mut frame, seq.ops())?;
        match seq.output() {
            Some(_) => frame.pop("result").map(Some),
            None => Ok(None),
        }
    }

    /// The shared empty instance of a message type.
    pub fn default_instance(&mut self, type_name: &str) -> Result<Value, Fault> {
        if let Some(value) = self.default_instances.get(type_name) {
            return Ok(value.clone());
        }
        if self.schema.message(type_name).is_none() {
            return Err(Fault::UnknownMethod(format!("{}.default_instance", type_name)));
        }
        let value = Value::object(Object::Message(MessageData::new(type_name)));
        self.default_instances
            .insert(type_name.to_string(), value.clone());
        Ok(value)
    }

    fn exec_all(&mut self, frame: &mut Frame, ops: &[Op]) -> Result<(), Fault> {
        for op in ops {
            self.exec(frame, op)?;
        }
        Ok(())
    }

    fn exec(&mut self, frame: &mut Frame, op: &Op) -> Result<(), Fault> {
        tracing::trace!(?op, depth = frame.stack.len(), "exec");
        match op {
            Op::Push(constant) => frame.stack.push(match constant {
                Constant::Null => Value::Null,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(n) => Value::Int(*n),
                Constant::Long(n) => Value::Long(*n),
                Constant::Double(x) => Value::Double(*x),
                Constant::Text(s) => Value::text(s.clone()),
            }),
            Op::Dup => {
                let top = frame.top("dup")?.clone();
                frame.stack.push(top);
            }
            Op::Pop => {
                frame.pop("pop")?;
            }
            Op::Swap => {
                let a = frame.pop("swap")?;
                let b = frame.pop("swap")?;
                frame.stack.push(a);
                frame.stack.push(b);
            }
            Op::Load(local) => {
                let value = frame.local(local)?.clone();
                frame.stack.push(value);
            }
            Op::Store(local) => {
                let value = frame.pop("store")?;
                *frame.local(local)? = value;
            }
            Op::Increment { local, delta } => {
                let slot = frame.local(local)?;
                match slot {
                    Value::Int(n) => *n = n.wrapping_add(*delta),
                    other => {
                        return Err(Fault::BadOperand {
                            op: "iinc".to_string(),
                            expected: "int".to_string(),
                            found: other.describe(),
                        });
                    }
                }
            }
            Op::Invoke(method) => self.invoke(frame, method, false)?,
            Op::Suspend(method) => self.invoke(frame, method, true)?,
            Op::GetStatic(field) => {
                let owner = match &field.owner {
                    RefType::Message(name) | RefType::ExtensionHolder(name) => name,
                    other => return Err(Fault::UnknownField(format!("{}.{}", other, field.name))),
                };
                if self.schema.extension_by_id(owner, &field.name).is_none() {
                    return Err(Fault::UnknownField(format!("{}.{}", owner, field.name)));
                }
                frame.stack.push(Value::object(Object::Extension {
                    owner: owner.clone(),
                    name: field.name.clone(),
                }));
            }
            Op::Convert { to, .. } => {
                let value = frame.pop("convert")?;
                frame.stack.push(convert(value, to)?);
            }
            Op::CheckCast(ty) => {
                let value = frame.top("checkcast")?;
                if !value.is_instance_of(ty) {
                    return Err(Fault::ClassCast {
                        expected: ty.to_string(),
                        found: value.describe(),
                    });
                }
            }
            Op::Box(prim) => {
                let value = frame.pop("box")?;
                if value.native_type().as_ref() != Some(prim) {
                    return Err(Fault::BadOperand {
                        op: "box".to_string(),
                        expected: prim.to_string(),
                        found: value.describe(),
                    });
                }
                frame.stack.push(Value::object(Object::Wrapper(value)));
            }
            Op::Branch(branch) => {
                if eval_test(frame, branch.test)? {
                    self.exec_all(frame, &branch.then_ops)?;
                } else {
                    self.exec_all(frame, &branch.else_ops)?;
                }
            }
            Op::Loop(lp) => loop {
                self.exec_all(frame, &lp.condition)?;
                if !eval_test(frame, lp.test)? {
                    break;
                }
                self.exec_all(frame, &lp.body)?;
            },
            Op::Scope(scope) => {
                self.exec_all(frame, &scope.body)?;
                for decl in &scope.locals {
                    *frame.local(&decl.local)? = Value::Null;
                }
            }
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        frame: &mut Frame,
        method: &MethodRef,
        suspend: bool,
    ) -> Result<(), Fault> {
        let op = method.to_string();
        let mut args = Vec::with_capacity(method.params.len());
        for _ in &method.params {
            args.push(frame.pop(&op)?);
        }
        args.reverse();
        let receiver = if method.is_static() {
            None
        } else {
            let receiver = frame.pop(&op)?;
            if receiver.is_null() {
                return Err(Fault::NullPointer(op));
            }
            Some(receiver)
        };
        if suspend {
            self.suspensions += 1;
            tracing::debug!(method = %op, count = self.suspensions, "suspension point");
        }
        let result = natives::invoke(
            self,
            Call {
                method,
                receiver,
                args,
            },
        )?;
        if method.returns.is_some() {
            frame.stack.push(result);
        }
        Ok(())
    }
}

fn eval_test(frame: &mut Frame, test: Test) -> Result<bool, Fault> {
    let op = test.mnemonic();
    let bad = |expected: &str, found: &Value| Fault::BadOperand {
        op: op.to_string(),
        expected: expected.to_string(),
        found: found.describe(),
    };
    match test {
        Test::IsNull => Ok(frame.pop(op)?.is_null()),
        Test::NonNull => Ok(!frame.pop(op)?.is_null()),
        Test::IsTrue => match frame.pop(op)? {
            Value::Bool(b) => Ok(b),
            other => Err(bad("bool", &other)),
        },
        Test::IsZero => match frame.pop(op)? {
            Value::Int(n) => Ok(n == 0),
            other => Err(bad("int", &other)),
        },
        Test::IntEq | Test::IntLt => {
            let b = frame.pop(op)?;
            let a = frame.pop(op)?;
            match (&a, &b) {
                (Value::Int(a), Value::Int(b)) if test == Test::IntEq => Ok(a == b),
                (Value::Int(a), Value::Int(b)) => Ok(a < b),
                (Value::Int(_), other) | (other, _) => Err(bad("int", other)),
            }
        }
    }
}

fn convert(value: Value, to: &NativeType) -> Result<Value, Fault> {
    let is_real = matches!(value, Value::Float(_) | Value::Double(_));
    let (whole, real) = match value {
        Value::Int(n) => (i64::from(n), f64::from(n)),
        Value::Long(n) => (n, n as f64),
        Value::Float(x) => (x as i64, f64::from(x)),
        Value::Double(x) => (x as i64, x),
        other => {
            return Err(Fault::BadOperand {
                op: format!("convert to {}", to),
                expected: "number".to_string(),
                found: other.describe(),
            });
        }
    };
    Ok(match to {
        NativeType::Int if is_real => Value::Int(real as i32),
        NativeType::Int => Value::Int(whole as i32),
        NativeType::Long => Value::Long(whole),
        NativeType::Float => Value::Float(real as f32),
        NativeType::Double => Value::Double(real),
        other => {
            return Err(Fault::BadOperand {
                op: "convert".to_string(),
                expected: "numeric target".to_string(),
                found: other.to_string(),
            });
        }
    })
}

/// Runs an input-less sequence on a fresh machine.
pub fn execute(schema: &Schema, seq: &InstructionSequence) -> Result<Option<Value>, Fault> {
    Machine::new(schema).run(seq, Vec::new())
}
