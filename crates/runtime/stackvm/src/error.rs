use thiserror::Error;

/// Runtime faults raised while executing a sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("null pointer in {0}")]
    NullPointer(String),

    #[error("class cast: {found} is not {expected}")]
    ClassCast { expected: String, found: String },

    #[error("unknown method {0}")]
    UnknownMethod(String),

    #[error("unknown static field {0}")]
    UnknownField(String),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("number format: {0:?} is not a decimal integer")]
    NumberFormat(String),

    #[error("stack underflow in {0}")]
    StackUnderflow(String),

    #[error("{op}: expected {expected}, found {found}")]
    BadOperand {
        op: String,
        expected: String,
        found: String,
    },
}
