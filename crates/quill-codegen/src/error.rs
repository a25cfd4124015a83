use rhizome_quill_ir::EmitError;
use thiserror::Error;

/// Faults raised while generating code. Each one means the schema and the
/// caller disagree; generation stops at the first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("unknown message type {0}")]
    UnknownMessage(String),

    #[error("{message} has no field {field}")]
    UnknownField { message: String, field: String },

    #[error("{context}: unsupported {what}")]
    Unsupported { context: String, what: String },

    #[error("argument for {field}: expected {expected}, found {found}")]
    ArgumentMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("base value for {message} has type {found}")]
    BaseMismatch { message: String, found: String },

    #[error(transparent)]
    Emit(#[from] EmitError),
}
