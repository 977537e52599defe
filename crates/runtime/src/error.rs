//! Error types for building and running nets.

use thiserror::Error;

/// Failures raised by a kernel while doing an operator's work.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum KernelError {
    /// Wrong number of input tensors.
    #[error("Expected {expected} inputs, got {got}")]
    InputCount { expected: usize, got: usize },

    /// Tensors with different shapes were combined element-wise.
    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    /// Kernel-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Errors raised while building or running a net.
#[derive(Debug, Error)]
pub enum NetError {
    /// No kernel is registered under this operator type.
    #[error("Unknown operator type '{0}'")]
    UnknownOperatorType(String),

    /// An operator tried to read a blob that is not in the workspace.
    #[error("Blob '{0}' not found in workspace")]
    MissingBlob(String),

    /// An operator input is neither an external input nor produced earlier.
    #[error("Operator {operator} reads '{blob}', which is never produced before it")]
    UndefinedInput { operator: String, blob: String },

    /// The net definition is malformed.
    #[error("Invalid net definition: {reason}")]
    InvalidDefinition { reason: String },

    /// A kernel failed.
    #[error("Operator {operator} failed: {source}")]
    Kernel {
        operator: String,
        #[source]
        source: KernelError,
    },

    /// A kernel returned a different number of outputs than declared.
    #[error("Operator {operator} produced {got} outputs, declared {expected}")]
    OutputArity {
        operator: String,
        expected: usize,
        got: usize,
    },

    /// The net definition could not be parsed.
    #[error("Failed to parse net definition: {0}")]
    Json(#[from] serde_json::Error),

    /// The net definition could not be read.
    #[error("Failed to read net definition: {0}")]
    Io(#[from] std::io::Error),
}
