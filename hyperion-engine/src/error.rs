// Engine error types
// Validation catalogue and top-level error used across the engine

use crate::reader::ReadError;

use thiserror::Error;

/// Fixed catalogue of validation failures raised while building documents
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Variable name must not be empty")]
    EmptyVariableName,

    #[error("Invalid regex '{regex}': {reason}")]
    InvalidRegex { regex: String, reason: String },

    #[error("Regex '{regex}' has no capture group {group}")]
    RegexGroupOutOfRange { regex: String, group: usize },

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Unknown field '{0}'!")]
    UnknownField(String),

    #[error("Unknown task type '{0}'")]
    UnknownTaskType(String),

    #[error("Task group '{0}' has no tasks")]
    EmptyTaskList(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Top-level engine error
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Read(#[from] ReadError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

pub type EngineResult<T> = Result<T, EngineError>;
