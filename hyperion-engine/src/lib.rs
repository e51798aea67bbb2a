// Hyperion Engine Library
// Document model, task kinds and execution engine for document-driven pipelines

pub mod document;
pub mod error;
pub mod execution;
pub mod reader;
pub mod runners;
pub mod tasks;
pub mod template;

// Re-export commonly used types
pub use error::{EngineError, EngineResult, ValidationError};

// Re-export document types
pub use document::{Document, DocumentResult, MatrixBuilder, MatrixParameters, Model, Value};

// Re-export execution types
pub use execution::{
    progress_channel, DocumentParameters, EventSender, ExecutionEvent, ProgressReceiver,
    ProgressSender, Runner, TaskGroup, TaskGroupParameters, TaskParameters,
};

// Re-export reader types
pub use reader::{DocumentFormat, DocumentReader, ReadError, ReadErrorKind, ReadResult};

// Re-export runner types
pub use runners::Capabilities;

// Re-export task types
pub use tasks::{Task, TaskDefinition, TaskRegistry, TaskResult, TaskSource, Variable};
