// Execution Engine Module
// Task group scheduling, per-run parameters and progress events

pub mod events;
pub mod group;
pub mod parameters;
pub mod runner;

// Re-export key types
pub use events::{
    progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender,
    SubscriptionId, VariablePublisher,
};
pub use group::{SharedTask, TaskGroup};
pub use parameters::{
    DocumentParameters, TaskGroupParameters, TaskParameters, VariableStore, WithParameters,
    DEFAULT_TIMEOUT_TASKGROUP_MINUTES,
};
pub use runner::{work_item, RunSummary, Runner, WorkItem};
