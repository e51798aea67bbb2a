// Runners
// Process execution and capability probes used by the task kinds

pub mod capabilities;
pub mod process;

pub use capabilities::Capabilities;
pub use process::{run_process, ProcessOutput, ProcessSpec};
