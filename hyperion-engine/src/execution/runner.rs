// Work item runner
// Executes work items in order or concurrently with a bounded wait

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, warn};

/// A unit of work handed to the runner
pub type WorkItem = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Box a future as a work item
pub fn work_item<F>(future: F) -> WorkItem
where
    F: Future<Output = ()> + Send + 'static,
{
    Box::pin(future)
}

/// What happened to the submitted work items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items that ran to completion
    pub completed: usize,
    /// Items that panicked
    pub panicked: usize,
    /// Items still running when the wait gave up
    pub unfinished: usize,
}

impl RunSummary {
    pub fn timed_out(&self) -> bool {
        self.unfinished > 0
    }
}

/// Concurrency primitive for task groups.
///
/// Sequential mode awaits each item in list order on the caller. Parallel
/// mode spawns every item at once and waits up to the timeout; items still
/// running after that are detached, never aborted.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    parallel: bool,
    timeout: Duration,
}

impl Runner {
    pub fn new(parallel: bool, timeout: Duration) -> Self {
        Self { parallel, timeout }
    }

    pub fn sequential() -> Self {
        Self::new(false, Duration::MAX)
    }

    pub fn parallel(timeout: Duration) -> Self {
        Self::new(true, timeout)
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Deadline for parallel work started now
    pub fn deadline(&self) -> Option<Instant> {
        if self.parallel {
            Instant::now().checked_add(self.timeout)
        } else {
            None
        }
    }

    pub async fn run(&self, items: Vec<WorkItem>) -> RunSummary {
        if self.parallel {
            let deadline = self.deadline();
            self.run_parallel(items, deadline).await
        } else {
            Self::run_in_order(items).await
        }
    }

    /// Run in parallel against an explicit deadline
    pub async fn run_until(&self, items: Vec<WorkItem>, deadline: Option<Instant>) -> RunSummary {
        if self.parallel {
            self.run_parallel(items, deadline).await
        } else {
            Self::run_in_order(items).await
        }
    }

    async fn run_in_order(items: Vec<WorkItem>) -> RunSummary {
        let mut summary = RunSummary::default();
        for item in items {
            match AssertUnwindSafe(item).catch_unwind().await {
                Ok(()) => summary.completed += 1,
                Err(_) => {
                    error!("work item panicked");
                    summary.panicked += 1;
                }
            }
        }
        summary
    }

    async fn run_parallel(&self, items: Vec<WorkItem>, deadline: Option<Instant>) -> RunSummary {
        let handles: Vec<JoinHandle<()>> = items.into_iter().map(tokio::spawn).collect();
        let mut summary = RunSummary::default();
        let mut expired = false;

        for mut handle in handles {
            let joined = if expired {
                if handle.is_finished() {
                    Some(handle.await)
                } else {
                    None
                }
            } else {
                match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(result) => Some(result),
                        Err(_) => {
                            expired = true;
                            None
                        }
                    },
                    None => Some(handle.await),
                }
            };

            match joined {
                Some(Ok(())) => summary.completed += 1,
                Some(Err(e)) => {
                    error!(error = %e, "work item failed");
                    summary.panicked += 1;
                }
                // Dropping the handle detaches the task; it keeps running
                None => summary.unfinished += 1,
            }
        }

        if summary.timed_out() {
            warn!(
                unfinished = summary.unfinished,
                timeout = ?self.timeout,
                "stopped waiting for work items"
            );
        }

        summary
    }
}
