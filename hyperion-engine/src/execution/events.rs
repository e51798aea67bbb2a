// Execution Events
// Progress reporting and variable change notification for document runs

use crate::tasks::variable::Variable;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during document execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Document execution started
    DocumentStarted {
        total_matrix: usize,
        total_groups: usize,
    },

    /// Document execution completed
    DocumentCompleted { success: bool, duration: Duration },

    /// A matrix row started a full pass over all task groups
    MatrixStarted {
        title: String,
        index: usize,
        total: usize,
    },

    /// Task group started
    TaskGroupStarted {
        title: String,
        parallel: bool,
        work_items: usize,
    },

    /// Task group finished
    TaskGroupCompleted {
        title: String,
        success: bool,
        failures: usize,
        duration: Duration,
    },

    /// The group stopped waiting for its parallel work items
    TaskGroupTimedOut { title: String, unfinished: usize },

    /// Task run started
    TaskStarted { group: String, title: String },

    /// Task run finished
    TaskCompleted {
        group: String,
        title: String,
        success: bool,
        variable: String,
        value: String,
    },

    /// Task skipped by the tag filter
    TaskSkipped {
        group: String,
        title: String,
        reason: String,
    },
}

impl ExecutionEvent {
    /// Create a document started event
    pub fn document_started(total_matrix: usize, total_groups: usize) -> Self {
        Self::DocumentStarted {
            total_matrix,
            total_groups,
        }
    }

    /// Create a document completed event
    pub fn document_completed(success: bool, duration: Duration) -> Self {
        Self::DocumentCompleted { success, duration }
    }

    pub fn matrix_started(title: impl Into<String>, index: usize, total: usize) -> Self {
        Self::MatrixStarted {
            title: title.into(),
            index,
            total,
        }
    }

    pub fn group_started(title: impl Into<String>, parallel: bool, work_items: usize) -> Self {
        Self::TaskGroupStarted {
            title: title.into(),
            parallel,
            work_items,
        }
    }

    pub fn group_completed(
        title: impl Into<String>,
        success: bool,
        failures: usize,
        duration: Duration,
    ) -> Self {
        Self::TaskGroupCompleted {
            title: title.into(),
            success,
            failures,
            duration,
        }
    }

    pub fn group_timed_out(title: impl Into<String>, unfinished: usize) -> Self {
        Self::TaskGroupTimedOut {
            title: title.into(),
            unfinished,
        }
    }

    pub fn task_started(group: impl Into<String>, title: impl Into<String>) -> Self {
        Self::TaskStarted {
            group: group.into(),
            title: title.into(),
        }
    }

    /// Create a task completed event from the published variable
    pub fn task_completed(
        group: impl Into<String>,
        title: impl Into<String>,
        success: bool,
        variable: &Variable,
    ) -> Self {
        Self::TaskCompleted {
            group: group.into(),
            title: title.into(),
            success,
            variable: variable.name().to_string(),
            value: variable.value().to_string(),
        }
    }

    pub fn task_skipped(
        group: impl Into<String>,
        title: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TaskSkipped {
            group: group.into(),
            title: title.into(),
            reason: reason.into(),
        }
    }
}

/// Helper trait for sending events
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

/// Handle returned by [`VariablePublisher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&Variable) + Send + Sync>;

/// In-process observer list for variable changes.
///
/// Callbacks run synchronously on the publishing task, in subscription order.
#[derive(Clone, Default)]
pub struct VariablePublisher {
    inner: Arc<Mutex<PublisherState>>,
}

#[derive(Default)]
struct PublisherState {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl VariablePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Variable) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = state.subscribers.len();
        state.subscribers.retain(|(existing, _)| *existing != id);
        state.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .len()
    }

    pub fn publish(&self, variable: &Variable) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe
        let subscribers: Vec<Subscriber> = {
            let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            state.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect()
        };
        for subscriber in subscribers {
            subscriber(variable);
        }
    }
}

impl std::fmt::Debug for VariablePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariablePublisher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(ExecutionEvent::document_started(0, 2));
        tx.send_event(ExecutionEvent::group_started("Build", false, 1));

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, ExecutionEvent::DocumentStarted { total_groups: 2, .. }));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(event2, ExecutionEvent::TaskGroupStarted { .. }));
    }

    #[test]
    fn test_optional_sender_none_is_noop() {
        let sender: Option<ProgressSender> = None;
        sender.send_event(ExecutionEvent::document_completed(true, Duration::ZERO));
    }

    #[test]
    fn test_publisher_subscribe_and_unsubscribe() {
        let publisher = VariablePublisher::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let id = publisher.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let variable = Variable::named("x").unwrap();
        publisher.publish(&variable);
        publisher.publish(&variable);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert!(publisher.unsubscribe(id));
        assert!(!publisher.unsubscribe(id));
        publisher.publish(&variable);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
