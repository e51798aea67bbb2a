// Task Group
// Expands tasks into work items, dispatches them and aggregates failures

use crate::execution::events::{
    EventSender, ExecutionEvent, ProgressSender, SubscriptionId, VariablePublisher,
};
use crate::execution::parameters::{
    TaskGroupParameters, TaskParameters, VariableStore, WithParameters,
};
use crate::execution::runner::{work_item, Runner, WorkItem};
use crate::tasks::{Task, Variable};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A task shared between the group and its work items
pub type SharedTask = Arc<Mutex<Box<dyn Task>>>;

/// Ordered set of tasks sharing one variable namespace.
///
/// The variable map belongs to the group instance, so values written in
/// one matrix pass stay visible in the next until overwritten.
#[derive(Debug)]
pub struct TaskGroup {
    title: String,
    parallel: bool,
    tasks: Vec<SharedTask>,
    variables: VariableStore,
    publisher: VariablePublisher,
}

/// State every work item of one run reports into
struct Dispatch {
    group: String,
    variables: VariableStore,
    publisher: VariablePublisher,
    failures: AtomicUsize,
    progress: Option<ProgressSender>,
}

/// The task instance a work item runs
enum Instance {
    /// The group's own task, used when there are no "with" values
    Shared(SharedTask),
    /// An independent copy bound to one "with" value
    Owned(Box<dyn Task>),
}

impl TaskGroup {
    pub fn new(title: impl Into<String>, parallel: bool) -> Self {
        Self {
            title: title.into(),
            parallel,
            tasks: Vec::new(),
            variables: VariableStore::new(),
            publisher: VariablePublisher::new(),
        }
    }

    pub fn add_task(&mut self, task: Box<dyn Task>) {
        self.tasks.push(Arc::new(Mutex::new(task)));
    }

    pub fn with_task(mut self, task: Box<dyn Task>) -> Self {
        self.add_task(task);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn tasks(&self) -> &[SharedTask] {
        &self.tasks
    }

    /// Snapshot of the shared variable map
    pub fn variables(&self) -> BTreeMap<String, Variable> {
        self.variables.snapshot()
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.variables.get(name)
    }

    /// Register a callback invoked for every published variable
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Variable) + Send + Sync + 'static,
    {
        self.publisher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    /// Run every accepted task; true iff no task failed
    pub async fn run(&self, parameters: &TaskGroupParameters) -> bool {
        let started = Instant::now();
        let document = &parameters.document;
        let runner = Runner::new(self.parallel, document.timeout_taskgroup);
        let deadline = runner.deadline();

        let dispatch = Arc::new(Dispatch {
            group: self.title.clone(),
            variables: self.variables.clone(),
            publisher: self.publisher.clone(),
            failures: AtomicUsize::new(0),
            progress: document.progress.clone(),
        });

        let mut items: Vec<WorkItem> = Vec::new();
        let mut writers: BTreeMap<String, usize> = BTreeMap::new();

        for shared in &self.tasks {
            let task = shared.lock().await;

            if !document.accepts(task.tags()) {
                debug!(group = %self.title, task = %task.title(), "skipped by tag filter");
                document.progress.send_event(ExecutionEvent::task_skipped(
                    &self.title,
                    task.title(),
                    "no matching tag",
                ));
                continue;
            }

            let base = TaskParameters::new(parameters, self.variables.clone()).with_deadline(deadline);
            let name = task.variable().name().to_string();

            if task.with_values().is_empty() {
                *writers.entry(name).or_default() += 1;
                items.push(work_item(execute(
                    Instance::Shared(Arc::clone(shared)),
                    base,
                    Arc::clone(&dispatch),
                )));
            } else {
                for (index, value) in task.with_values().iter().enumerate() {
                    *writers.entry(name.clone()).or_default() += 1;
                    let parameters = base
                        .clone()
                        .with_parameters(WithParameters::new(index, value.clone()));
                    items.push(work_item(execute(
                        Instance::Owned(task.copy()),
                        parameters,
                        Arc::clone(&dispatch),
                    )));
                }
            }
        }

        if self.parallel {
            for (name, count) in writers.iter().filter(|(_, count)| **count > 1) {
                warn!(
                    group = %self.title,
                    "variable '{}' is written by {} parallel work items; last write wins",
                    name,
                    count
                );
            }
        }

        document.progress.send_event(ExecutionEvent::group_started(
            &self.title,
            self.parallel,
            items.len(),
        ));

        let summary = runner.run_until(items, deadline).await;

        if summary.timed_out() {
            warn!(
                group = %self.title,
                unfinished = summary.unfinished,
                "task group timed out"
            );
            document
                .progress
                .send_event(ExecutionEvent::group_timed_out(&self.title, summary.unfinished));
        }

        let failures =
            dispatch.failures.load(Ordering::SeqCst) + summary.panicked + summary.unfinished;
        let success = failures == 0;

        document.progress.send_event(ExecutionEvent::group_completed(
            &self.title,
            success,
            failures,
            started.elapsed(),
        ));

        success
    }
}

async fn execute(instance: Instance, parameters: TaskParameters, dispatch: Arc<Dispatch>) {
    match instance {
        Instance::Shared(shared) => {
            // The lock is only held to snapshot and store back, never across
            // the run, so a detached run cannot stall the next pass
            let mut task = {
                let original = shared.lock().await;
                let mut task = original.copy();
                task.definition_mut().variable = original.variable().clone();
                task
            };
            let variable = run_task(&mut *task, &parameters, &dispatch).await;
            shared.lock().await.definition_mut().variable = variable;
        }
        Instance::Owned(mut task) => {
            run_task(&mut *task, &parameters, &dispatch).await;
        }
    }
}

async fn run_task(
    task: &mut dyn Task,
    parameters: &TaskParameters,
    dispatch: &Dispatch,
) -> Variable {
    let title = parameters.render(task.title());
    info!(group = %dispatch.group, "Running task '{}'", title);
    dispatch
        .progress
        .send_event(ExecutionEvent::task_started(&dispatch.group, &title));

    let result = task.run(parameters).await;
    let success = result.is_success();

    let variable = result.into_variable();
    dispatch.variables.insert(variable.clone());
    info!(group = %dispatch.group, "set variable {}={}", variable.name(), variable.value());
    dispatch.publisher.publish(&variable);

    if !success {
        dispatch.failures.fetch_add(1, Ordering::SeqCst);
    }

    dispatch.progress.send_event(ExecutionEvent::task_completed(
        &dispatch.group,
        &title,
        success,
        &variable,
    ));

    variable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::Model;
    use crate::execution::parameters::DocumentParameters;
    use crate::tasks::testing::EchoTask;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn parameters(document: DocumentParameters) -> TaskGroupParameters {
        TaskGroupParameters::new(Arc::new(document), Arc::new(Model::default()))
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_tag_filter_skips_untagged_and_unmatched() {
        let group = TaskGroup::new("g", false)
            .with_task(EchoTask::new("untagged", "u").output("u").boxed())
            .with_task(EchoTask::new("other", "o").output("o").tagged(&["other"]).boxed())
            .with_task(EchoTask::new("match", "m").output("m").tagged(&["build", "x"]).boxed());

        let ok = group
            .run(&parameters(DocumentParameters::default().with_tags(tags(&["build"]))))
            .await;

        assert!(ok);
        let names: Vec<String> = group.variables().into_keys().collect();
        assert_eq!(names, vec!["m"]);
    }

    #[tokio::test]
    async fn test_no_filter_runs_everything() {
        let group = TaskGroup::new("g", false)
            .with_task(EchoTask::new("a", "a").output("a").boxed())
            .with_task(EchoTask::new("b", "b").output("b").tagged(&["t"]).boxed());

        assert!(group.run(&parameters(DocumentParameters::default())).await);
        assert_eq!(group.variables().len(), 2);
    }

    #[tokio::test]
    async fn test_with_expansion_uses_independent_copies() {
        let task = EchoTask::new("each", "item {{ with.value }}")
            .output("item")
            .over(&["a", "b", "c"]);
        let runs = Arc::clone(&task.runs);
        let group = TaskGroup::new("g", true).with_task(task.boxed());

        let published = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        group.subscribe(move |variable| sink.lock().unwrap().push(variable.value().to_string()));

        assert!(group.run(&parameters(DocumentParameters::default())).await);

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        let mut values = published.lock().unwrap().clone();
        values.sort();
        assert_eq!(values, vec!["item a", "item b", "item c"]);

        // The group's own instance never ran
        let original = group.tasks()[0].lock().await;
        assert_eq!(original.variable().value(), "");
    }

    #[tokio::test]
    async fn test_sequential_group_is_deterministic() {
        let build = || {
            TaskGroup::new("g", false)
                .with_task(EchoTask::new("first", "one").output("x").boxed())
                .with_task(EchoTask::new("second", "{{ variables.x.value }}-two").output("y").boxed())
                .with_task(EchoTask::new("third", "three").output("x").boxed())
        };

        let first = build();
        let second = build();
        assert!(first.run(&parameters(DocumentParameters::default())).await);
        assert!(second.run(&parameters(DocumentParameters::default())).await);

        let values = |group: &TaskGroup| {
            group
                .variables()
                .into_iter()
                .map(|(name, variable)| (name, variable.value().to_string()))
                .collect::<Vec<_>>()
        };
        assert_eq!(values(&first), values(&second));
        assert_eq!(
            values(&first),
            vec![("x".to_string(), "three".to_string()), ("y".to_string(), "one-two".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_short_circuit() {
        let group = TaskGroup::new("g", false)
            .with_task(EchoTask::new("1", "ok").output("a").boxed())
            .with_task(EchoTask::new("2", "fail").output("b").boxed())
            .with_task(EchoTask::new("3", "ok").output("c").boxed());

        let published = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&published);
        group.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!group.run(&parameters(DocumentParameters::default())).await);
        assert_eq!(published.load(Ordering::SeqCst), 3);
        assert_eq!(group.variables().len(), 3);
    }

    #[tokio::test]
    async fn test_parallel_group_runs_concurrently() {
        let mut group = TaskGroup::new("g", true);
        for name in ["a", "b", "c", "d"] {
            group.add_task(
                EchoTask::new(name, name)
                    .output(name)
                    .delayed(Duration::from_millis(200))
                    .boxed(),
            );
        }

        let started = Instant::now();
        assert!(group.run(&parameters(DocumentParameters::default())).await);
        assert!(started.elapsed() < Duration::from_millis(700));
        assert_eq!(group.variables().len(), 4);
    }

    #[tokio::test]
    async fn test_parallel_timeout_counts_as_failure() {
        let group = TaskGroup::new("g", true)
            .with_task(EchoTask::new("quick", "q").output("q").boxed())
            .with_task(
                EchoTask::new("slow", "s")
                    .output("s")
                    .delayed(Duration::from_secs(2))
                    .boxed(),
            );

        let (tx, mut rx) = crate::execution::events::progress_channel();
        let document = DocumentParameters::default()
            .with_timeout(Duration::from_millis(100))
            .with_progress(tx);

        assert!(!group.run(&parameters(document)).await);

        let mut timed_out = false;
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::TaskGroupTimedOut { unfinished, .. } = event {
                assert_eq!(unfinished, 1);
                timed_out = true;
            }
        }
        assert!(timed_out);
    }

    #[tokio::test]
    async fn test_variables_carry_over_between_runs() {
        let group = TaskGroup::new("g", false)
            .with_task(EchoTask::new("t", "[{{ variables.x.value }}]").output("x").boxed());

        assert!(group.run(&parameters(DocumentParameters::default())).await);
        assert_eq!(group.variable("x").unwrap().value(), "[]");

        assert!(group.run(&parameters(DocumentParameters::default())).await);
        assert_eq!(group.variable("x").unwrap().value(), "[[]]");

        let task = group.tasks()[0].lock().await;
        assert_eq!(task.variable().value(), "[[]]");
    }

    #[tokio::test]
    async fn test_timed_out_group_does_not_block_next_run() {
        let group = TaskGroup::new("g", true).with_task(
            EchoTask::new("slow", "s")
                .output("s")
                .delayed(Duration::from_millis(800))
                .boxed(),
        );
        let document = || DocumentParameters::default().with_timeout(Duration::from_millis(50));

        assert!(!group.run(&parameters(document())).await);

        let started = Instant::now();
        assert!(!group.run(&parameters(document())).await);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    async fn assert_panic_is_contained(parallel: bool) {
        let group = TaskGroup::new("g", parallel)
            .with_task(EchoTask::new("1", "ok").output("a").boxed())
            .with_task(EchoTask::new("2", "panic").output("b").boxed())
            .with_task(EchoTask::new("3", "ok").output("c").boxed());

        assert!(!group.run(&parameters(DocumentParameters::default())).await);

        let names: Vec<String> = group.variables().into_keys().collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_sequential_panic_fails_group_and_siblings_publish() {
        assert_panic_is_contained(false).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_panic_fails_group_and_siblings_publish() {
        assert_panic_is_contained(true).await;
    }
}
