// Document
// Top-level runnable unit: model, matrix rows and ordered task groups

pub mod matrix;
pub mod model;

pub use matrix::{MatrixBuilder, MatrixParameters};
pub use model::{Model, Value};

use crate::execution::events::{EventSender, ExecutionEvent};
use crate::execution::group::TaskGroup;
use crate::execution::parameters::{DocumentParameters, TaskGroupParameters};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A whole runnable document
#[derive(Debug, Default)]
pub struct Document {
    model: Arc<Model>,
    matrix: Vec<MatrixParameters>,
    task_groups: Vec<TaskGroup>,
}

impl Document {
    pub fn new(model: Model) -> Self {
        Self {
            model: Arc::new(model),
            matrix: Vec::new(),
            task_groups: Vec::new(),
        }
    }

    pub fn add_matrix_parameters(&mut self, parameters: MatrixParameters) {
        self.matrix.push(parameters);
    }

    pub fn add_task_group(&mut self, group: TaskGroup) {
        self.task_groups.push(group);
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn matrix(&self) -> &[MatrixParameters] {
        &self.matrix
    }

    pub fn task_groups(&self) -> &[TaskGroup] {
        &self.task_groups
    }

    /// Run all task groups once per matrix row (or once without a matrix).
    ///
    /// Every group runs even after a failure; the result is true only if
    /// every group of every pass succeeded.
    pub async fn run(&self, parameters: &DocumentParameters) -> bool {
        let document = Arc::new(parameters.clone());
        let mut success = true;

        if self.matrix.is_empty() {
            let group_parameters = TaskGroupParameters::new(Arc::clone(&document), Arc::clone(&self.model));
            success &= self.run_groups(&group_parameters).await;
        } else {
            for (index, row) in self.matrix.iter().enumerate() {
                info!(matrix = %row.title(), "Processing matrix '{}'", row.title());
                document.progress.send_event(ExecutionEvent::matrix_started(
                    row.title(),
                    index,
                    self.matrix.len(),
                ));

                let group_parameters =
                    TaskGroupParameters::new(Arc::clone(&document), Arc::clone(&self.model))
                        .with_matrix(row.title(), row.parameters().clone());
                success &= self.run_groups(&group_parameters).await;
            }
        }

        success
    }

    async fn run_groups(&self, parameters: &TaskGroupParameters) -> bool {
        let mut success = true;
        for group in &self.task_groups {
            info!(group = %group.title(), "Processing task group '{}'", group.title());
            success &= group.run(parameters).await;
        }
        success
    }

    /// Run the document and record its start and finish time
    pub async fn execute(&self, parameters: &DocumentParameters) -> DocumentResult {
        parameters.progress.send_event(ExecutionEvent::document_started(
            self.matrix.len(),
            self.task_groups.len(),
        ));

        let started = Utc::now();
        let success = self.run(parameters).await;
        let result = DocumentResult::new(success, started, Utc::now());

        parameters
            .progress
            .send_event(ExecutionEvent::document_completed(success, result.duration()));
        result
    }
}

/// Outcome of a whole document run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentResult {
    success: bool,
    started: DateTime<Utc>,
    finished: DateTime<Utc>,
}

impl DocumentResult {
    pub fn new(success: bool, started: DateTime<Utc>, finished: DateTime<Utc>) -> Self {
        Self {
            success,
            started,
            finished,
        }
    }

    /// A failed result for a document that never ran
    pub fn failed() -> Self {
        let now = Utc::now();
        Self::new(false, now, now)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn finished(&self) -> DateTime<Utc> {
        self.finished
    }

    pub fn duration(&self) -> Duration {
        (self.finished - self.started).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::EchoTask;
    use crate::tasks::Variable;
    use std::sync::Mutex;

    fn recorder(group: &TaskGroup) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        group.subscribe(move |variable: &Variable| {
            sink.lock().unwrap().push(variable.value().to_string())
        });
        seen
    }

    #[tokio::test]
    async fn test_without_matrix_runs_groups_once_in_order() {
        let mut document = Document::new(Model::default());
        let first = TaskGroup::new("first", false)
            .with_task(EchoTask::new("a", "a").boxed());
        let second = TaskGroup::new("second", false)
            .with_task(EchoTask::new("b", "b").boxed());
        let first_seen = recorder(&first);
        let second_seen = recorder(&second);
        document.add_task_group(first);
        document.add_task_group(second);

        assert!(document.run(&DocumentParameters::default()).await);
        assert_eq!(*first_seen.lock().unwrap(), vec!["a"]);
        assert_eq!(*second_seen.lock().unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_matrix_rows_run_in_declaration_order() {
        let mut document = Document::new(Model::default());
        document.add_matrix_parameters(MatrixBuilder::new("dev").parameter("env", "dev").build().unwrap());
        document.add_matrix_parameters(MatrixBuilder::new("prod").parameter("env", "prod").build().unwrap());

        let group = TaskGroup::new("deploy", true)
            .with_task(EchoTask::new("deploy {{ matrix.env }}", "to {{ matrix.env }}").boxed());
        let seen = recorder(&group);
        document.add_task_group(group);

        assert!(document.run(&DocumentParameters::default()).await);
        assert_eq!(*seen.lock().unwrap(), vec!["to dev", "to prod"]);
    }

    #[tokio::test]
    async fn test_failure_in_one_pass_fails_document_but_all_run() {
        let mut document = Document::new(Model::default());
        document.add_matrix_parameters(MatrixBuilder::new("bad").parameter("mode", "fail").build().unwrap());
        document.add_matrix_parameters(MatrixBuilder::new("good").parameter("mode", "ok").build().unwrap());

        let group = TaskGroup::new("g", false)
            .with_task(EchoTask::new("t", "{{ matrix.mode }}").boxed());
        let seen = recorder(&group);
        document.add_task_group(group);

        let result = document.execute(&DocumentParameters::default()).await;
        assert!(!result.success());
        assert!(result.finished() >= result.started());
        assert_eq!(*seen.lock().unwrap(), vec!["fail", "ok"]);
    }

    #[tokio::test]
    async fn test_model_is_visible_to_tasks() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("owner: ops").unwrap();
        let mut document = Document::new(Model::from_yaml(&yaml));
        let group = TaskGroup::new("g", false)
            .with_task(EchoTask::new("t", "owner={{ model.owner }}").boxed());
        let seen = recorder(&group);
        document.add_task_group(group);

        assert!(document.run(&DocumentParameters::default()).await);
        assert_eq!(*seen.lock().unwrap(), vec!["owner=ops"]);
    }

    #[test]
    fn test_document_result_duration() {
        let started = Utc::now();
        let finished = started + chrono::Duration::milliseconds(1500);
        let result = DocumentResult::new(true, started, finished);
        assert_eq!(result.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_document_result_serializes_and_fails() {
        let failed = DocumentResult::failed();
        assert!(!failed.success());
        assert_eq!(failed.duration(), Duration::ZERO);

        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["success"], serde_json::Value::Bool(false));
        assert!(json["started"].is_string());
        assert!(json["finished"].is_string());
    }
}
