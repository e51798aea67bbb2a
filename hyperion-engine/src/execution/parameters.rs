// Execution parameters
// Read-only bundles threaded from the document down to every task run

use crate::document::model::{Model, Value};
use crate::execution::events::ProgressSender;
use crate::tasks::variable::Variable;
use crate::template;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Default wait for a parallel task group, in minutes
pub const DEFAULT_TIMEOUT_TASKGROUP_MINUTES: u64 = 60;

/// Settings for a whole document run
#[derive(Debug, Clone)]
pub struct DocumentParameters {
    /// Tag filter; empty means every task runs
    pub tags: Vec<String>,
    /// Maximum wait for a parallel task group
    pub timeout_taskgroup: Duration,
    /// Directory for generated scripts (system temp dir when unset)
    pub temporary_path: Option<PathBuf>,
    /// Working directory for spawned processes
    pub working_dir: PathBuf,
    /// Optional progress channel
    pub progress: Option<ProgressSender>,
}

impl Default for DocumentParameters {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            timeout_taskgroup: Duration::from_secs(DEFAULT_TIMEOUT_TASKGROUP_MINUTES * 60),
            temporary_path: None,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            progress: None,
        }
    }
}

impl DocumentParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_timeout_minutes(mut self, minutes: u64) -> Self {
        self.timeout_taskgroup = Duration::from_secs(minutes.saturating_mul(60));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_taskgroup = timeout;
        self
    }

    pub fn with_temporary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temporary_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Whether a task with the given tags passes the filter.
    ///
    /// With an active filter, untagged tasks never pass.
    pub fn accepts(&self, task_tags: &[String]) -> bool {
        self.tags.is_empty() || task_tags.iter().any(|tag| self.tags.contains(tag))
    }
}

/// Parameters for one task group run
#[derive(Debug, Clone)]
pub struct TaskGroupParameters {
    pub document: Arc<DocumentParameters>,
    pub model: Arc<Model>,
    pub matrix: Arc<BTreeMap<String, String>>,
    /// Title of the current matrix row, if any
    pub matrix_title: Option<String>,
}

impl TaskGroupParameters {
    pub fn new(document: Arc<DocumentParameters>, model: Arc<Model>) -> Self {
        Self {
            document,
            model,
            matrix: Arc::new(BTreeMap::new()),
            matrix_title: None,
        }
    }

    pub fn with_matrix(mut self, title: impl Into<String>, matrix: BTreeMap<String, String>) -> Self {
        self.matrix_title = Some(title.into());
        self.matrix = Arc::new(matrix);
        self
    }
}

/// Current index and value of a task's "with" list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithParameters {
    pub index: usize,
    pub value: Value,
}

impl WithParameters {
    pub fn new(index: usize, value: Value) -> Self {
        Self { index, value }
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("index".to_string(), Value::String(self.index.to_string()));
        map.insert("value".to_string(), self.value.clone());
        Value::Map(map)
    }
}

/// Thread-safe map of variables shared by the tasks of one group
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    inner: Arc<RwLock<BTreeMap<String, Variable>>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a variable under its name, replacing any previous entry
    pub fn insert(&self, variable: Variable) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(variable.name().to_string(), variable);
    }

    pub fn get(&self, name: &str) -> Option<Variable> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(name).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Variable> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters handed to a single task run
#[derive(Debug, Clone)]
pub struct TaskParameters {
    pub model: Arc<Model>,
    pub matrix: Arc<BTreeMap<String, String>>,
    pub variables: VariableStore,
    pub with: Option<WithParameters>,
    pub document: Arc<DocumentParameters>,
    /// Point after which long-running work should stop
    pub deadline: Option<Instant>,
}

impl TaskParameters {
    pub fn new(group: &TaskGroupParameters, variables: VariableStore) -> Self {
        Self {
            model: Arc::clone(&group.model),
            matrix: Arc::clone(&group.matrix),
            variables,
            with: None,
            document: Arc::clone(&group.document),
            deadline: None,
        }
    }

    pub fn with_parameters(mut self, with: WithParameters) -> Self {
        self.with = Some(with);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Build the templating context.
    ///
    /// `model` is always present; `matrix`, `variables` and `with` only
    /// when they carry something.
    pub fn templating_context(&self) -> Value {
        let mut context = BTreeMap::new();
        context.insert("model".to_string(), self.model.data());

        if !self.matrix.is_empty() {
            context.insert("matrix".to_string(), Value::from((*self.matrix).clone()));
        }

        let variables = self.variables.snapshot();
        if !variables.is_empty() {
            let entries = variables
                .into_iter()
                .map(|(name, variable)| {
                    let mut entry = BTreeMap::new();
                    entry.insert("name".to_string(), Value::from(variable.name()));
                    entry.insert("value".to_string(), Value::from(variable.value()));
                    (name, Value::Map(entry))
                })
                .collect();
            context.insert("variables".to_string(), Value::Map(entries));
        }

        if let Some(with) = &self.with {
            context.insert("with".to_string(), with.to_value());
        }

        Value::Map(context)
    }

    /// Render a template against the current context
    pub fn render(&self, template: &str) -> String {
        template::render(template, &self.templating_context())
    }
}
