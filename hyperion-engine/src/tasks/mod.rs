// Tasks
// The task contract shared by every task kind, and the built-in kinds

pub mod container;
pub mod file;
pub mod registry;
pub mod script;
pub mod variable;

use crate::document::model::Value;
use crate::execution::parameters::TaskParameters;

pub use registry::{TaskFactory, TaskRegistry, TaskSource};
pub use variable::Variable;

use std::fmt;

/// Configuration common to every task kind
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub title: String,
    pub variable: Variable,
    pub tags: Vec<String>,
    pub with_values: Vec<Value>,
}

impl Default for TaskDefinition {
    fn default() -> Self {
        Self {
            title: String::new(),
            variable: Variable::default(),
            tags: Vec::new(),
            with_values: Vec::new(),
        }
    }
}

impl TaskDefinition {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variable = variable;
        self
    }

    /// Add tags, ignoring duplicates
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.with_values = values;
        self
    }

    /// Same configuration with a fresh, empty variable
    pub fn copy(&self) -> Self {
        Self {
            variable: self.variable.fresh(),
            ..self.clone()
        }
    }
}

/// Outcome of one task run
#[derive(Debug, Clone)]
pub struct TaskResult {
    success: bool,
    variable: Variable,
}

impl TaskResult {
    pub fn new(success: bool, variable: Variable) -> Self {
        Self { success, variable }
    }

    pub fn success(variable: &Variable) -> Self {
        Self::new(true, variable.clone())
    }

    pub fn failure(variable: &Variable) -> Self {
        Self::new(false, variable.clone())
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn into_variable(self) -> Variable {
        self.variable
    }
}

/// One executable unit of work.
///
/// `run` never fails with an error; every failure path produces an
/// unsuccessful [`TaskResult`]. `copy` returns an independent instance with
/// the same configuration and an empty variable.
#[async_trait::async_trait]
pub trait Task: Send + Sync + fmt::Debug {
    /// Registry name of this task kind
    fn kind(&self) -> &'static str;

    fn definition(&self) -> &TaskDefinition;

    fn definition_mut(&mut self) -> &mut TaskDefinition;

    /// Inline code or path to a code file, for kinds that have one
    fn code(&self) -> Option<&str> {
        None
    }

    /// Whether `code` names an existing file this kind can execute
    fn is_regular_file_code(&self) -> bool {
        false
    }

    async fn run(&mut self, parameters: &TaskParameters) -> TaskResult;

    fn copy(&self) -> Box<dyn Task>;

    fn title(&self) -> &str {
        &self.definition().title
    }

    fn variable(&self) -> &Variable {
        &self.definition().variable
    }

    fn tags(&self) -> &[String] {
        &self.definition().tags
    }

    fn with_values(&self) -> &[Value] {
        &self.definition().with_values
    }

    /// Configuration equality across task objects
    fn same_configuration(&self, other: &dyn Task) -> bool {
        self.kind() == other.kind()
            && self.definition() == other.definition()
            && self.code() == other.code()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory task used to exercise the engine without processes

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Renders its code and stores it as output; fails when the rendered
    /// code contains "fail" and panics when it contains "panic"
    #[derive(Debug, Clone)]
    pub struct EchoTask {
        pub definition: TaskDefinition,
        pub code: String,
        pub delay: Duration,
        pub runs: Arc<AtomicUsize>,
    }

    impl EchoTask {
        pub fn new(title: &str, code: &str) -> Self {
            Self {
                definition: TaskDefinition::new(title),
                code: code.to_string(),
                delay: Duration::ZERO,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn output(mut self, name: &str) -> Self {
            self.definition.variable = Variable::named(name).unwrap();
            self
        }

        pub fn tagged(mut self, tags: &[&str]) -> Self {
            self.definition = self.definition.with_tags(tags.iter().copied());
            self
        }

        pub fn over(mut self, values: &[&str]) -> Self {
            self.definition.with_values = values.iter().map(|v| Value::from(*v)).collect();
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn boxed(self) -> Box<dyn Task> {
            Box::new(self)
        }
    }

    #[async_trait::async_trait]
    impl Task for EchoTask {
        fn kind(&self) -> &'static str {
            "echo"
        }

        fn definition(&self) -> &TaskDefinition {
            &self.definition
        }

        fn definition_mut(&mut self) -> &mut TaskDefinition {
            &mut self.definition
        }

        fn code(&self) -> Option<&str> {
            Some(&self.code)
        }

        async fn run(&mut self, parameters: &TaskParameters) -> TaskResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let output = parameters.render(&self.code);
            if output.contains("panic") {
                panic!("echo task '{}' panicked", self.definition.title);
            }
            let matched = self.definition.variable.set_value(&output);
            TaskResult::new(matched && !output.contains("fail"), self.definition.variable.clone())
        }

        fn copy(&self) -> Box<dyn Task> {
            Box::new(Self {
                definition: self.definition.copy(),
                code: self.code.clone(),
                delay: self.delay,
                runs: Arc::clone(&self.runs),
            })
        }
    }
}
