// Script tasks
// Shell, batch, PowerShell and Python code run through a temporary script file

use crate::execution::parameters::TaskParameters;
use crate::runners::capabilities;
use crate::runners::process::{run_process, ProcessOutput, ProcessSpec};
use crate::tasks::{Task, TaskDefinition, TaskResult};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("No interpreter found for {0} tasks")]
    InterpreterMissing(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interpreter family of a script task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Shell,
    Batch,
    PowerShell,
    Python,
}

impl ScriptKind {
    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::Shell => "shell",
            ScriptKind::Batch => "batch",
            ScriptKind::PowerShell => "powershell",
            ScriptKind::Python => "python",
        }
    }

    /// Accepted code file extensions; the first is used for generated scripts
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ScriptKind::Shell => &["sh"],
            ScriptKind::Batch => &["cmd", "bat"],
            ScriptKind::PowerShell => &["ps1"],
            ScriptKind::Python => &["py"],
        }
    }

    fn interpreter(&self) -> Option<PathBuf> {
        match self {
            ScriptKind::Shell => capabilities::find_shell(),
            ScriptKind::Batch => capabilities::find_batch(),
            ScriptKind::PowerShell => capabilities::find_powershell(),
            ScriptKind::Python => capabilities::find_python(),
        }
    }

    fn command(&self, interpreter: &Path, script: &Path) -> ProcessSpec {
        let spec = ProcessSpec::new(interpreter.to_string_lossy());
        let script = script.to_string_lossy();
        match self {
            ScriptKind::Shell | ScriptKind::Python => spec.arg(script),
            ScriptKind::Batch => spec.args(["/q", "/c"]).arg(script),
            ScriptKind::PowerShell => spec
                .args(["-NoLogo", "-NoProfile", "-ExecutionPolicy", "Bypass", "-File"])
                .arg(script),
        }
    }
}

/// Write rendered code to a temporary script file that is removed on drop
pub(crate) async fn write_script(
    prefix: &str,
    extension: &str,
    content: &str,
    parameters: &TaskParameters,
) -> std::io::Result<tempfile::TempPath> {
    let dir = parameters
        .document
        .temporary_path
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    write_script_in(&dir, prefix, extension, content).await
}

/// Write a temporary script file into a given directory
pub(crate) async fn write_script_in(
    dir: &Path,
    prefix: &str,
    extension: &str,
    content: &str,
) -> std::io::Result<tempfile::TempPath> {
    let suffix = format!(".{}", extension);
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    if !extension.is_empty() {
        builder.suffix(&suffix);
    }
    let path = builder.tempfile_in(dir)?.into_temp_path();

    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Feed process output into the task variable and build the result
pub(crate) fn finish(definition: &mut TaskDefinition, output: &ProcessOutput) -> TaskResult {
    for line in output.stderr.lines() {
        debug!(task = %definition.title, "stderr: {}", line);
    }

    let matched = definition.variable.set_value(&output.stdout);
    if !matched {
        warn!(
            task = %definition.title,
            regex = %definition.variable.regex(),
            "output did not match the variable regex"
        );
    }
    if !output.success() {
        warn!(task = %definition.title, exit_code = ?output.exit_code, "task process failed");
    }

    TaskResult::new(output.success() && matched, definition.variable.clone())
}

/// Code executed by an external interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTask {
    kind: ScriptKind,
    definition: TaskDefinition,
    code: String,
}

impl ScriptTask {
    pub fn new(kind: ScriptKind, definition: TaskDefinition, code: impl Into<String>) -> Self {
        Self {
            kind,
            definition,
            code: code.into(),
        }
    }

    pub fn shell(definition: TaskDefinition, code: impl Into<String>) -> Self {
        Self::new(ScriptKind::Shell, definition, code)
    }

    pub fn script_kind(&self) -> ScriptKind {
        self.kind
    }

    async fn execute(&self, parameters: &TaskParameters) -> Result<ProcessOutput, ScriptError> {
        let interpreter = self
            .kind
            .interpreter()
            .ok_or(ScriptError::InterpreterMissing(self.kind.name()))?;

        let source = if self.is_regular_file_code() {
            tokio::fs::read_to_string(self.code.trim()).await?
        } else {
            self.code.clone()
        };
        let script = parameters.render(&source);

        let prefix = format!("hyperion-{}-task-", self.kind.name());
        let path = write_script(&prefix, self.kind.extensions()[0], &script, parameters).await?;

        let spec = self
            .kind
            .command(&interpreter, &path)
            .working_dir(&parameters.document.working_dir);
        Ok(run_process(&spec, parameters.deadline).await)
    }
}

#[async_trait::async_trait]
impl Task for ScriptTask {
    fn kind(&self) -> &'static str {
        self.kind.name()
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

    fn is_regular_file_code(&self) -> bool {
        let path = Path::new(self.code.trim());
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| self.kind.extensions().contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
    }

    async fn run(&mut self, parameters: &TaskParameters) -> TaskResult {
        match self.execute(parameters).await {
            Ok(output) => finish(&mut self.definition, &output),
            Err(e) => {
                error!(task = %self.definition.title, kind = self.kind.name(), "{}", e);
                TaskResult::failure(&self.definition.variable)
            }
        }
    }

    fn copy(&self) -> Box<dyn Task> {
        Box::new(Self {
            kind: self.kind,
            definition: self.definition.copy(),
            code: self.code.clone(),
        })
    }
}
