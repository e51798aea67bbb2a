// Docker tasks
// Runs rendered code inside a throwaway container, or builds an image from it

use crate::execution::parameters::TaskParameters;
use crate::runners::capabilities;
use crate::runners::process::{run_process, ProcessOutput, ProcessSpec};
use crate::tasks::script::{finish, write_script, write_script_in};
use crate::tasks::{Task, TaskDefinition, TaskResult};

use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::error;

pub const DEFAULT_IMAGE_VERSION: &str = "latest";

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Docker is not available")]
    DockerNotAvailable,

    #[error("Image tag not specified")]
    MissingRepositoryTag,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operating system family of the container image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Unix,
    Windows,
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unix" => Ok(Platform::Unix),
            "windows" => Ok(Platform::Windows),
            other => Err(format!("unknown platform '{}', expected unix or windows", other)),
        }
    }
}

impl Platform {
    fn work_dir(&self) -> &'static str {
        match self {
            Platform::Unix => "/work",
            Platform::Windows => "C:/work",
        }
    }

    fn host_temp_dir(&self) -> &'static str {
        match self {
            Platform::Unix => "/hosttmp",
            Platform::Windows => "C:/hosttmp",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Platform::Unix => "sh",
            Platform::Windows => "cmd",
        }
    }

    fn interpreter(&self) -> &'static [&'static str] {
        match self {
            Platform::Unix => &["sh"],
            Platform::Windows => &["cmd", "/q", "/c"],
        }
    }
}

/// Code run inside `docker run --rm`
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerTask {
    definition: TaskDefinition,
    code: String,
    image_name: String,
    image_version: String,
    platform: Platform,
}

impl ContainerTask {
    pub fn new(
        definition: TaskDefinition,
        code: impl Into<String>,
        image_name: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            code: code.into(),
            image_name: image_name.into(),
            image_version: DEFAULT_IMAGE_VERSION.to_string(),
            platform: Platform::default(),
        }
    }

    pub fn with_image_version(mut self, version: impl Into<String>) -> Self {
        self.image_version = version.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn image_version(&self) -> &str {
        &self.image_version
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The `docker run` invocation for a script in the given directory
    pub fn docker_command(
        &self,
        image: &str,
        working_dir: &Path,
        script_dir: &Path,
        script_name: &str,
    ) -> ProcessSpec {
        let script = format!("{}/{}", self.platform.host_temp_dir(), script_name);
        ProcessSpec::new("docker")
            .args(["run", "--rm"])
            .arg("-v")
            .arg(format!("{}:{}", working_dir.display(), self.platform.work_dir()))
            .arg("-v")
            .arg(format!("{}:{}", script_dir.display(), self.platform.host_temp_dir()))
            .arg("-w")
            .arg(self.platform.work_dir())
            .arg("-i")
            .arg(image)
            .args(self.platform.interpreter().iter().copied())
            .arg(script)
            .working_dir(working_dir)
    }

    async fn execute(&self, parameters: &TaskParameters) -> Result<ProcessOutput, ContainerError> {
        if !capabilities::has_docker().await {
            return Err(ContainerError::DockerNotAvailable);
        }

        let script = parameters.render(&self.code);
        let path = write_script(
            "hyperion-docker-container-task-",
            self.platform.extension(),
            &script,
            parameters,
        )
        .await?;

        let script_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let script_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let image = format!(
            "{}:{}",
            parameters.render(&self.image_name),
            parameters.render(&self.image_version)
        );

        let spec = self.docker_command(
            &image,
            &parameters.document.working_dir,
            script_dir,
            &script_name,
        );
        Ok(run_process(&spec, parameters.deadline).await)
    }
}

#[async_trait::async_trait]
impl Task for ContainerTask {
    fn kind(&self) -> &'static str {
        "docker-container"
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
        match self.execute(parameters).await {
            Ok(output) => finish(&mut self.definition, &output),
            Err(e) => {
                error!(task = %self.definition.title, image = %self.image_name, "{}", e);
                TaskResult::failure(&self.definition.variable)
            }
        }
    }

    fn copy(&self) -> Box<dyn Task> {
        Box::new(Self {
            definition: self.definition.copy(),
            ..self.clone()
        })
    }
}

/// Dockerfile content built with `docker build` in the working directory
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTask {
    definition: TaskDefinition,
    code: String,
    repository_tag: String,
}

impl ImageTask {
    pub fn new(
        definition: TaskDefinition,
        code: impl Into<String>,
        repository_tag: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            code: code.into(),
            repository_tag: repository_tag.into(),
        }
    }

    pub fn repository_tag(&self) -> &str {
        &self.repository_tag
    }

    /// The `docker build` invocation; the context is the working directory
    pub fn build_command(&self, tag: &str, dockerfile: &Path, context: &Path) -> ProcessSpec {
        ProcessSpec::new("docker")
            .args(["build", "-t"])
            .arg(tag)
            .arg("-f")
            .arg(dockerfile.to_string_lossy())
            .arg(".")
            .working_dir(context)
    }

    async fn execute(&self, parameters: &TaskParameters) -> Result<ProcessOutput, ContainerError> {
        let tag = parameters.render(&self.repository_tag);
        if tag.trim().is_empty() {
            return Err(ContainerError::MissingRepositoryTag);
        }
        if !capabilities::has_docker().await {
            return Err(ContainerError::DockerNotAvailable);
        }

        let source = if self.is_regular_file_code() {
            tokio::fs::read_to_string(self.code.trim()).await?
        } else {
            self.code.clone()
        };
        let dockerfile = parameters.render(&source);

        // docker build only sees files below its context
        let context = &parameters.document.working_dir;
        let path = write_script_in(context, "hyperion-docker-image-task-", "", &dockerfile).await?;

        let spec = self.build_command(tag.trim(), &path, context);
        Ok(run_process(&spec, parameters.deadline).await)
    }
}

#[async_trait::async_trait]
impl Task for ImageTask {
    fn kind(&self) -> &'static str {
        "docker-image"
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
        !self.code.contains('\n') && Path::new(self.code.trim()).is_file()
    }

    async fn run(&mut self, parameters: &TaskParameters) -> TaskResult {
        match self.execute(parameters).await {
            Ok(output) => finish(&mut self.definition, &output),
            Err(e) => {
                error!(task = %self.definition.title, tag = %self.repository_tag, "{}", e);
                TaskResult::failure(&self.definition.variable)
            }
        }
    }

    fn copy(&self) -> Box<dyn Task> {
        Box::new(Self {
            definition: self.definition.copy(),
            ..self.clone()
        })
    }
}
