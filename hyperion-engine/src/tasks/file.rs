// File tasks
// Writing rendered content to a file, copying files and downloading them

use crate::execution::parameters::TaskParameters;
use crate::tasks::{Task, TaskDefinition, TaskResult};

use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum FileTaskError {
    #[error("Destination '{0}' already exists")]
    DestinationExists(PathBuf),

    #[error("Source '{0}' is not a file")]
    SourceMissing(PathBuf),

    #[error("Directory '{0}' does not exist")]
    MissingDirectory(PathBuf),

    #[error("Download of {0} did not finish before the task group deadline")]
    DownloadTimedOut(Url),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options shared by the file tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOptions {
    /// Create missing parent directories
    pub ensure_path: bool,
    /// Replace an existing destination
    pub overwrite: bool,
}

fn resolve(parameters: &TaskParameters, rendered: &str) -> PathBuf {
    let path = Path::new(rendered.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        parameters.document.working_dir.join(path)
    }
}

async fn prepare_destination(destination: &Path, options: FileOptions) -> Result<(), FileTaskError> {
    if destination.exists() && !options.overwrite {
        return Err(FileTaskError::DestinationExists(destination.to_path_buf()));
    }

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            if options.ensure_path {
                tokio::fs::create_dir_all(parent).await?;
            } else {
                return Err(FileTaskError::MissingDirectory(parent.to_path_buf()));
            }
        }
    }
    Ok(())
}

/// Store the resulting path in the task variable
fn publish_path(definition: &mut TaskDefinition, path: &Path) -> TaskResult {
    let matched = definition.variable.set_value(&path.to_string_lossy());
    TaskResult::new(matched, definition.variable.clone())
}

/// Writes rendered content to a rendered destination path
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFileTask {
    definition: TaskDefinition,
    content: String,
    destination: String,
    options: FileOptions,
}

impl WriteFileTask {
    pub fn new(
        definition: TaskDefinition,
        content: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            content: content.into(),
            destination: destination.into(),
            options: FileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FileOptions) -> Self {
        self.options = options;
        self
    }

    async fn write(&self, parameters: &TaskParameters) -> Result<PathBuf, FileTaskError> {
        let destination = resolve(parameters, &parameters.render(&self.destination));
        prepare_destination(&destination, self.options).await?;

        let content = parameters.render(&self.content);
        tokio::fs::write(&destination, content).await?;
        info!(task = %self.definition.title, "wrote {}", destination.display());
        Ok(destination)
    }
}

#[async_trait::async_trait]
impl Task for WriteFileTask {
    fn kind(&self) -> &'static str {
        "write-file"
    }

    fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    fn definition_mut(&mut self) -> &mut TaskDefinition {
        &mut self.definition
    }

    async fn run(&mut self, parameters: &TaskParameters) -> TaskResult {
        match self.write(parameters).await {
            Ok(path) => publish_path(&mut self.definition, &path),
            Err(e) => {
                error!(task = %self.definition.title, "{}", e);
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

/// Copies a file to a destination file or directory
#[derive(Debug, Clone, PartialEq)]
pub struct CopyFileTask {
    definition: TaskDefinition,
    source: String,
    destination: String,
    destination_is_directory: bool,
    options: FileOptions,
}

impl CopyFileTask {
    pub fn new(
        definition: TaskDefinition,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            source: source.into(),
            destination: destination.into(),
            destination_is_directory: true,
            options: FileOptions::default(),
        }
    }

    pub fn with_destination_is_directory(mut self, is_directory: bool) -> Self {
        self.destination_is_directory = is_directory;
        self
    }

    pub fn with_options(mut self, options: FileOptions) -> Self {
        self.options = options;
        self
    }

    async fn copy_file(&self, parameters: &TaskParameters) -> Result<PathBuf, FileTaskError> {
        let source = resolve(parameters, &parameters.render(&self.source));
        if !source.is_file() {
            return Err(FileTaskError::SourceMissing(source));
        }

        let mut destination = resolve(parameters, &parameters.render(&self.destination));
        if self.destination_is_directory {
            if !destination.is_dir() {
                if self.options.ensure_path {
                    tokio::fs::create_dir_all(&destination).await?;
                } else {
                    return Err(FileTaskError::MissingDirectory(destination));
                }
            }
            if let Some(name) = source.file_name() {
                destination.push(name);
            }
        }

        prepare_destination(&destination, self.options).await?;
        tokio::fs::copy(&source, &destination).await?;
        info!(
            task = %self.definition.title,
            "copied {} to {}",
            source.display(),
            destination.display()
        );
        Ok(destination)
    }
}

#[async_trait::async_trait]
impl Task for CopyFileTask {
    fn kind(&self) -> &'static str {
        "copy-file"
    }

    fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    fn definition_mut(&mut self) -> &mut TaskDefinition {
        &mut self.definition
    }

    async fn run(&mut self, parameters: &TaskParameters) -> TaskResult {
        match self.copy_file(parameters).await {
            Ok(path) => publish_path(&mut self.definition, &path),
            Err(e) => {
                error!(task = %self.definition.title, "{}", e);
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

/// Fetches a URL over HTTP(S) into a rendered destination path
#[derive(Debug, Clone)]
pub struct DownloadTask {
    definition: TaskDefinition,
    url: Url,
    destination: String,
    options: FileOptions,
    client: Client,
}

impl PartialEq for DownloadTask {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
            && self.url == other.url
            && self.destination == other.destination
            && self.options == other.options
    }
}

impl DownloadTask {
    pub fn new(definition: TaskDefinition, url: Url, destination: impl Into<String>) -> Self {
        Self {
            definition,
            url,
            destination: destination.into(),
            options: FileOptions::default(),
            client: Client::new(),
        }
    }

    pub fn with_options(mut self, options: FileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<u8>, FileTaskError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn download(&self, parameters: &TaskParameters) -> Result<PathBuf, FileTaskError> {
        let destination = resolve(parameters, &parameters.render(&self.destination));
        prepare_destination(&destination, self.options).await?;

        info!(task = %self.definition.title, url = %self.url, "downloading");
        let body = match parameters.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.fetch())
                .await
                .map_err(|_| FileTaskError::DownloadTimedOut(self.url.clone()))??,
            None => self.fetch().await?,
        };

        tokio::fs::write(&destination, body).await?;
        info!(task = %self.definition.title, "wrote {}", destination.display());
        Ok(destination)
    }
}

#[async_trait::async_trait]
impl Task for DownloadTask {
    fn kind(&self) -> &'static str {
        "download"
    }

    fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    fn definition_mut(&mut self) -> &mut TaskDefinition {
        &mut self.definition
    }

    async fn run(&mut self, parameters: &TaskParameters) -> TaskResult {
        match self.download(parameters).await {
            Ok(path) => publish_path(&mut self.definition, &path),
            Err(e) => {
                error!(task = %self.definition.title, url = %self.url, "{}", e);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::Model;
    use crate::execution::parameters::{
        DocumentParameters, TaskGroupParameters, VariableStore, WithParameters,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    fn parameters(temp: &TempDir) -> TaskParameters {
        let document = DocumentParameters::default().with_working_dir(temp.path());
        let group = TaskGroupParameters::new(Arc::new(document), Arc::new(Model::default()));
        TaskParameters::new(&group, VariableStore::new())
    }

    #[tokio::test]
    async fn test_write_file_renders_content_and_path() {
        let temp = TempDir::new().unwrap();
        let params = parameters(&temp)
            .with_parameters(WithParameters::new(0, "alpha".into()));
        let mut task = WriteFileTask::new(
            TaskDefinition::new("write"),
            "name={{ with.value }}",
            "out/{{ with.value }}.txt",
        )
        .with_options(FileOptions {
            ensure_path: true,
            overwrite: false,
        });

        let result = task.run(&params).await;

        let expected = temp.path().join("out/alpha.txt");
        assert!(result.is_success());
        assert_eq!(result.variable().value(), expected.to_string_lossy());
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "name=alpha");
    }

    #[tokio::test]
    async fn test_write_file_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "old").unwrap();

        let mut task = WriteFileTask::new(TaskDefinition::new("w"), "new", "a.txt");
        assert!(!task.run(&parameters(&temp)).await.is_success());
        assert_eq!(std::fs::read_to_string(temp.path().join("a.txt")).unwrap(), "old");

        let mut task = WriteFileTask::new(TaskDefinition::new("w"), "new", "a.txt").with_options(
            FileOptions {
                ensure_path: false,
                overwrite: true,
            },
        );
        assert!(task.run(&parameters(&temp)).await.is_success());
        assert_eq!(std::fs::read_to_string(temp.path().join("a.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_file_missing_directory() {
        let temp = TempDir::new().unwrap();
        let mut task = WriteFileTask::new(TaskDefinition::new("w"), "x", "missing/a.txt");
        assert!(!task.run(&parameters(&temp)).await.is_success());
    }

    #[tokio::test]
    async fn test_copy_into_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("src.txt"), "data").unwrap();

        let mut task = CopyFileTask::new(TaskDefinition::new("c"), "src.txt", "target")
            .with_options(FileOptions {
                ensure_path: true,
                overwrite: false,
            });
        let result = task.run(&parameters(&temp)).await;

        let expected = temp.path().join("target").join("src.txt");
        assert!(result.is_success());
        assert_eq!(result.variable().value(), expected.to_string_lossy());
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "data");
    }

    #[tokio::test]
    async fn test_copy_to_file_and_missing_source() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("src.txt"), "data").unwrap();

        let mut task = CopyFileTask::new(TaskDefinition::new("c"), "src.txt", "renamed.txt")
            .with_destination_is_directory(false);
        assert!(task.run(&parameters(&temp)).await.is_success());
        assert!(temp.path().join("renamed.txt").is_file());

        let mut task = CopyFileTask::new(TaskDefinition::new("c"), "nope.txt", "x.txt")
            .with_destination_is_directory(false);
        assert!(!task.run(&parameters(&temp)).await.is_success());
    }

    /// Answers a single HTTP request with the given status line and body
    async fn serve_once(status: &'static str, body: &'static str) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });
        Url::parse(&format!("http://{}/payload.txt", address)).unwrap()
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let temp = TempDir::new().unwrap();
        let url = serve_once("200 OK", "downloaded").await;

        let mut task = DownloadTask::new(TaskDefinition::new("d"), url, "files/payload.txt")
            .with_client(local_client())
            .with_options(FileOptions {
                ensure_path: true,
                overwrite: false,
            });
        let result = task.run(&parameters(&temp)).await;

        let expected = temp.path().join("files").join("payload.txt");
        assert!(result.is_success());
        assert_eq!(result.variable().value(), expected.to_string_lossy());
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "downloaded");
    }

    #[tokio::test]
    async fn test_download_http_error_fails() {
        let temp = TempDir::new().unwrap();
        let url = serve_once("404 Not Found", "").await;

        let mut task = DownloadTask::new(TaskDefinition::new("d"), url, "payload.txt")
            .with_client(local_client());
        assert!(!task.run(&parameters(&temp)).await.is_success());
        assert!(!temp.path().join("payload.txt").exists());
    }

    #[tokio::test]
    async fn test_download_refuses_overwrite_and_missing_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("payload.txt"), "old").unwrap();
        let url = Url::parse("http://127.0.0.1:9/payload.txt").unwrap();

        let mut task = DownloadTask::new(TaskDefinition::new("d"), url.clone(), "payload.txt")
            .with_client(local_client());
        assert!(!task.run(&parameters(&temp)).await.is_success());
        assert_eq!(std::fs::read_to_string(temp.path().join("payload.txt")).unwrap(), "old");

        let mut task = DownloadTask::new(TaskDefinition::new("d"), url, "missing/payload.txt")
            .with_client(local_client());
        assert!(!task.run(&parameters(&temp)).await.is_success());
        assert!(!temp.path().join("missing").exists());
    }

    #[test]
    fn test_download_copy_keeps_url() {
        let url = Url::parse("https://example.com/a.zip").unwrap();
        let task = DownloadTask::new(TaskDefinition::new("d"), url.clone(), "a.zip");
        let copy = task.copy();
        assert!(copy.same_configuration(&task));
        assert_eq!(copy.kind(), "download");
        assert_eq!(task.url(), &url);
    }
}
