// Task registry
// Maps task type names from documents to task constructors

use crate::error::ValidationError;
use crate::reader::error::{ReadError, ReadResult};
use crate::tasks::container::{ContainerTask, ImageTask, Platform, DEFAULT_IMAGE_VERSION};
use crate::tasks::file::{CopyFileTask, DownloadTask, FileOptions, WriteFileTask};
use crate::tasks::script::{ScriptKind, ScriptTask};
use crate::tasks::{Task, TaskDefinition};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Everything the reader knows about one task entry
#[derive(Debug, Clone)]
pub struct TaskSource {
    /// Value of the `type` field
    pub kind: String,
    pub definition: TaskDefinition,
    /// Kind-specific fields left after the common ones were taken
    pub fields: serde_yaml::Mapping,
}

impl TaskSource {
    pub fn new(kind: impl Into<String>, definition: TaskDefinition) -> Self {
        Self {
            kind: kind.into(),
            definition,
            fields: serde_yaml::Mapping::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.fields
            .insert(serde_yaml::Value::String(key.to_string()), value.into());
        self
    }

    /// Deserialize the kind-specific fields
    pub fn fields<T: DeserializeOwned>(&self) -> ReadResult<T> {
        serde_yaml::from_value(serde_yaml::Value::Mapping(self.fields.clone()))
            .map_err(|e| ReadError::from_value_error(&e))
    }
}

/// Constructor for one task kind
pub type TaskFactory = fn(&TaskSource) -> ReadResult<Box<dyn Task>>;

/// Static name to constructor table
#[derive(Clone)]
pub struct TaskRegistry {
    factories: BTreeMap<String, TaskFactory>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("types", &self.names())
            .finish()
    }
}

impl TaskRegistry {
    /// A registry without any task kinds
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: TaskFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, source: &TaskSource) -> ReadResult<Box<dyn Task>> {
        match self.factories.get(&source.kind) {
            Some(factory) => factory(source),
            None => Err(ReadError::from(ValidationError::UnknownTaskType(
                source.kind.clone(),
            ))
            .with_suggestion(format!("supported types: {}", self.names().join(", ")))),
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("shell", shell_task);
        registry.register("batch", batch_task);
        registry.register("powershell", powershell_task);
        registry.register("python", python_task);
        registry.register("docker-container", container_task);
        registry.register("docker-image", image_task);
        registry.register("write-file", write_file_task);
        registry.register("copy-file", copy_file_task);
        registry.register("download", download_task);
        registry
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CodedFields {
    code: String,
}

fn script_task(kind: ScriptKind, source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    let fields: CodedFields = source.fields()?;
    Ok(Box::new(ScriptTask::new(
        kind,
        source.definition.clone(),
        fields.code,
    )))
}

fn shell_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    script_task(ScriptKind::Shell, source)
}

fn batch_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    script_task(ScriptKind::Batch, source)
}

fn powershell_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    script_task(ScriptKind::PowerShell, source)
}

fn python_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    script_task(ScriptKind::Python, source)
}

fn default_image_version() -> String {
    DEFAULT_IMAGE_VERSION.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ContainerFields {
    code: String,
    image_name: String,
    #[serde(default = "default_image_version")]
    image_version: String,
    #[serde(default)]
    platform: Option<String>,
}

fn container_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    let fields: ContainerFields = source.fields()?;
    let platform = match fields.platform.as_deref() {
        Some(value) => value.parse::<Platform>().map_err(|reason| {
            ReadError::from(ValidationError::InvalidValue {
                field: "platform".to_string(),
                reason,
            })
        })?,
        None => Platform::default(),
    };

    Ok(Box::new(
        ContainerTask::new(source.definition.clone(), fields.code, fields.image_name)
            .with_image_version(fields.image_version)
            .with_platform(platform),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ImageFields {
    code: String,
    repository_tag: String,
}

fn image_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    let fields: ImageFields = source.fields()?;
    if fields.repository_tag.trim().is_empty() {
        return Err(ReadError::from(ValidationError::InvalidValue {
            field: "repository-tag".to_string(),
            reason: "must not be empty".to_string(),
        }));
    }
    Ok(Box::new(ImageTask::new(
        source.definition.clone(),
        fields.code,
        fields.repository_tag,
    )))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct WriteFileFields {
    content: String,
    destination: String,
    #[serde(default)]
    ensure_path: bool,
    #[serde(default)]
    overwrite: bool,
}

fn write_file_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    let fields: WriteFileFields = source.fields()?;
    Ok(Box::new(
        WriteFileTask::new(source.definition.clone(), fields.content, fields.destination)
            .with_options(FileOptions {
                ensure_path: fields.ensure_path,
                overwrite: fields.overwrite,
            }),
    ))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct CopyFileFields {
    source: String,
    destination: String,
    #[serde(default = "default_true")]
    destination_is_directory: bool,
    #[serde(default)]
    ensure_path: bool,
    #[serde(default)]
    overwrite: bool,
}

fn copy_file_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    let fields: CopyFileFields = source.fields()?;
    Ok(Box::new(
        CopyFileTask::new(source.definition.clone(), fields.source, fields.destination)
            .with_destination_is_directory(fields.destination_is_directory)
            .with_options(FileOptions {
                ensure_path: fields.ensure_path,
                overwrite: fields.overwrite,
            }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct DownloadFields {
    url: String,
    destination: String,
    #[serde(default)]
    ensure_path: bool,
    #[serde(default)]
    overwrite: bool,
}

fn download_task(source: &TaskSource) -> ReadResult<Box<dyn Task>> {
    let fields: DownloadFields = source.fields()?;
    let url = reqwest::Url::parse(&fields.url).map_err(|e| {
        ReadError::from(ValidationError::InvalidValue {
            field: "url".to_string(),
            reason: e.to_string(),
        })
    })?;
    Ok(Box::new(
        DownloadTask::new(source.definition.clone(), url, fields.destination).with_options(
            FileOptions {
                ensure_path: fields.ensure_path,
                overwrite: fields.overwrite,
            },
        ),
    ))
}
