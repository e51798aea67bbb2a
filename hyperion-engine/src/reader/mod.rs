// Document reader
// Builds a validated Document from YAML or JSON

pub mod error;
pub mod models;

pub use error::{ReadError, ReadErrorKind, ReadResult};

use crate::document::model::{yaml_to_value, Model, Value};
use crate::document::{Document, MatrixParameters};
use crate::error::ValidationError;
use crate::execution::group::TaskGroup;
use crate::tasks::{Task, TaskDefinition, TaskRegistry, TaskSource, Variable};
use models::{RawDocument, RawMatrix, RawTaskGroup, RawVariable};

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Serialization format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON, everything else YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Reads documents and creates their tasks through a registry
#[derive(Debug, Clone, Default)]
pub struct DocumentReader {
    registry: TaskRegistry,
}

impl DocumentReader {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> ReadResult<Document> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ReadError::io(path, &e))?;
        debug!(path = %path.display(), "reading document");
        self.read_str(&content, DocumentFormat::from_path(path))
    }

    pub fn read_str(&self, content: &str, format: DocumentFormat) -> ReadResult<Document> {
        let raw: RawDocument = match format {
            DocumentFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ReadError::from_yaml_error(&e, content))?
            }
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|e| ReadError::from_json_error(&e, content))?
            }
        };
        self.build(raw)
    }

    fn build(&self, raw: RawDocument) -> ReadResult<Document> {
        let model = raw
            .model
            .as_ref()
            .map(Model::from_yaml)
            .unwrap_or_default();
        let mut document = Document::new(model);

        for (index, matrix) in raw.matrix.iter().enumerate() {
            let row = read_matrix(matrix).map_err(|e| e.within(format!("matrix[{}]", index)))?;
            document.add_matrix_parameters(row);
        }

        for (index, group) in raw.taskgroups.iter().enumerate() {
            let group = self
                .read_task_group(group, index)
                .map_err(|e| e.within(format!("taskgroups[{}]", index)))?;
            document.add_task_group(group);
        }

        Ok(document)
    }

    fn read_task_group(&self, raw: &RawTaskGroup, index: usize) -> ReadResult<TaskGroup> {
        if raw.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        if raw.tasks.is_empty() {
            return Err(ValidationError::EmptyTaskList(raw.title.clone()).into());
        }

        let mut group = TaskGroup::new(raw.title.clone(), raw.parallel);
        for (task_index, fields) in raw.tasks.iter().enumerate() {
            let task = self
                .read_task(fields)
                .map_err(|e| e.within(format!("tasks[{}]", task_index)))?;
            group.add_task(task);
        }

        debug!(group = %raw.title, index, tasks = raw.tasks.len(), "task group read");
        Ok(group)
    }

    fn read_task(&self, fields: &serde_yaml::Mapping) -> ReadResult<Box<dyn Task>> {
        let mut fields = fields.clone();

        let kind = take_string(&mut fields, "type")?
            .ok_or_else(|| ValidationError::MissingField("type".to_string()))?;
        let title = take_string(&mut fields, "title")?.unwrap_or_default();

        let variable = match fields.remove("variable") {
            Some(value) => {
                let raw: RawVariable =
                    serde_yaml::from_value(value).map_err(|e| ReadError::from_value_error(&e))?;
                Variable::new(raw.name, &raw.regex, raw.group, raw.line_by_line)?
            }
            None => Variable::default(),
        };

        let tags: Vec<String> = match fields.remove("tags") {
            Some(value) => {
                serde_yaml::from_value(value).map_err(|e| ReadError::from_value_error(&e))?
            }
            None => Vec::new(),
        };

        let with_values: Vec<Value> = match fields.remove("with") {
            Some(serde_yaml::Value::Sequence(items)) => items.iter().map(yaml_to_value).collect(),
            Some(_) => {
                return Err(ValidationError::InvalidValue {
                    field: "with".to_string(),
                    reason: "expected a list".to_string(),
                }
                .into())
            }
            None => Vec::new(),
        };

        let definition = TaskDefinition::new(title)
            .with_variable(variable)
            .with_tags(tags)
            .with_values(with_values);

        let source = TaskSource {
            kind,
            definition,
            fields,
        };
        self.registry.create(&source)
    }
}

fn read_matrix(raw: &RawMatrix) -> ReadResult<MatrixParameters> {
    let mut parameters = BTreeMap::new();
    for (name, value) in &raw.parameters {
        match yaml_to_value(value) {
            Value::String(text) => {
                parameters.insert(name.clone(), text);
            }
            _ => {
                return Err(ValidationError::InvalidValue {
                    field: format!("parameters.{}", name),
                    reason: "expected a scalar value".to_string(),
                }
                .into())
            }
        }
    }
    Ok(MatrixParameters::new(raw.title.clone(), parameters)?)
}

/// Remove a string field from a task mapping
fn take_string(fields: &mut serde_yaml::Mapping, key: &str) -> ReadResult<Option<String>> {
    match fields.remove(key) {
        None => Ok(None),
        Some(serde_yaml::Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(ValidationError::InvalidValue {
            field: key.to_string(),
            reason: "expected a string".to_string(),
        }
        .into()),
    }
}
