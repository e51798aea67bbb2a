// Raw document models
// Serde shapes of the YAML/JSON document before validation

use serde::Deserialize;
use std::collections::BTreeMap;

/// Top level of a document file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDocument {
    #[serde(default)]
    pub model: Option<serde_yaml::Value>,
    #[serde(default)]
    pub matrix: Vec<RawMatrix>,
    #[serde(default)]
    pub taskgroups: Vec<RawTaskGroup>,
}

/// One matrix row
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMatrix {
    pub title: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTaskGroup {
    pub title: String,
    #[serde(default)]
    pub parallel: bool,
    pub tasks: Vec<serde_yaml::Mapping>,
}

/// Variable settings of a task
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RawVariable {
    #[serde(default = "default_variable_name")]
    pub name: String,
    #[serde(default = "default_regex")]
    pub regex: String,
    #[serde(default)]
    pub group: usize,
    #[serde(default, alias = "lineByLine")]
    pub line_by_line: bool,
}

fn default_variable_name() -> String {
    crate::tasks::variable::DEFAULT_VARIABLE_NAME.to_string()
}

fn default_regex() -> String {
    crate::tasks::variable::DEFAULT_REGEX.to_string()
}
