// Matrix Parameters
// One named row of substitution values applied to a full document pass

use crate::error::ValidationError;

use std::collections::BTreeMap;

/// A named set of substitution parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixParameters {
    title: String,
    parameters: BTreeMap<String, String>,
}

impl MatrixParameters {
    pub fn new(
        title: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(Self { title, parameters })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

/// Builder for matrix rows, mostly used by tests and embedding code
#[derive(Debug, Default)]
pub struct MatrixBuilder {
    title: String,
    parameters: BTreeMap<String, String>,
}

impl MatrixBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Result<MatrixParameters, ValidationError> {
        MatrixParameters::new(self.title, self.parameters)
    }
}
