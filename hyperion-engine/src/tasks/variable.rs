// Task Variable
// Named output slot filled from raw task output through a regex

use crate::error::ValidationError;

use regex::{Regex, RegexBuilder};
use std::fmt;

/// Name given to a task variable when none is configured
pub const DEFAULT_VARIABLE_NAME: &str = "default";

/// Pattern that keeps the whole output
pub const DEFAULT_REGEX: &str = "(?s).*";

/// Named, regex-extractable output value of a task.
///
/// `Clone` produces a snapshot carrying the current value; [`Variable::fresh`]
/// produces the same configuration with an empty value.
#[derive(Clone)]
pub struct Variable {
    name: String,
    value: String,
    regex: Regex,
    group: usize,
    line_by_line: bool,
}

impl Variable {
    /// Create a validated variable
    pub fn new(
        name: impl Into<String>,
        regex: &str,
        group: usize,
        line_by_line: bool,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyVariableName);
        }

        let compiled = RegexBuilder::new(regex)
            .multi_line(!line_by_line)
            .build()
            .map_err(|e| ValidationError::InvalidRegex {
                regex: regex.to_string(),
                reason: e.to_string(),
            })?;

        // captures_len includes the implicit group 0
        if group >= compiled.captures_len() {
            return Err(ValidationError::RegexGroupOutOfRange {
                regex: regex.to_string(),
                group,
            });
        }

        Ok(Self {
            name,
            value: String::new(),
            regex: compiled,
            group,
            line_by_line,
        })
    }

    /// Create a pass-through variable with the given name
    pub fn named(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(name, DEFAULT_REGEX, 0, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn regex(&self) -> &str {
        self.regex.as_str()
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn is_line_by_line(&self) -> bool {
        self.line_by_line
    }

    /// Same configuration, empty value
    pub fn fresh(&self) -> Self {
        Self {
            value: String::new(),
            ..self.clone()
        }
    }

    /// Extract a value from raw output.
    ///
    /// Returns true when the regex matched at least once. On no match the
    /// previous value is kept.
    pub fn set_value(&mut self, raw: &str) -> bool {
        let extracted = if self.line_by_line {
            self.extract_lines(raw)
        } else {
            self.extract_whole(raw)
        };

        match extracted {
            Some(value) => {
                self.value = value.trim().to_string();
                true
            }
            None => false,
        }
    }

    fn extract_whole(&self, raw: &str) -> Option<String> {
        let captures = self.regex.captures(raw)?;
        Some(
            captures
                .get(self.group)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        )
    }

    fn extract_lines(&self, raw: &str) -> Option<String> {
        let mut matched = false;
        let mut collected = String::new();

        for line in raw.lines() {
            if let Some(captures) = self.regex.captures(line) {
                if matched {
                    collected.push('\n');
                }
                matched = true;
                if let Some(m) = captures.get(self.group) {
                    collected.push_str(m.as_str());
                }
            }
        }

        matched.then_some(collected)
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self {
            name: DEFAULT_VARIABLE_NAME.to_string(),
            value: String::new(),
            regex: Regex::new(DEFAULT_REGEX).expect("default regex is valid"),
            group: 0,
            line_by_line: false,
        }
    }
}

/// Configuration equality; the current value is not compared
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.regex.as_str() == other.regex.as_str()
            && self.group == other.group
            && self.line_by_line == other.line_by_line
    }
}

impl Eq for Variable {}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("regex", &self.regex.as_str())
            .field("group", &self.group)
            .field("line_by_line", &self.line_by_line)
            .finish()
    }
}
