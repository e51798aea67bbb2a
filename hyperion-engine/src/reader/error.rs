// Reader error types
// Location, source context and fix suggestions for malformed documents

use crate::error::ValidationError;

use std::fmt;
use std::path::Path;

/// Error raised while reading a document
#[derive(Debug, Clone)]
pub struct ReadError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Source lines around the error, or the document path of the failing item
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    pub kind: ReadErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// YAML or JSON syntax error
    Syntax,
    /// Wrong types or missing fields
    InvalidSchema,
    UnknownField,
    UnknownTaskType,
    /// Semantic check failed
    Validation,
    /// File could not be read
    Io,
}

impl ReadError {
    pub fn new(message: impl Into<String>, kind: ReadErrorKind) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
            context: String::new(),
            suggestion: None,
            kind,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn with_suggestion_opt(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Prefix the message with where in the document the error happened
    pub fn within(mut self, path: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", path, self.message);
        self
    }

    /// Attach the source lines around the error location
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        if self.line == 0 {
            return self;
        }

        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let marker = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", marker, line_num, line));

            if line_num == self.line && self.column > 0 {
                context.push_str(&format!("       | {}^\n", " ".repeat(self.column - 1)));
            }
        }

        self.context = context;
        self
    }

    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));

        let message = err.to_string();
        let (text, kind) = describe_serde_message(&message);
        let suggestion = suggest_fix(&message, source, line);

        ReadError::new(text, kind)
            .at(line, column)
            .with_source_context(source, 2)
            .with_suggestion_opt(suggestion)
    }

    pub fn from_json_error(err: &serde_json::Error, source: &str) -> Self {
        let message = err.to_string();
        let (text, kind) = if err.is_syntax() || err.is_eof() {
            (strip_location(&message), ReadErrorKind::Syntax)
        } else {
            describe_serde_message(&message)
        };

        ReadError::new(text, kind)
            .at(err.line(), err.column())
            .with_source_context(source, 2)
    }

    /// Error from deserializing a detached node (no location available)
    pub fn from_value_error(err: &serde_yaml::Error) -> Self {
        let (text, kind) = describe_serde_message(&err.to_string());
        ReadError::new(text, kind)
    }

    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        ReadError::new(
            format!("cannot read '{}': {}", path.display(), err),
            ReadErrorKind::Io,
        )
    }
}

impl From<ValidationError> for ReadError {
    fn from(err: ValidationError) -> Self {
        let kind = match err {
            ValidationError::UnknownField(_) => ReadErrorKind::UnknownField,
            ValidationError::UnknownTaskType(_) => ReadErrorKind::UnknownTaskType,
            ValidationError::MissingField(_) => ReadErrorKind::InvalidSchema,
            _ => ReadErrorKind::Validation,
        };
        ReadError::new(err.to_string(), kind)
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        if self.line > 0 {
            writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ReadError {}

pub type ReadResult<T> = Result<T, ReadError>;

/// Turn a serde message into readable text and an error kind
fn describe_serde_message(msg: &str) -> (String, ReadErrorKind) {
    if let Some(field) = between(msg, "missing field `", "`") {
        return (
            ValidationError::MissingField(field).to_string(),
            ReadErrorKind::InvalidSchema,
        );
    }

    if let Some(field) = between(msg, "unknown field `", "`") {
        let mut text = ValidationError::UnknownField(field).to_string();
        if let Some(expected) = expected_fields(msg) {
            text.push_str(&format!(" Expected one of: {}", expected.join(", ")));
        }
        return (text, ReadErrorKind::UnknownField);
    }

    if msg.contains("invalid type") {
        if let (Some(found), Some(expected)) = (
            between(msg, "invalid type: ", ", expected"),
            between(msg, ", expected ", " at").or_else(|| after(msg, ", expected ")),
        ) {
            return (
                format!("expected {}, but found {}", expected, found),
                ReadErrorKind::InvalidSchema,
            );
        }
    }

    (strip_location(msg), ReadErrorKind::Syntax)
}

fn between(msg: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(suffix)? + start;
    Some(msg[start..end].to_string())
}

fn after(msg: &str, prefix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    Some(msg[start..].to_string())
}

fn expected_fields(msg: &str) -> Option<Vec<String>> {
    let fields = after(msg, "expected one of ")?;
    let end = fields.find(" at line").unwrap_or(fields.len());
    Some(
        fields[..end]
            .split(", ")
            .map(|s| s.trim_matches('`').to_string())
            .collect(),
    )
}

fn strip_location(msg: &str) -> String {
    match msg.find(" at line ") {
        Some(index) => msg[..index].to_string(),
        None => msg.to_string(),
    }
}

/// Suggest fixes for common document mistakes
fn suggest_fix(msg: &str, source: &str, line: usize) -> Option<String> {
    let error_line = source
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or_default();

    if msg.contains("missing field `tasks`") {
        return Some("every task group needs a 'tasks' list".to_string());
    }

    if msg.contains("unknown field `task_groups`") || msg.contains("unknown field `taskGroups`") {
        return Some("did you mean 'taskgroups'?".to_string());
    }

    if error_line.starts_with('\t') {
        return Some("YAML does not allow tabs for indentation. Replace tabs with spaces.".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_display() {
        let err = ReadError::new("Missing required field 'tasks'", ReadErrorKind::InvalidSchema)
            .at(4, 3)
            .with_suggestion("every task group needs a 'tasks' list");

        let output = err.to_string();
        assert!(output.contains("error: Missing required field 'tasks'"));
        assert!(output.contains("line 4:3"));
        assert!(output.contains("help:"));
    }

    #[test]
    fn test_display_without_location() {
        let err = ReadError::new("boom", ReadErrorKind::Validation);
        assert!(!err.to_string().contains("-->"));
    }

    #[test]
    fn test_source_context_marks_line() {
        let source = "a: 1\nb: 2\nc: 3\nd: 4";
        let err = ReadError::new("bad", ReadErrorKind::Syntax)
            .at(3, 2)
            .with_source_context(source, 1);

        assert!(err.context.contains(">    3 | c: 3"));
        assert!(err.context.contains("b: 2"));
        assert!(err.context.contains("d: 4"));
        assert!(err.context.contains("^"));
    }

    #[test]
    fn test_describe_unknown_field() {
        let (text, kind) = describe_serde_message(
            "unknown field `colour`, expected one of `title`, `tasks` at line 2 column 3",
        );
        assert_eq!(kind, ReadErrorKind::UnknownField);
        assert_eq!(text, "Unknown field 'colour'! Expected one of: title, tasks");
    }

    #[test]
    fn test_describe_missing_field() {
        let (text, kind) = describe_serde_message("missing field `code` at line 3 column 5");
        assert_eq!(kind, ReadErrorKind::InvalidSchema);
        assert_eq!(text, "Missing required field 'code'");
    }

    #[test]
    fn test_from_validation() {
        let err: ReadError = ValidationError::UnknownTaskType("groovy".into()).into();
        assert_eq!(err.kind, ReadErrorKind::UnknownTaskType);
        assert_eq!(err.message, "Unknown task type 'groovy'");
    }
}
