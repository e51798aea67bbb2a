// Template rendering
// Jinja-style templates ({{ expr }}, {% tag %}) over an attribute tree

use crate::document::model::Value;

use minijinja::{Environment, UndefinedBehavior};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{0}")]
    Syntax(minijinja::Error),

    #[error("{0}")]
    Render(minijinja::Error),
}

impl From<minijinja::Error> for TemplateError {
    fn from(error: minijinja::Error) -> Self {
        match error.kind() {
            minijinja::ErrorKind::SyntaxError => Self::Syntax(error),
            _ => Self::Render(error),
        }
    }
}

/// Rendering environment shared by every template.
///
/// Undefined attributes chain to an empty value, so a missing path
/// renders as the empty string instead of failing.
fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_keep_trailing_newline(true);
    env
}

fn has_tags(template: &str) -> bool {
    template.contains("{{") || template.contains("{%") || template.contains("{#")
}

/// Render a template against a context
pub fn try_render(template: &str, context: &Value) -> Result<String, TemplateError> {
    if !has_tags(template) {
        return Ok(template.to_string());
    }
    Ok(environment().render_str(template, context)?)
}

/// Render a template, returning it unchanged when it cannot be rendered
pub fn render(template: &str, context: &Value) -> String {
    match try_render(template, context) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("template left unrendered: {}", e);
            template.to_string()
        }
    }
}
