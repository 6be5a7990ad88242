//! Failure taxonomy for a single render attempt.
//!
//! Every component converts its own failures into one of these variants
//! before handing control back to the pipeline, so nothing crosses the
//! result adapter as an unstructured error.

use crate::capabilities::DocumentKind;
use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The source text is not valid template syntax.
    #[error("Template failed to compile: {0}")]
    Compile(String),

    /// The bound data object is missing its required shape.
    #[error("Template data is invalid: {0}")]
    Bind(String),

    /// The template threw while it was running inside the sandbox.
    #[error("Template threw an error: {0}")]
    Runtime(String),

    #[error("Template did not finish within {}ms and was stopped", .0.as_millis())]
    Timeout(Duration),

    #[error("Template did not export a document: expected `export default` of a function returning a document, found {0}")]
    NoEntryPoint(String),

    #[error("Failed to render {kind} document: {message}")]
    Render { kind: DocumentKind, message: String },

    /// Host-side failure unrelated to the template (thread or runtime setup).
    #[error("Renderer failed internally: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    pub fn bind(msg: impl Into<String>) -> Self {
        Self::Bind(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn render(kind: DocumentKind, msg: impl Into<String>) -> Self {
        Self::Render {
            kind,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable short name of the failure class, used in logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Compile(_) => "compile",
            Self::Bind(_) => "bind",
            Self::Runtime(_) => "runtime",
            Self::Timeout(_) => "timeout",
            Self::NoEntryPoint(_) => "no-entry-point",
            Self::Render { .. } => "render",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_are_stable() {
        assert!(RenderError::compile("x")
            .to_string()
            .starts_with("Template failed to compile:"));
        assert!(RenderError::runtime("x")
            .to_string()
            .starts_with("Template threw an error:"));
        assert!(RenderError::NoEntryPoint("a number (42)".into())
            .to_string()
            .contains("did not export a document"));
        assert_eq!(
            RenderError::Timeout(Duration::from_millis(1000)).to_string(),
            "Template did not finish within 1000ms and was stopped"
        );
        assert_eq!(
            RenderError::render(DocumentKind::Pdf, "bad page").to_string(),
            "Failed to render pdf document: bad page"
        );
    }

    #[test]
    fn test_classes_are_distinct() {
        let errors = [
            RenderError::compile(""),
            RenderError::bind(""),
            RenderError::runtime(""),
            RenderError::Timeout(Duration::ZERO),
            RenderError::NoEntryPoint(String::new()),
            RenderError::render(DocumentKind::Email, ""),
            RenderError::internal(""),
        ];
        let mut classes: Vec<_> = errors.iter().map(RenderError::class).collect();
        classes.sort_unstable();
        classes.dedup();
        assert_eq!(classes.len(), errors.len());
    }
}
