//! Result adapter: the one shape every render attempt ends in.
//!
//! Error messages are scrubbed on the way out: stack frame lines and
//! absolute host paths never reach the caller.

use crate::compiler::TEMPLATE_SPECIFIER;
use crate::RenderError;
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// HTML for email, base64 PDF bytes for pdf.
    Success { output: String },
    Failure { error: String },
}

impl RenderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success { output } => Some(output),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}

impl From<RenderError> for RenderResult {
    fn from(err: RenderError) -> Self {
        Self::Failure {
            error: scrub(&err.to_string()),
        }
    }
}

impl From<Result<String, RenderError>> for RenderResult {
    fn from(result: Result<String, RenderError>) -> Self {
        match result {
            Ok(output) => Self::Success { output },
            Err(err) => err.into(),
        }
    }
}

/// `{"success": true, "output": ...}` or `{"success": false, "error": ...}`.
impl Serialize for RenderResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RenderResult", 2)?;
        match self {
            Self::Success { output } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("output", output)?;
            }
            Self::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

static STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+at .*(?:\r?\n)?").unwrap());

static FILE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"file://[^\s'"`)]+"#).unwrap());

static UNIX_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[\s(\['"`=:])/(?:[\w.@+~-]+/)+[\w.@+~-]*"#).unwrap()
});

static WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b[A-Za-z]:\\[^\s'"`)]*"#).unwrap());

/// Removes stack frames and host paths from an error message.
pub fn scrub(message: &str) -> String {
    let message = message.replace(TEMPLATE_SPECIFIER, "template");
    let message = STACK_FRAME.replace_all(&message, "");
    let message = FILE_URL.replace_all(&message, "<path>");
    let message = UNIX_PATH.replace_all(&message, "${1}<path>");
    let message = WINDOWS_PATH.replace_all(&message, "<path>");
    message.trim_end().to_string()
}
