//! Source compiler: TSX template text to a plain JavaScript module.
//!
//! Type annotations are stripped and markup is lowered to `h(type, props,
//! ...children)` calls (`Fragment` for `<>...</>`). Module syntax is kept as
//! is: the sandbox runs the result as an ES module whose imports resolve to
//! inert in-memory modules, and reads the document program from its
//! `default` export.

use deno_ast::diagnostics::Diagnostic;
use deno_ast::{
    EmitOptions, MediaType, ModuleSpecifier, ParseDiagnostic, ParseParams, SourceMapOption,
    TranspileOptions,
};

/// JSX factory the compiled code calls; installed as a sandbox global.
pub const JSX_FACTORY: &str = "h";
pub const JSX_FRAGMENT: &str = "Fragment";

/// Synthetic name the template is parsed and evaluated under. It never
/// corresponds to a file.
pub(crate) const TEMPLATE_SPECIFIER: &str = "sandbox:///template.tsx";

/// Executable JavaScript produced from template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    code: String,
}

impl CompiledProgram {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }
}

/// Parser or transpiler diagnostic for template source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl CompileError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    fn from_diagnostic(diagnostic: &ParseDiagnostic) -> Self {
        let position = diagnostic.display_position();
        Self {
            message: format!(
                "{} (line {}, column {})",
                diagnostic.message(),
                position.line_number,
                position.column_number
            ),
            line: Some(position.line_number),
            column: Some(position.column_number),
        }
    }
}

impl From<CompileError> for crate::RenderError {
    fn from(err: CompileError) -> Self {
        crate::RenderError::compile(err.message)
    }
}

/// Compiles template source. Pure function of `source`.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub fn compile(source: &str) -> Result<CompiledProgram, CompileError> {
    if source.trim().is_empty() {
        return Err(CompileError::new("template source is empty"));
    }

    let specifier = ModuleSpecifier::parse(TEMPLATE_SPECIFIER)
        .map_err(|e| CompileError::new(format!("invalid template specifier: {e}")))?;

    let parsed = deno_ast::parse_module(ParseParams {
        specifier,
        text: source.into(),
        media_type: MediaType::Tsx,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    })
    .map_err(|diagnostic| CompileError::from_diagnostic(&diagnostic))?;

    // Recoverable syntax errors don't fail the parse, but the program is
    // still invalid.
    if let Some(diagnostic) = parsed.diagnostics().first() {
        return Err(CompileError::from_diagnostic(diagnostic));
    }

    let emitted = parsed
        .transpile(
            &transpile_options(),
            &EmitOptions {
                source_map: SourceMapOption::None,
                ..Default::default()
            },
        )
        .map_err(|e| CompileError::new(e.to_string()))?
        .into_source()
        .into_string()
        .map_err(|e| CompileError::new(e.to_string()))?;

    tracing::debug!(bytes = emitted.text.len(), "template compiled");
    Ok(CompiledProgram { code: emitted.text })
}

fn transpile_options() -> TranspileOptions {
    TranspileOptions {
        transform_jsx: true,
        jsx_automatic: false,
        jsx_factory: JSX_FACTORY.to_string(),
        jsx_fragment_factory: JSX_FRAGMENT.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_types_and_lowers_markup() {
        let program = compile(
            r#"
            interface Props { title: string }
            const Title = ({ title }: Props): unknown => <Text bold>{title}</Text>;
            export default function Report(): unknown {
              return <><Title title="Day 1" /></>;
            }
            "#,
        )
        .unwrap();

        let code = program.code();
        assert!(!code.contains("interface"));
        assert!(!code.contains(": Props"));
        assert!(code.contains("h(Text"));
        assert!(code.contains("h(Fragment"));
        assert!(code.contains("export default function Report"));
    }

    #[test]
    fn test_keeps_imports_for_the_loader() {
        let program = compile(
            r#"
            import { Html, Text } from "@react-email/components";
            export default () => <Html><Text>hi</Text></Html>;
            "#,
        )
        .unwrap();
        assert!(program.code().contains("@react-email/components"));
    }

    #[test]
    fn test_drops_type_only_imports() {
        let program = compile(
            r#"
            import type { Log } from "./types";
            export default (log?: Log) => null;
            "#,
        )
        .unwrap();
        assert!(!program.code().contains("./types"));
    }

    #[test]
    fn test_reports_syntax_errors_with_position() {
        let err = compile("export default function () {\n  return <Text>;\n}\n").unwrap_err();
        assert!(!err.message.is_empty());
        assert!(err.line.is_some());
        assert!(!err.message.contains("file://"));
    }

    #[test]
    fn test_rejects_empty_source() {
        let err = compile("  \n\t").unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let source = "export default () => <View style={{ padding: 4 }} />;";
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }
}
