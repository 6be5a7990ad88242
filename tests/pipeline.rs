//! End-to-end tests: real compile, real V8 isolate, real renderers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docsandbox::{
    render, render_blocking, DataObject, DocumentKind, RenderRequest, RenderResult, SandboxConfig,
};
use serde_json::json;
use std::time::{Duration, Instant};

fn day_one() -> DataObject {
    serde_json::from_value(json!({
        "project": {"title": "Northern Lights", "company": "Aurora Films"},
        "selection": {
            "id": "A001",
            "day": 1,
            "ocf": [
                {"name": "A001C001", "size": 1_500_000_000u64, "duration": 62.5, "reel": "A001", "copies": ["RAID-1", "LTO-7"]},
                {"name": "A001C002", "size": 500_000_000u64, "duration": 30, "reel": "A001", "copies": [{"volume": "RAID-1"}]}
            ]
        },
        "all": [{"id": "A001"}]
    }))
    .unwrap()
}

fn request(kind: DocumentKind, source: &str) -> RenderRequest {
    RenderRequest {
        source: source.to_string(),
        kind,
        data: day_one(),
    }
}

fn run(kind: DocumentKind, source: &str) -> RenderResult {
    render_blocking(request(kind, source), &SandboxConfig::default())
}

fn output(result: RenderResult) -> String {
    match result {
        RenderResult::Success { output } => output,
        RenderResult::Failure { error } => panic!("render failed: {error}"),
    }
}

fn error(result: RenderResult) -> String {
    match result {
        RenderResult::Success { output } => panic!("render unexpectedly succeeded: {output}"),
        RenderResult::Failure { error } => error,
    }
}

const EMAIL_REPORT: &str = r#"
interface Props { title?: string }

const Header = ({ title }: Props) => <Heading>{title}</Heading>;

export default function Report() {
  const log = data.selection as { id: string };
  return (
    <Html>
      <Head />
      <Preview>Day report for {log.id}</Preview>
      <Body>
        <Container>
          <Header title={data.project.title} />
          <Text>Roll {log.id}</Text>
          <Text>{data.totals.ocf.count} clips, {data.totals.ocf.sizeText}</Text>
        </Container>
      </Body>
    </Html>
  );
}
"#;

const PDF_REPORT: &str = r#"
const styles = StyleSheet.create({
  page: { padding: 40 },
  title: { fontSize: 18, fontWeight: "bold" },
});

export default () => (
  <Document title="Day 1" author={data.project.company}>
    <Page size="A4" style={styles.page}>
      <Text style={styles.title}>{data.project.title}</Text>
      <View style={{ flexDirection: "row" }}>
        <Text>Roll</Text>
        <Text>{data.log.id}</Text>
      </View>
      {data.logs.map((log) => (
        <Text>{log.id}: {log.ocf.durationText}</Text>
      ))}
    </Page>
  </Document>
);
"#;

#[test]
fn test_email_output_contains_bound_data() {
    let html = output(run(DocumentKind::Email, EMAIL_REPORT));
    assert!(html.starts_with("<!DOCTYPE html"));
    assert!(html.contains("A001"));
    assert!(html.contains("Northern Lights"));
    assert!(html.contains("2 clips, 2.00 GB"));
}

#[test]
fn test_pdf_output_is_base64_pdf() {
    let encoded = output(run(DocumentKind::Pdf, PDF_REPORT));
    let bytes = STANDARD.decode(encoded).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn test_identical_requests_render_identically() {
    for (kind, source) in [
        (DocumentKind::Email, EMAIL_REPORT),
        (DocumentKind::Pdf, PDF_REPORT),
    ] {
        assert_eq!(run(kind, source), run(kind, source));
    }
}

#[test]
fn test_syntax_errors_fail_without_host_paths() {
    let err = error(run(
        DocumentKind::Email,
        "export default () => <Html><Text>unclosed</Html>;",
    ));
    assert!(err.starts_with("Template failed to compile"), "{err}");
    assert!(!err.contains(env!("CARGO_MANIFEST_DIR")), "{err}");
    assert!(!err.contains("file://"), "{err}");
    assert!(!err.contains("\n    at "), "{err}");
}

#[test]
fn test_pdf_primitives_are_undefined_in_email() {
    let err = error(run(
        DocumentKind::Email,
        "export default () => <Page><Text>x</Text></Page>;",
    ));
    assert!(err.contains("Page is not defined"), "{err}");
}

#[test]
fn test_email_primitives_are_undefined_in_pdf() {
    let err = error(run(
        DocumentKind::Pdf,
        "export default () => <Html><Text>x</Text></Html>;",
    ));
    assert!(err.contains("Html is not defined"), "{err}");
}

#[test]
fn test_infinite_loops_time_out() {
    let config = SandboxConfig {
        timeout_ms: 200,
        ..Default::default()
    };
    for source in [
        "while (true) {}\nexport default () => null;",
        "export default () => { for (;;) {} };",
    ] {
        let started = Instant::now();
        let result = render_blocking(request(DocumentKind::Email, source), &config);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            error(result),
            "Template did not finish within 200ms and was stopped"
        );
    }
}

#[test]
fn test_memory_limit_stops_runaway_allocation() {
    let config = SandboxConfig {
        timeout_ms: 10_000,
        max_heap_size: Some(32 * 1024 * 1024),
    };
    let source = r#"export default () => { const a = []; for (;;) a.push("x".repeat(1e6)); };"#;
    let err = error(render_blocking(request(DocumentKind::Email, source), &config));
    assert_eq!(
        err,
        "Template threw an error: template exceeded the memory limit of 32 MiB"
    );
}

#[test]
fn test_uppercase_url_attributes_are_filtered() {
    let source = r#"
export default () => (
  <Html>
    <Body>
      <a HREF="javascript:alert(1)" Title="reel">Reel A001</a>
      <img SRC="data:text/html,<script>alert(1)</script>" />
    </Body>
  </Html>
);
"#;
    let html = output(run(DocumentKind::Email, source));
    let lower = html.to_ascii_lowercase();
    assert!(!lower.contains("javascript"), "{html}");
    assert!(!lower.contains("data:text"), "{html}");
    assert!(html.contains(r#"<a title="reel">Reel A001</a>"#), "{html}");
}

#[test]
fn test_non_function_exports_have_no_entry_point() {
    let err = error(run(DocumentKind::Pdf, "export default 42"));
    assert!(err.contains("did not export a document"), "{err}");
    assert!(err.contains("a number (42)"), "{err}");

    let err = error(run(DocumentKind::Email, "const unused = 1;"));
    assert!(err.contains("did not export a document"), "{err}");
}

#[test]
fn test_thrown_errors_are_runtime_errors() {
    let err = error(run(
        DocumentKind::Email,
        "export default () => { throw new Error('boom'); };",
    ));
    assert_eq!(err, "Template threw an error: Error: boom");

    let err = error(run(
        DocumentKind::Email,
        "export default async () => { throw new TypeError('late'); };",
    ));
    assert_eq!(err, "Template threw an error: TypeError: late");
}

#[test]
fn test_host_apis_are_unreachable() {
    let html = output(run(
        DocumentKind::Email,
        r#"export default () => (
          <Html>
            <Text>
              {[typeof Deno, typeof fetch, typeof setTimeout, typeof process, typeof require].join("|")}
            </Text>
          </Html>
        );"#,
    ));
    assert!(html.contains("undefined|undefined|undefined|undefined|undefined"));
}

#[test]
fn test_data_is_frozen_inside_the_sandbox() {
    let html = output(run(
        DocumentKind::Email,
        r#"export default () => (
          <Html><Text>{String(Object.isFrozen(data) && Object.isFrozen(data.project))}</Text></Html>
        );"#,
    ));
    assert!(html.contains(">true<"));

    let err = error(run(
        DocumentKind::Email,
        r#"export default () => { data.project.title = "changed"; return <Html />; };"#,
    ));
    assert!(err.contains("TypeError"), "{err}");
}

#[test]
fn test_console_is_inert() {
    let html = output(run(
        DocumentKind::Email,
        r#"console.log("top level", data);
        export default () => { console.error("in render"); return <Html><Text>ok</Text></Html>; };"#,
    ));
    assert!(html.contains("ok"));
}

#[test]
fn test_imports_resolve_to_the_kind_capabilities() {
    let html = output(run(
        DocumentKind::Email,
        r#"import { Html, Text } from "@react-email/components";
        import React from "react";
        export default () => <Html><Text>{typeof React.createElement}</Text></Html>;"#,
    ));
    assert!(html.contains("function"));

    let err = error(run(
        DocumentKind::Email,
        r#"import { Page } from "@react-pdf/renderer";
        export default () => <Page />;"#,
    ));
    assert!(err.contains("Page"), "{err}");
}

#[test]
fn test_missing_project_is_a_bind_error() {
    let mut request = request(DocumentKind::Email, EMAIL_REPORT);
    request.data.project = serde_json::Value::Null;
    let err = error(render_blocking(request, &SandboxConfig::default()));
    assert_eq!(err, "Template data is invalid: `project` is required");
}

#[test]
fn test_pdf_layout_errors_are_render_errors() {
    let err = error(run(DocumentKind::Pdf, "export default () => <Text>loose</Text>;"));
    assert_eq!(
        err,
        "Failed to render pdf document: <Text> must be placed inside a <Page>"
    );
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let config = SandboxConfig::default();
    let leaky = r#"
      globalThis.counter = (globalThis.counter ?? 0) + 1;
      export default () => <Html><Text>count={globalThis.counter}</Text></Html>;
    "#;
    let (a, b) = tokio::join!(
        render(request(DocumentKind::Email, leaky), &config),
        render(request(DocumentKind::Email, leaky), &config),
    );
    assert!(output(a).contains("count=1"));
    assert!(output(b).contains("count=1"));
}
