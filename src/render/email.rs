//! Email renderer: primitive tree to a complete HTML document.
//!
//! Layout primitives become `role="presentation"` tables, the markup most
//! mail clients lay out consistently. All text and attribute values are
//! escaped; `on*` handlers, `javascript:` URLs and unsafe CSS never make it
//! into the output.

use super::DocumentRenderer;
use crate::capabilities::{capabilities_for, Capability, DocumentKind, EmailPrimitive};
use crate::style::{self, StyleMap};
use crate::tree::Node;
use crate::RenderError;
use serde_json::{Map, Value};

pub const DOCTYPE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#;

const HEAD_META: &str = r#"<meta content="text/html; charset=UTF-8" http-equiv="Content-Type"/><meta name="x-apple-disable-message-reformatting"/>"#;

const PRESENTATION_TABLE: &str =
    r#"align="center" width="100%" border="0" cellpadding="0" cellspacing="0" role="presentation""#;

const PREVIEW_MAX_CHARS: usize = 150;

const VOID_TAGS: &[&str] = &["br", "hr", "img"];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "background", "action", "formaction", "poster"];

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailRenderer;

impl DocumentRenderer for EmailRenderer {
    fn render(&self, tree: &[Node]) -> Result<String, RenderError> {
        let mut writer = HtmlWriter::default();
        let roots: Vec<&Node> = tree.iter().filter(|node| !node.is_blank_text()).collect();

        match roots.as_slice() {
            [root] if root.name() == Some("Html") => writer.node(root)?,
            _ => {
                writer.out.push_str(r#"<html dir="ltr" lang="en"><head>"#);
                writer.out.push_str(HEAD_META);
                writer.out.push_str("</head><body>");
                writer.nodes(tree)?;
                writer.out.push_str("</body></html>");
            }
        }

        Ok(format!("{DOCTYPE}{}", writer.out))
    }
}

#[derive(Default)]
struct HtmlWriter {
    out: String,
}

impl HtmlWriter {
    fn nodes(&mut self, nodes: &[Node]) -> Result<(), RenderError> {
        for node in nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<(), RenderError> {
        match node {
            Node::Text { value } => {
                self.out.push_str(&escape_text(value));
                Ok(())
            }
            Node::Element {
                name,
                props,
                children,
            } => {
                let email = capabilities_for(DocumentKind::Email);
                match email.get(name) {
                    Some(Capability::Email(primitive)) => self.primitive(primitive, props, children),
                    _ if email.is_intrinsic(name) => self.intrinsic(name, props, children),
                    _ => Err(RenderError::render(
                        DocumentKind::Email,
                        format!("<{name}> is not an email element"),
                    )),
                }
            }
        }
    }

    fn primitive(
        &mut self,
        primitive: EmailPrimitive,
        props: &Map<String, Value>,
        children: &[Node],
    ) -> Result<(), RenderError> {
        let style = style::merge(props.get("style"));
        match primitive {
            EmailPrimitive::Html => {
                self.open("html", &[("dir", "ltr"), ("lang", "en")], props, &["dir", "lang"], "", &style);
                self.nodes(children)?;
                self.out.push_str("</html>");
            }
            EmailPrimitive::Head => {
                self.out.push_str("<head>");
                self.out.push_str(HEAD_META);
                self.nodes(children)?;
                self.out.push_str("</head>");
            }
            EmailPrimitive::Preview => {
                let text: String = children
                    .iter()
                    .map(Node::text_content)
                    .collect::<String>()
                    .chars()
                    .take(PREVIEW_MAX_CHARS)
                    .collect();
                self.out.push_str(
                    r#"<div style="display:none;overflow:hidden;line-height:1px;opacity:0;max-height:0;max-width:0" data-skip-in-text="true">"#,
                );
                self.out.push_str(&escape_text(&text));
                self.out.push_str("</div>");
            }
            EmailPrimitive::Body => {
                self.open("body", &[], props, &[], "", &style);
                self.nodes(children)?;
                self.out.push_str("</body>");
            }
            EmailPrimitive::Container => {
                self.table(props, &[("maxWidth", "37.5em")], &style);
                self.out.push_str(r#"<tbody><tr style="width:100%"><td>"#);
                self.nodes(children)?;
                self.out.push_str("</td></tr></tbody></table>");
            }
            EmailPrimitive::Section => {
                self.table(props, &[], &style);
                self.out.push_str("<tbody><tr><td>");
                self.nodes(children)?;
                self.out.push_str("</td></tr></tbody></table>");
            }
            EmailPrimitive::Row => {
                self.table(props, &[], &style);
                self.out.push_str(r#"<tbody style="width:100%"><tr style="width:100%">"#);
                self.nodes(children)?;
                self.out.push_str("</tr></tbody></table>");
            }
            EmailPrimitive::Column => {
                self.open("td", &[], props, &["align", "valign", "width", "colSpan"], "", &style);
                self.nodes(children)?;
                self.out.push_str("</td>");
            }
            EmailPrimitive::Heading => {
                let tag = match props.get("as").and_then(Value::as_str) {
                    Some(tag @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6")) => tag,
                    _ => "h1",
                };
                self.open(tag, &[], props, &[], "", &style);
                self.nodes(children)?;
                self.close(tag);
            }
            EmailPrimitive::Text => {
                let css = style::to_css(
                    &[("fontSize", "14px"), ("lineHeight", "24px"), ("margin", "16px 0")],
                    &style,
                );
                self.open("p", &[], props, &[], &css, &StyleMap::new());
                self.nodes(children)?;
                self.out.push_str("</p>");
            }
            EmailPrimitive::Link => {
                let css = style::to_css(&[("color", "#067df7"), ("textDecorationLine", "none")], &style);
                self.open("a", &[("target", "_blank")], props, &["href", "target", "rel"], &css, &StyleMap::new());
                self.nodes(children)?;
                self.out.push_str("</a>");
            }
            EmailPrimitive::Button => {
                let css = style::to_css(
                    &[
                        ("lineHeight", "100%"),
                        ("textDecoration", "none"),
                        ("display", "inline-block"),
                        ("maxWidth", "100%"),
                        ("msoPaddingAlt", "0px"),
                    ],
                    &style,
                );
                self.open("a", &[("target", "_blank")], props, &["href", "target", "rel"], &css, &StyleMap::new());
                self.out.push_str(
                    r#"<span style="max-width:100%;display:inline-block;line-height:120%;mso-padding-alt:0px;mso-text-raise:0">"#,
                );
                self.nodes(children)?;
                self.out.push_str("</span></a>");
            }
            EmailPrimitive::Img => {
                let css = style::to_css(
                    &[
                        ("display", "block"),
                        ("outline", "none"),
                        ("border", "none"),
                        ("textDecoration", "none"),
                    ],
                    &style,
                );
                self.open("img", &[], props, &["src", "alt", "width", "height"], &css, &StyleMap::new());
                self.void_close();
            }
            EmailPrimitive::Hr => {
                let css = style::to_css(
                    &[("width", "100%"), ("border", "none"), ("borderTop", "1px solid #eaeaea")],
                    &style,
                );
                self.open("hr", &[], props, &[], &css, &StyleMap::new());
                self.void_close();
            }
        }
        Ok(())
    }

    fn table(&mut self, props: &Map<String, Value>, defaults: &[(&str, &str)], style: &StyleMap) {
        self.out.push_str("<table ");
        self.out.push_str(PRESENTATION_TABLE);
        self.attributes(props, &[]);
        push_style(&mut self.out, &style::to_css(defaults, style));
        self.out.push('>');
    }

    /// Opens `<tag` with fixed attributes, the allowed props, `id`/`class`
    /// and either a prebuilt `css` string or `style`.
    fn open(
        &mut self,
        tag: &str,
        fixed: &[(&str, &str)],
        props: &Map<String, Value>,
        allowed: &[&str],
        css: &str,
        style: &StyleMap,
    ) {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in fixed {
            if !props.contains_key(*name) || !allowed.contains(name) {
                push_attribute(&mut self.out, name, value);
            }
        }
        self.attributes(props, allowed);
        if css.is_empty() {
            push_style(&mut self.out, &style::to_css(&[], style));
        } else {
            push_style(&mut self.out, css);
        }
        if !VOID_TAGS.contains(&tag) {
            self.out.push('>');
        }
    }

    fn close(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn void_close(&mut self) {
        self.out.push_str("/>");
    }

    /// Writes `id`, `className` and the `allowed` props as attributes.
    fn attributes(&mut self, props: &Map<String, Value>, allowed: &[&str]) {
        for (key, value) in props {
            let name = match key.as_str() {
                "id" | "title" => key.to_ascii_lowercase(),
                "className" => "class".to_string(),
                other if allowed.contains(&other) => attribute_name(other).to_ascii_lowercase(),
                _ => continue,
            };
            if let Some(value) = attribute_value(&name, value) {
                push_attribute(&mut self.out, &name, &value);
            }
        }
    }

    /// Lowercase HTML tag from the email allow-list. Every prop is a
    /// candidate attribute, filtered for safety.
    fn intrinsic(
        &mut self,
        tag: &str,
        props: &Map<String, Value>,
        children: &[Node],
    ) -> Result<(), RenderError> {
        self.out.push('<');
        self.out.push_str(tag);
        for (key, value) in props {
            if matches!(key.as_str(), "style" | "children" | "key" | "ref" | "dangerouslySetInnerHTML") {
                continue;
            }
            // Browsers match attribute names case-insensitively.
            let name = attribute_name(key).to_ascii_lowercase();
            if !is_safe_attribute_name(&name) {
                continue;
            }
            if let Some(value) = attribute_value(&name, value) {
                push_attribute(&mut self.out, &name, &value);
            }
        }
        push_style(&mut self.out, &style::to_css(&[], &style::merge(props.get("style"))));

        if VOID_TAGS.contains(&tag) {
            self.void_close();
        } else {
            self.out.push('>');
            self.nodes(children)?;
            self.close(tag);
        }
        Ok(())
    }
}

fn attribute_name(prop: &str) -> &str {
    match prop {
        "className" => "class",
        "htmlFor" => "for",
        "colSpan" => "colspan",
        "rowSpan" => "rowspan",
        "cellPadding" => "cellpadding",
        "cellSpacing" => "cellspacing",
        "bgColor" => "bgcolor",
        other => other,
    }
}

/// Event handlers and anything that isn't a plain attribute name are dropped.
fn is_safe_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.to_ascii_lowercase().starts_with("on")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn attribute_value(name: &str, value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => name.to_string(),
        _ => return None,
    };
    if URL_ATTRIBUTES.contains(&name) && !is_safe_url(name, &text) {
        return None;
    }
    Some(text)
}

fn is_safe_url(name: &str, url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if normalized.starts_with("javascript:") || normalized.starts_with("vbscript:") {
        return false;
    }
    if normalized.starts_with("data:") {
        return name == "src" && normalized.starts_with("data:image/");
    }
    true
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attribute(value));
    out.push('"');
}

fn push_style(out: &mut String, css: &str) {
    if !css.is_empty() {
        push_attribute(out, "style", css);
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn el(name: &str, props: Value, children: Vec<Node>) -> Node {
        let props = match props {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Node::element(name, props, children)
    }

    fn render(tree: Vec<Node>) -> String {
        EmailRenderer.render(&tree).unwrap()
    }

    #[test]
    fn test_renders_a_full_document() {
        let html = render(vec![el(
            "Html",
            json!({}),
            vec![
                el("Head", json!({}), vec![]),
                el("Preview", json!({}), vec![Node::text("Day 1 report")]),
                el(
                    "Body",
                    json!({"style": {"backgroundColor": "#fff"}}),
                    vec![el(
                        "Container",
                        json!({}),
                        vec![
                            el("Heading", json!({"as": "h2"}), vec![Node::text("Report")]),
                            el("Text", json!({}), vec![Node::text("Log A001")]),
                        ],
                    )],
                ),
            ],
        )]);

        assert!(html.starts_with(DOCTYPE));
        assert!(html.contains(r#"<html dir="ltr" lang="en">"#));
        assert!(html.contains(HEAD_META));
        assert!(html.contains(r#"data-skip-in-text="true">Day 1 report</div>"#));
        assert!(html.contains(r#"<body style="background-color:#fff">"#));
        assert!(html.contains(r#"role="presentation" style="max-width:37.5em">"#));
        assert!(html.contains("<h2>Report</h2>"));
        assert!(html.contains(r#"<p style="font-size:14px;line-height:24px;margin:16px 0">Log A001</p>"#));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn test_wraps_fragments_in_a_default_document() {
        let html = render(vec![el("Text", json!({}), vec![Node::text("hello")])]);
        assert!(html.starts_with(DOCTYPE));
        assert!(html.contains("<body><p"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        let html = render(vec![el(
            "Link",
            json!({"href": "https://example.com/?a=1&b=\"2\""}),
            vec![Node::text("<script>alert(1)</script>")],
        )]);
        assert!(html.contains(r#"href="https://example.com/?a=1&amp;b=&quot;2&quot;""#));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_drops_handlers_and_script_urls() {
        let html = render(vec![
            el("a", json!({"href": " JavaScript:alert(1)", "onclick": "x()"}), vec![Node::text("a")]),
            el("img", json!({"src": "data:text/html,<b>", "onerror": "x()"}), vec![]),
            el("Button", json!({"href": "javascript:void(0)"}), vec![Node::text("b")]),
        ]);
        assert!(!html.to_ascii_lowercase().contains("javascript"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("onerror"));
        assert!(!html.contains("data:text"));
        assert!(html.contains("<img/>"));
    }

    #[test]
    fn test_url_checks_ignore_attribute_case() {
        let html = render(vec![
            el("a", json!({"HREF": "javascript:alert(1)"}), vec![Node::text("a")]),
            el("img", json!({"Src": "data:text/html,<script>x()</script>"}), vec![]),
            el("td", json!({"BACKGROUND": "vbscript:x", "OnClick": "x()"}), vec![]),
            el("a", json!({"HREF": "https://example.com/a", "colSpan": 2}), vec![Node::text("b")]),
        ]);
        let lower = html.to_ascii_lowercase();
        assert!(!lower.contains("javascript"));
        assert!(!lower.contains("vbscript"));
        assert!(!lower.contains("data:text"));
        assert!(!lower.contains("onclick"));
        assert!(html.contains(r#"<a href="https://example.com/a" colspan="2">b</a>"#));
    }

    #[test]
    fn test_renders_layout_tables() {
        let html = render(vec![el(
            "Section",
            json!({}),
            vec![el(
                "Row",
                json!({}),
                vec![
                    el("Column", json!({"align": "right"}), vec![Node::text("1")]),
                    el("Column", json!({}), vec![Node::text("2")]),
                ],
            )],
        )]);
        assert!(html.contains(r#"<tr style="width:100%"><td align="right">1</td><td>2</td></tr>"#));
    }

    #[test]
    fn test_renders_void_primitives() {
        let html = render(vec![
            el("Hr", json!({}), vec![]),
            el("Img", json!({"src": "https://example.com/logo.png", "alt": "Logo", "width": 120}), vec![]),
        ]);
        assert!(html.contains(r#"<hr style="border:none;border-top:1px solid #eaeaea;width:100%"/>"#));
        assert!(html.contains(r#"src="https://example.com/logo.png""#));
        assert!(html.contains(r#"width="120""#));
    }

    #[test]
    fn test_intrinsic_tags_map_react_props() {
        let html = render(vec![el(
            "span",
            json!({"className": "muted", "style": {"color": "#999"}}),
            vec![Node::text("x")],
        )]);
        assert!(html.contains(r#"<span class="muted" style="color:#999">x</span>"#));
    }

    #[test]
    fn test_rejects_pdf_elements() {
        let err = EmailRenderer
            .render(&[el("Page", json!({}), vec![])])
            .unwrap_err();
        assert!(matches!(err, RenderError::Render { kind: DocumentKind::Email, .. }));
    }
}
