//! The primitive tree a document program produces.
//!
//! The sandbox normalizes whatever the entry point returns into plain
//! `{type: "element" | "text"}` objects before they leave V8; this module is
//! the Rust side of that contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Element {
        name: String,
        #[serde(default)]
        props: Map<String, Value>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Text {
        value: String,
    },
}

impl Node {
    pub fn element(name: impl Into<String>, props: Map<String, Value>, children: Vec<Node>) -> Self {
        Self::Element {
            name: name.into(),
            props,
            children,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element { name, .. } => Some(name),
            Self::Text { .. } => None,
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text { value } if value.trim().is_empty())
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text { value } => out.push_str(value),
            Self::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Converts the normalized sandbox output into nodes.
pub fn from_value(value: Value) -> Result<Vec<Node>, serde_json::Error> {
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_normalized_output() {
        let nodes = from_value(json!([
            {"type": "element", "name": "Text", "props": {"style": {"color": "red"}},
             "children": [{"type": "text", "value": "A001"}]},
            {"type": "text", "value": " "}
        ]))
        .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name(), Some("Text"));
        assert_eq!(nodes[0].text_content(), "A001");
        assert!(nodes[1].is_blank_text());
    }

    #[test]
    fn test_props_and_children_default_to_empty() {
        let nodes = from_value(json!([{"type": "element", "name": "Hr"}])).unwrap();
        assert_eq!(nodes[0], Node::element("Hr", Map::new(), Vec::new()));
    }

    #[test]
    fn test_rejects_unknown_node_types() {
        assert!(from_value(json!([{"type": "script", "value": "x"}])).is_err());
    }
}
