//! Style objects shared by both renderers.
//!
//! Templates pass `style` as an object or a (possibly nested) array of
//! objects; later entries win. The email renderer turns the merged map into
//! inline CSS, the PDF renderer reads lengths and colors out of it.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type StyleMap = Map<String, Value>;

/// Merges a `style` prop into one map.
pub fn merge(value: Option<&Value>) -> StyleMap {
    let mut out = StyleMap::new();
    if let Some(value) = value {
        merge_into(&mut out, value);
    }
    out
}

fn merge_into(out: &mut StyleMap, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                out.insert(key.clone(), val.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                merge_into(out, item);
            }
        }
        _ => {}
    }
}

/// Renders `defaults` overridden by `style` as an inline CSS declaration list.
pub fn to_css(defaults: &[(&str, &str)], style: &StyleMap) -> String {
    // Sorted so the output doesn't depend on map ordering features.
    let mut merged = BTreeMap::new();
    for (key, value) in defaults {
        merged.insert((*key).to_string(), Value::String((*value).to_string()));
    }
    for (key, value) in style {
        merged.insert(key.clone(), value.clone());
    }

    merged
        .iter()
        .filter_map(|(key, value)| {
            let property = css_property(key)?;
            let value = css_value(key, value)?;
            Some(format!("{property}:{value}"))
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Properties React renders without a `px` suffix when given a number.
const UNITLESS: &[&str] = &[
    "animationIterationCount",
    "columnCount",
    "flex",
    "flexGrow",
    "flexShrink",
    "fontWeight",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
];

fn css_property(key: &str) -> Option<String> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    let mut out = String::with_capacity(key.len() + 4);
    for (index, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else if index == 0 && key.starts_with("ms") && key[2..].starts_with(|c: char| c.is_ascii_uppercase()) {
            out.push('-');
            out.push(c);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn css_value(key: &str, value: &Value) -> Option<String> {
    let text = match value {
        Value::Number(n) => {
            let n = n.as_f64()?;
            if n == 0.0 || UNITLESS.contains(&key) {
                format!("{n}")
            } else {
                format!("{n}px")
            }
        }
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    let lowered = text.to_ascii_lowercase();
    let unsafe_value = text.is_empty()
        || text.contains(['<', '>', ';', '{', '}', '"'])
        || lowered.contains("expression(")
        || lowered.contains("javascript:")
        || lowered.contains("url(");
    if unsafe_value {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

/// Parses `#rgb`, `#rrggbb`, `rgb(r, g, b)` and a few named colors.
/// `transparent` and unknown values yield `None`.
pub fn parse_color(value: &Value) -> Option<Color> {
    let text = value.as_str()?.trim().to_ascii_lowercase();
    if let Some(hex) = text.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some(Color::rgb(r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => Some(Color::rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            _ => None,
        };
    }
    if let Some(args) = text.strip_prefix("rgb(").and_then(|rest| rest.strip_suffix(')')) {
        let parts: Vec<u8> = args
            .split(',')
            .map(|part| part.trim().parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) as u8))
            .collect::<Option<_>>()?;
        return match parts.as_slice() {
            [r, g, b] => Some(Color::rgb(*r, *g, *b)),
            _ => None,
        };
    }
    match text.as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "red" => Some(Color::rgb(255, 0, 0)),
        "green" => Some(Color::rgb(0, 128, 0)),
        "blue" => Some(Color::rgb(0, 0, 255)),
        "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
        "silver" => Some(Color::rgb(192, 192, 192)),
        "navy" => Some(Color::rgb(0, 0, 128)),
        "orange" => Some(Color::rgb(255, 165, 0)),
        _ => None,
    }
}

/// Parses a length to points. Bare numbers are points; `%` is relative to
/// `reference`.
pub fn parse_length(value: &Value, reference: f32) -> Option<f32> {
    let points = match value {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => {
            let s = s.trim();
            let split = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
                .unwrap_or(s.len());
            let (number, unit) = s.split_at(split);
            let number: f32 = number.parse().ok()?;
            match unit.trim() {
                "" | "pt" => number,
                "px" => number * 0.75,
                "in" => number * 72.0,
                "cm" => number * 72.0 / 2.54,
                "mm" => number * 72.0 / 25.4,
                "%" => number * reference / 100.0,
                _ => return None,
            }
        }
        _ => return None,
    };
    points.is_finite().then_some(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merges_arrays_with_later_entries_winning() {
        let style = merge(Some(&json!([{"color": "red", "margin": 4}, null, [{"color": "blue"}]])));
        assert_eq!(style["color"], "blue");
        assert_eq!(style["margin"], 4);
    }

    #[test]
    fn test_renders_css_with_units() {
        let style = merge(Some(&json!({"fontSize": 14, "lineHeight": 1.5, "marginTop": 0, "color": "#333"})));
        assert_eq!(
            to_css(&[], &style),
            "color:#333;font-size:14px;line-height:1.5;margin-top:0"
        );
    }

    #[test]
    fn test_user_style_overrides_defaults() {
        let style = merge(Some(&json!({"fontSize": "16px"})));
        assert_eq!(
            to_css(&[("fontSize", "14px"), ("margin", "16px 0")], &style),
            "font-size:16px;margin:16px 0"
        );
    }

    #[test]
    fn test_drops_unsafe_css() {
        let style = merge(Some(&json!({
            "background": "url(javascript:alert(1))",
            "width": "expression(alert(1))",
            "color": "red;} body {display:none",
            "font\"Size": 3
        })));
        assert_eq!(to_css(&[], &style), "");
    }

    #[test]
    fn test_vendor_prefixes_are_kebab_cased() {
        let style = merge(Some(&json!({"WebkitTextSizeAdjust": "100%", "msoLineHeightRule": "exactly"})));
        assert_eq!(
            to_css(&[], &style),
            "-webkit-text-size-adjust:100%;mso-line-height-rule:exactly"
        );
    }

    #[test]
    fn test_parses_colors() {
        assert_eq!(parse_color(&json!("#fff")), Some(Color::WHITE));
        assert_eq!(parse_color(&json!("#000000")), Some(Color::BLACK));
        assert_eq!(parse_color(&json!("rgb(255, 0, 0)")), Some(Color::rgb(255, 0, 0)));
        assert_eq!(parse_color(&json!("transparent")), None);
        assert_eq!(parse_color(&json!("#12")), None);
        assert_eq!(parse_color(&json!(3)), None);
    }

    #[test]
    fn test_parses_lengths() {
        assert_eq!(parse_length(&json!(12), 0.0), Some(12.0));
        assert_eq!(parse_length(&json!("1in"), 0.0), Some(72.0));
        assert_eq!(parse_length(&json!("16px"), 0.0), Some(12.0));
        assert_eq!(parse_length(&json!("50%"), 200.0), Some(100.0));
        assert_eq!(parse_length(&json!("auto"), 0.0), None);
    }
}
