//! Page layout for the PDF renderer.
//!
//! Layout runs in two passes. [`measure`] turns each element into a
//! [`LayoutBox`] sized for the width it is given (text is word-wrapped
//! here). The [`Paginator`] then flows boxes down the page, starting new
//! pages as needed, and emits absolutely positioned [`DrawOp`]s. Boxes that
//! don't fit are split between pages when they can be: stacks child by child
//! and text line by line. Backgrounds and borders of split boxes are drawn
//! per page fragment.
//!
//! Coordinates are in points with the origin at the top-left of the page;
//! the writer flips them into PDF space.

use super::bitmap::{self, DecodedImage};
use super::fonts::Font;
use crate::capabilities::{capabilities_for, Capability, DocumentKind, PdfPrimitive};
use crate::style::{self, parse_color, parse_length, Color, StyleMap};
use crate::tree::Node;
use serde_json::{Map, Value};
use std::rc::Rc;

pub type LayoutResult<T> = Result<T, String>;

const EPSILON: f32 = 0.01;
/// Upper bound on physical pages, a backstop against runaway layouts.
pub const MAX_PAGES: usize = 5_000;

const DEFAULT_FONT_SIZE: f32 = 12.0;
const DEFAULT_LINE_HEIGHT: f32 = 1.2;

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn all(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// Reads `margin`/`padding` style properties: the shorthand (one to four
    /// values), then `*Horizontal`/`*Vertical`, then the per-side longhands.
    fn from_style(style: &StyleMap, prefix: &str, reference: f32) -> Self {
        let mut edges = Edges::default();
        if let Some(value) = style.get(prefix) {
            edges = shorthand(value, reference);
        }
        let side = |name: &str| style.get(&format!("{prefix}{name}")).and_then(|v| parse_length(v, reference));
        if let Some(h) = side("Horizontal") {
            edges.left = h;
            edges.right = h;
        }
        if let Some(v) = side("Vertical") {
            edges.top = v;
            edges.bottom = v;
        }
        if let Some(v) = side("Top") {
            edges.top = v;
        }
        if let Some(v) = side("Right") {
            edges.right = v;
        }
        if let Some(v) = side("Bottom") {
            edges.bottom = v;
        }
        if let Some(v) = side("Left") {
            edges.left = v;
        }
        edges
    }
}

fn shorthand(value: &Value, reference: f32) -> Edges {
    let parts: Vec<f32> = match value {
        Value::String(s) => s
            .split_whitespace()
            .map(|part| parse_length(&Value::String(part.to_string()), reference).unwrap_or(0.0))
            .collect(),
        other => parse_length(other, reference).into_iter().collect(),
    };
    match parts.as_slice() {
        [all] => Edges::all(*all),
        [v, h] => Edges {
            top: *v,
            right: *h,
            bottom: *v,
            left: *h,
        },
        [t, h, b] => Edges {
            top: *t,
            right: *h,
            bottom: *b,
            left: *h,
        },
        [t, r, b, l, ..] => Edges {
            top: *t,
            right: *r,
            bottom: *b,
            left: *l,
        },
        [] => Edges::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub width: Edges,
    /// Top, right, bottom, left.
    pub colors: [Color; 4],
}

impl Default for Border {
    fn default() -> Self {
        Self {
            width: Edges::default(),
            colors: [Color::BLACK; 4],
        }
    }
}

impl Border {
    fn from_style(style: &StyleMap, reference: f32) -> Self {
        let mut border = Border::default();
        if let Some(value) = style.get("border") {
            let (width, color) = border_shorthand(value, reference);
            if let Some(width) = width {
                border.width = Edges::all(width);
            }
            if let Some(color) = color {
                border.colors = [color; 4];
            }
        }
        if let Some(width) = style.get("borderWidth").and_then(|v| parse_length(v, reference)) {
            border.width = Edges::all(width);
        }
        if let Some(color) = style.get("borderColor").and_then(parse_color) {
            border.colors = [color; 4];
        }

        for (index, side) in ["Top", "Right", "Bottom", "Left"].into_iter().enumerate() {
            let mut width = None;
            if let Some(value) = style.get(&format!("border{side}")) {
                let (w, color) = border_shorthand(value, reference);
                width = w;
                if let Some(color) = color {
                    border.colors[index] = color;
                }
            }
            if let Some(w) = style.get(&format!("border{side}Width")).and_then(|v| parse_length(v, reference)) {
                width = Some(w);
            }
            if let Some(color) = style.get(&format!("border{side}Color")).and_then(parse_color) {
                border.colors[index] = color;
            }
            if let Some(w) = width {
                match index {
                    0 => border.width.top = w,
                    1 => border.width.right = w,
                    2 => border.width.bottom = w,
                    _ => border.width.left = w,
                }
            }
        }
        border
    }

    fn is_visible(&self) -> bool {
        self.width.vertical() + self.width.horizontal() > 0.0
    }
}

/// `"1pt solid #ccc"`, `1`, `"2px dashed red"`.
fn border_shorthand(value: &Value, reference: f32) -> (Option<f32>, Option<Color>) {
    match value {
        Value::Number(_) => (parse_length(value, reference), None),
        Value::String(s) => {
            let mut width = None;
            let mut color = None;
            for token in s.split_whitespace() {
                let token = Value::String(token.to_string());
                if width.is_none() {
                    if let Some(w) = parse_length(&token, reference) {
                        width = Some(w);
                        continue;
                    }
                }
                if let Some(c) = parse_color(&token) {
                    color = Some(c);
                }
            }
            (width, color)
        }
        _ => (None, None),
    }
}

// ============================================================================
// Text style
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LineHeight {
    Factor(f32),
    Points(f32),
}

/// Inherited text properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    family: Option<Value>,
    weight: Option<Value>,
    slant: Option<Value>,
    size: f32,
    color: Color,
    line_height: LineHeight,
    align: Align,
    underline: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: None,
            weight: None,
            slant: None,
            size: DEFAULT_FONT_SIZE,
            color: Color::BLACK,
            line_height: LineHeight::Factor(DEFAULT_LINE_HEIGHT),
            align: Align::Left,
            underline: false,
        }
    }
}

impl TextStyle {
    fn inherit(&self, style: &StyleMap) -> Self {
        let mut next = self.clone();
        if let Some(v) = style.get("fontFamily") {
            next.family = Some(v.clone());
        }
        if let Some(v) = style.get("fontWeight") {
            next.weight = Some(v.clone());
        }
        if let Some(v) = style.get("fontStyle") {
            next.slant = Some(v.clone());
        }
        if let Some(size) = style.get("fontSize").and_then(|v| parse_length(v, self.size)) {
            if size > 0.0 {
                next.size = size;
            }
        }
        if let Some(color) = style.get("color").and_then(parse_color) {
            next.color = color;
        }
        if let Some(value) = style.get("lineHeight") {
            next.line_height = match value {
                // Small unitless numbers are multipliers, larger ones points.
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f > 0.0 && f <= 4.0 => LineHeight::Factor(f as f32),
                    Some(f) if f > 4.0 => LineHeight::Points(f as f32),
                    _ => next.line_height,
                },
                Value::String(s) if s.trim_end().ends_with('%') => parse_length(value, 1.0)
                    .map(LineHeight::Factor)
                    .unwrap_or(next.line_height),
                other => parse_length(other, next.size)
                    .map(LineHeight::Points)
                    .unwrap_or(next.line_height),
            };
        }
        if let Some(align) = style.get("textAlign").and_then(Value::as_str) {
            next.align = match align {
                "center" => Align::Center,
                "right" | "end" => Align::Right,
                _ => Align::Left,
            };
        }
        if let Some(decoration) = style.get("textDecoration").and_then(Value::as_str) {
            next.underline = decoration.contains("underline");
        }
        next
    }

    fn font(&self) -> Font {
        Font::select(self.family.as_ref(), self.weight.as_ref(), self.slant.as_ref())
    }

    fn line_height(&self) -> f32 {
        match self.line_height {
            LineHeight::Factor(f) => f * self.size,
            LineHeight::Points(p) => p,
        }
    }
}

// ============================================================================
// Layout boxes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Offset from the left edge of the line box.
    pub x: f32,
    pub width: f32,
    pub text: String,
    pub font: Font,
    pub size: f32,
    pub color: Color,
    pub underline: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub width: f32,
    pub height: f32,
    /// Distance from the top of the line to the baseline.
    pub baseline: f32,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxKind {
    Stack { children: Vec<LayoutBox>, gap: f32 },
    /// Children with the offset of their margin box from the content edge.
    Row(Vec<(f32, LayoutBox)>),
    Lines(Vec<Line>),
    Image(Rc<DecodedImage>),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub kind: BoxKind,
    pub margin: Edges,
    pub padding: Edges,
    pub border: Border,
    pub background: Option<Color>,
    /// Border-box size.
    pub width: f32,
    pub height: f32,
    pub fixed_height: bool,
    pub break_before: bool,
    pub wrap: bool,
    pub link: Option<String>,
}

impl LayoutBox {
    fn outer_height(&self) -> f32 {
        self.margin.vertical() + self.height
    }

    fn outer_width(&self) -> f32 {
        self.margin.horizontal() + self.width
    }

    fn can_split(&self) -> bool {
        self.wrap
            && !self.fixed_height
            && matches!(self.kind, BoxKind::Stack { .. } | BoxKind::Lines(_))
    }
}

/// Box model properties common to every block element.
struct BoxProps {
    margin: Edges,
    padding: Edges,
    border: Border,
    background: Option<Color>,
    width: Option<f32>,
    height: Option<f32>,
    min_height: Option<f32>,
    gap: f32,
    break_before: bool,
    wrap: bool,
}

impl BoxProps {
    fn new(style: &StyleMap, props: &Map<String, Value>, available: f32) -> Self {
        let length = |key: &str| style.get(key).and_then(|v| parse_length(v, available));
        Self {
            margin: Edges::from_style(style, "margin", available),
            padding: Edges::from_style(style, "padding", available),
            border: Border::from_style(style, available),
            background: style.get("backgroundColor").and_then(parse_color),
            width: length("width").map(|w| w.max(0.0)),
            height: length("height").map(|h| h.max(0.0)),
            min_height: length("minHeight"),
            gap: length("gap").unwrap_or(0.0).max(0.0),
            break_before: props.get("break").and_then(Value::as_bool).unwrap_or(false),
            wrap: props.get("wrap").and_then(Value::as_bool).unwrap_or(true),
        }
    }

    /// Border-box width for an element given `available` outer width.
    fn border_box_width(&self, available: f32) -> f32 {
        self.width
            .unwrap_or(available - self.margin.horizontal())
            .max(0.0)
    }

    fn inset(&self) -> Edges {
        Edges {
            top: self.padding.top + self.border.width.top,
            right: self.padding.right + self.border.width.right,
            bottom: self.padding.bottom + self.border.width.bottom,
            left: self.padding.left + self.border.width.left,
        }
    }

    fn finish(self, kind: BoxKind, width: f32, content_height: f32, link: Option<String>) -> LayoutBox {
        let natural = content_height + self.inset().vertical();
        let height = self
            .height
            .unwrap_or(natural)
            .max(self.min_height.unwrap_or(0.0));
        LayoutBox {
            kind,
            margin: self.margin,
            padding: self.padding,
            border: self.border,
            background: self.background,
            width,
            height,
            fixed_height: self.height.is_some(),
            break_before: self.break_before,
            wrap: self.wrap,
            link,
        }
    }
}

fn primitive(node: &Node) -> Option<PdfPrimitive> {
    match capabilities_for(DocumentKind::Pdf).get(node.name()?) {
        Some(Capability::Pdf(primitive)) => Some(primitive),
        _ => None,
    }
}

fn link_target(props: &Map<String, Value>) -> Option<String> {
    props
        .get("src")
        .or_else(|| props.get("href"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| is_safe_link(url))
        .map(str::to_string)
}

fn is_safe_link(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    !url.is_empty()
        && ["http://", "https://", "mailto:", "tel:"]
            .iter()
            .any(|scheme| lowered.starts_with(scheme))
}

/// Measures one block-level node. Blank text yields `None`.
pub fn measure(node: &Node, inherited: &TextStyle, available: f32) -> LayoutResult<Option<LayoutBox>> {
    let (name, props, children) = match node {
        Node::Text { value } => {
            if value.trim().is_empty() {
                return Ok(None);
            }
            return text_box(&[node.clone()], inherited, &Map::new(), available, None).map(Some);
        }
        Node::Element {
            name,
            props,
            children,
        } => (name, props, children),
    };

    let style = style::merge(props.get("style"));
    let text_style = inherited.inherit(&style);

    match primitive(node) {
        Some(PdfPrimitive::View) => view_box(children, &text_style, &style, props, available, None).map(Some),
        Some(PdfPrimitive::Text) => text_box(children, &text_style, props, available, None).map(Some),
        Some(PdfPrimitive::Link) => {
            let link = link_target(props);
            if children.iter().all(is_inline) {
                text_box(children, &text_style, props, available, link).map(Some)
            } else {
                view_box(children, &text_style, &style, props, available, link).map(Some)
            }
        }
        Some(PdfPrimitive::Image) => image_box(&style, props, available).map(Some),
        Some(PdfPrimitive::Page) => Err("<Page> must be a direct child of <Document>".into()),
        Some(PdfPrimitive::Document) => Err("<Document> must be the root element".into()),
        None => Err(format!("<{name}> is not a pdf element")),
    }
}

fn is_inline(node: &Node) -> bool {
    match node {
        Node::Text { .. } => true,
        Node::Element { .. } => matches!(primitive(node), Some(PdfPrimitive::Text | PdfPrimitive::Link)),
    }
}

fn view_box(
    children: &[Node],
    text_style: &TextStyle,
    style: &StyleMap,
    props: &Map<String, Value>,
    available: f32,
    link: Option<String>,
) -> LayoutResult<LayoutBox> {
    let box_props = BoxProps::new(style, props, available);
    let width = box_props.border_box_width(available);
    let inner = (width - box_props.inset().horizontal()).max(0.0);
    let gap = box_props.gap;

    let mut measured = Vec::new();
    for child in children {
        if let Some(b) = measure(child, text_style, inner)? {
            measured.push((child, b));
        }
    }

    let row = matches!(
        style.get("flexDirection").and_then(Value::as_str),
        Some("row" | "row-reverse")
    );

    if !row {
        let content: f32 = measured.iter().map(|(_, b)| b.outer_height()).sum::<f32>()
            + gap * measured.len().saturating_sub(1) as f32;
        let children = measured.into_iter().map(|(_, b)| b).collect();
        return Ok(box_props.finish(BoxKind::Stack { children, gap }, width, content, link));
    }

    // Row: explicit widths first, the rest shared by flex grow (default 1).
    let nodes: Vec<&Node> = measured.iter().map(|(node, _)| *node).collect();
    let mut fixed = 0.0;
    let mut grow_total = 0.0;
    let mut plans = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let child_style = node_style(node);
        let child_props = BoxProps::new(&child_style, node_props(node), inner);
        match child_props.width {
            Some(w) => {
                fixed += w + child_props.margin.horizontal();
                plans.push((Some(w + child_props.margin.horizontal()), 0.0));
            }
            None => {
                let grow = child_style
                    .get("flex")
                    .or_else(|| child_style.get("flexGrow"))
                    .and_then(Value::as_f64)
                    .filter(|g| *g > 0.0)
                    .unwrap_or(1.0) as f32;
                grow_total += grow;
                plans.push((None, grow));
            }
        }
    }
    let gaps = gap * nodes.len().saturating_sub(1) as f32;
    let remaining = (inner - fixed - gaps).max(0.0);

    let mut cells = Vec::with_capacity(nodes.len());
    let mut x = 0.0;
    let mut content: f32 = 0.0;
    for (node, (fixed_width, grow)) in nodes.into_iter().zip(plans) {
        let slot = fixed_width.unwrap_or_else(|| {
            if grow_total > 0.0 {
                remaining * grow / grow_total
            } else {
                0.0
            }
        });
        if let Some(cell) = measure(node, text_style, slot)? {
            content = content.max(cell.outer_height());
            let advance = slot.max(cell.outer_width());
            cells.push((x, cell));
            x += advance + gap;
        }
    }
    if style.get("flexDirection").and_then(Value::as_str) == Some("row-reverse") {
        for (offset, cell) in &mut cells {
            *offset = (inner - *offset - cell.outer_width()).max(0.0);
        }
    }

    Ok(box_props.finish(BoxKind::Row(cells), width, content, link))
}

fn node_style(node: &Node) -> StyleMap {
    match node {
        Node::Element { props, .. } => style::merge(props.get("style")),
        Node::Text { .. } => StyleMap::new(),
    }
}

fn node_props(node: &Node) -> &Map<String, Value> {
    static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);
    match node {
        Node::Element { props, .. } => props,
        Node::Text { .. } => &EMPTY,
    }
}

fn text_box(
    children: &[Node],
    text_style: &TextStyle,
    props: &Map<String, Value>,
    available: f32,
    link: Option<String>,
) -> LayoutResult<LayoutBox> {
    let style = style::merge(props.get("style"));
    let box_props = BoxProps::new(&style, props, available);
    let width = box_props.border_box_width(available);
    let inner = (width - box_props.inset().horizontal()).max(0.0);

    let mut spans = Vec::new();
    collect_spans(children, text_style, link.as_deref(), &mut spans)?;
    let lines = break_lines(&spans, inner, text_style.align);
    let content = lines.iter().map(|line| line.height).sum();

    Ok(box_props.finish(BoxKind::Lines(lines), width, content, None))
}

fn image_box(style: &StyleMap, props: &Map<String, Value>, available: f32) -> LayoutResult<LayoutBox> {
    let source = props
        .get("src")
        .or_else(|| props.get("source"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("uri").and_then(Value::as_str),
            _ => None,
        })
        .ok_or_else(|| "<Image> requires a `src`".to_string())?;
    let image = Rc::new(bitmap::decode_data_uri(source)?);

    let box_props = BoxProps::new(style, props, available);
    let inset = box_props.inset();
    let (natural_w, natural_h) = image.natural_size();
    let aspect = natural_h / natural_w;
    let max_width = (available - box_props.margin.horizontal() - inset.horizontal()).max(0.0);

    let (w, h) = match (box_props.width, box_props.height) {
        (Some(w), Some(h)) => (w - inset.horizontal(), h - inset.vertical()),
        (Some(w), None) => {
            let w = w - inset.horizontal();
            (w, w * aspect)
        }
        (None, Some(h)) => {
            let h = h - inset.vertical();
            (h / aspect, h)
        }
        (None, None) if natural_w > max_width => (max_width, max_width * aspect),
        (None, None) => (natural_w, natural_h),
    };
    let (w, h) = (w.max(0.0), h.max(0.0));

    let mut props_without_size = box_props;
    props_without_size.width = None;
    props_without_size.height = None;
    let width = w + inset.horizontal();
    let mut b = props_without_size.finish(BoxKind::Image(image), width, h, None);
    b.fixed_height = true;
    Ok(b)
}

// ============================================================================
// Text
// ============================================================================

#[derive(Debug, Clone)]
struct Span {
    text: String,
    style: TextStyle,
    link: Option<String>,
}

fn collect_spans(
    children: &[Node],
    style: &TextStyle,
    link: Option<&str>,
    out: &mut Vec<Span>,
) -> LayoutResult<()> {
    for child in children {
        match child {
            Node::Text { value } => out.push(Span {
                text: value.clone(),
                style: style.clone(),
                link: link.map(str::to_string),
            }),
            Node::Element { name, props, children } => {
                let nested = style.inherit(&style::merge(props.get("style")));
                match primitive(child) {
                    Some(PdfPrimitive::Text) => collect_spans(children, &nested, link, out)?,
                    Some(PdfPrimitive::Link) => {
                        let target = link_target(props);
                        collect_spans(children, &nested, target.as_deref().or(link), out)?
                    }
                    _ => return Err(format!("<{name}> cannot be placed inside <Text>")),
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum PieceKind {
    Word,
    Space,
    Break,
}

#[derive(Debug, Clone)]
struct Piece {
    kind: PieceKind,
    text: String,
    span: usize,
    width: f32,
}

fn pieces(spans: &[Span]) -> Vec<Piece> {
    let mut out: Vec<Piece> = Vec::new();
    for (index, span) in spans.iter().enumerate() {
        let font = span.style.font();
        let size = span.style.size;
        let mut word = String::new();
        let flush = |word: &mut String, out: &mut Vec<Piece>| {
            if !word.is_empty() {
                let text = std::mem::take(word);
                out.push(Piece {
                    kind: PieceKind::Word,
                    width: font.measure(&text, size),
                    text,
                    span: index,
                });
            }
        };
        for c in span.text.chars() {
            if c == '\n' {
                flush(&mut word, &mut out);
                out.push(Piece {
                    kind: PieceKind::Break,
                    text: String::new(),
                    span: index,
                    width: 0.0,
                });
            } else if c.is_whitespace() && c != '\u{00A0}' {
                flush(&mut word, &mut out);
                if !matches!(out.last(), Some(p) if p.kind == PieceKind::Space) {
                    out.push(Piece {
                        kind: PieceKind::Space,
                        text: " ".into(),
                        span: index,
                        width: font.measure(" ", size),
                    });
                }
            } else {
                word.push(c);
            }
        }
        flush(&mut word, &mut out);
    }
    out
}

/// Greedy line breaking. Whitespace collapses, `\n` forces a break, and
/// words wider than the line are split between characters.
fn break_lines(spans: &[Span], max_width: f32, align: Align) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Vec<Piece> = Vec::new();
    let mut width = 0.0;

    for piece in pieces(spans) {
        match piece.kind {
            PieceKind::Break => {
                let span = piece.span;
                lines.push(finish_line(std::mem::take(&mut current), spans, span, max_width, align));
                width = 0.0;
            }
            PieceKind::Space => {
                if !current.is_empty() {
                    width += piece.width;
                    current.push(piece);
                }
            }
            PieceKind::Word => {
                let has_word = current.iter().any(|p| p.kind == PieceKind::Word);
                if has_word && width + piece.width > max_width + EPSILON {
                    let span = piece.span;
                    lines.push(finish_line(std::mem::take(&mut current), spans, span, max_width, align));
                    width = 0.0;
                }
                if piece.width > max_width + EPSILON {
                    let mut chunks = split_word(&piece, &spans[piece.span], max_width);
                    let last = chunks.pop();
                    for chunk in chunks {
                        let span = chunk.span;
                        current.push(chunk);
                        lines.push(finish_line(std::mem::take(&mut current), spans, span, max_width, align));
                    }
                    if let Some(last) = last {
                        width = last.width;
                        current.push(last);
                    }
                } else {
                    width += piece.width;
                    current.push(piece);
                }
            }
        }
    }

    if current.iter().any(|p| p.kind == PieceKind::Word) {
        let span = current[0].span;
        lines.push(finish_line(current, spans, span, max_width, align));
    }
    lines
}

fn split_word(piece: &Piece, span: &Span, max_width: f32) -> Vec<Piece> {
    let font = span.style.font();
    let size = span.style.size;
    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut width = 0.0;
    for c in piece.text.chars() {
        let w = font.char_width(c) as f32 * size / 1000.0;
        if !text.is_empty() && width + w > max_width + EPSILON {
            chunks.push(Piece {
                kind: PieceKind::Word,
                text: std::mem::take(&mut text),
                span: piece.span,
                width,
            });
            width = 0.0;
        }
        text.push(c);
        width += w;
    }
    if !text.is_empty() {
        chunks.push(Piece {
            kind: PieceKind::Word,
            text,
            span: piece.span,
            width,
        });
    }
    chunks
}

fn finish_line(mut pieces: Vec<Piece>, spans: &[Span], fallback_span: usize, max_width: f32, align: Align) -> Line {
    while matches!(pieces.last(), Some(p) if p.kind == PieceKind::Space) {
        pieces.pop();
    }

    let mut height: f32 = 0.0;
    let mut baseline: f32 = 0.0;
    let mut runs: Vec<Run> = Vec::new();
    let mut x = 0.0;
    let mut last_span = None;

    let metrics = |span: &Span| {
        let line_height = span.style.line_height();
        let font = span.style.font();
        let size = span.style.size;
        (line_height, (line_height - size) / 2.0 + font.ascent() * size)
    };

    if pieces.is_empty() {
        if let Some(span) = spans.get(fallback_span) {
            let (h, b) = metrics(span);
            height = h;
            baseline = b;
        }
    }

    for piece in pieces {
        let span = &spans[piece.span];
        let (h, b) = metrics(span);
        height = height.max(h);
        baseline = baseline.max(b);

        let same_span = last_span == Some(piece.span);
        match runs.last_mut() {
            Some(run) if same_span => {
                run.text.push_str(&piece.text);
                run.width += piece.width;
            }
            _ => runs.push(Run {
                x,
                width: piece.width,
                text: piece.text,
                font: span.style.font(),
                size: span.style.size,
                color: span.style.color,
                underline: span.style.underline,
                link: span.link.clone(),
            }),
        }
        last_span = Some(piece.span);
        x += piece.width;
    }

    let offset = match align {
        Align::Left => 0.0,
        Align::Center => ((max_width - x) / 2.0).max(0.0),
        Align::Right => (max_width - x).max(0.0),
    };
    for run in &mut runs {
        run.x += offset;
    }

    Line {
        width: x,
        height,
        baseline,
        runs,
    }
}

// ============================================================================
// Pages
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    Text {
        x: f32,
        baseline: f32,
        text: String,
        font: Font,
        size: f32,
        color: Color,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: Rc<DecodedImage>,
    },
    Link {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub info: DocumentInfo,
    pub pages: Vec<PageLayout>,
}

pub const A4: (f32, f32) = (595.28, 841.89);

/// Named page sizes in points, portrait.
pub fn named_page_size(name: &str) -> Option<(f32, f32)> {
    match name.to_ascii_uppercase().as_str() {
        "A3" => Some((841.89, 1190.55)),
        "A4" => Some(A4),
        "A5" => Some((419.53, 595.28)),
        "LETTER" => Some((612.0, 792.0)),
        "LEGAL" => Some((612.0, 1008.0)),
        "TABLOID" => Some((792.0, 1224.0)),
        _ => None,
    }
}

fn page_size(props: &Map<String, Value>) -> LayoutResult<(f32, f32)> {
    let size = match props.get("size") {
        None | Some(Value::Null) => A4,
        Some(Value::String(name)) => {
            named_page_size(name).ok_or_else(|| format!("unknown page size `{name}`"))?
        }
        Some(Value::Array(dims)) => match dims.as_slice() {
            [w, h] => (
                parse_length(w, 0.0).ok_or("invalid page width")?,
                parse_length(h, 0.0).ok_or("invalid page height")?,
            ),
            _ => return Err("page size must be [width, height]".into()),
        },
        Some(Value::Object(dims)) => (
            dims.get("width").and_then(|v| parse_length(v, 0.0)).ok_or("invalid page width")?,
            dims.get("height").and_then(|v| parse_length(v, 0.0)).ok_or("invalid page height")?,
        ),
        Some(_) => return Err("invalid page size".into()),
    };
    if size.0 <= 0.0 || size.1 <= 0.0 {
        return Err("page size must be positive".into());
    }

    let (w, h) = size;
    Ok(match props.get("orientation").and_then(Value::as_str) {
        Some("landscape") if w < h => (h, w),
        Some("portrait") if w > h => (h, w),
        _ => size,
    })
}

/// Lays out a primitive tree: a `Document` root, or bare `Page`s.
pub fn layout(tree: &[Node]) -> LayoutResult<DocumentLayout> {
    let roots: Vec<&Node> = tree.iter().filter(|n| !n.is_blank_text()).collect();

    let document = match roots.as_slice() {
        [root] if primitive(root) == Some(PdfPrimitive::Document) => Some(*root),
        _ => None,
    };

    let (info, page_nodes): (DocumentInfo, Vec<&Node>) = match document {
        Some(Node::Element { props, children, .. }) => {
            let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
            let info = DocumentInfo {
                title: text("title"),
                author: text("author"),
                subject: text("subject"),
                keywords: text("keywords"),
                creator: text("creator"),
            };
            (info, children.iter().filter(|n| !n.is_blank_text()).collect())
        }
        _ => (DocumentInfo::default(), roots),
    };

    let mut pages = Vec::new();
    for node in page_nodes {
        match (primitive(node), node) {
            (Some(PdfPrimitive::Page), Node::Element { props, children, .. }) => {
                layout_page(props, children, &mut pages)?;
            }
            _ => {
                let name = node.name().unwrap_or("text");
                return Err(format!("<{name}> must be placed inside a <Page>"));
            }
        }
    }

    if pages.is_empty() {
        pages.push(PageLayout {
            width: A4.0,
            height: A4.1,
            ops: Vec::new(),
        });
    }

    Ok(DocumentLayout { info, pages })
}

fn layout_page(props: &Map<String, Value>, children: &[Node], pages: &mut Vec<PageLayout>) -> LayoutResult<()> {
    let (width, height) = page_size(props)?;
    let style = style::merge(props.get("style"));
    let padding = Edges::from_style(&style, "padding", width);
    let text_style = TextStyle::default().inherit(&style);
    let content_width = (width - padding.horizontal()).max(0.0);

    let mut paginator = Paginator {
        width,
        height,
        padding,
        background: style.get("backgroundColor").and_then(parse_color),
        wrap: props.get("wrap").and_then(Value::as_bool).unwrap_or(true),
        first_page: pages.len(),
        pages,
        cursor: 0.0,
        open: Vec::new(),
    };
    paginator.start_page()?;

    for child in children {
        if let Some(b) = measure(child, &text_style, content_width)? {
            paginator.place(&b, padding.left)?;
        }
    }
    Ok(())
}

/// A box that is being split across pages.
struct OpenBox {
    x: f32,
    width: f32,
    border: Border,
    background: Option<Color>,
    link: Option<String>,
    top: f32,
    op_index: usize,
    first: bool,
}

struct Paginator<'a> {
    width: f32,
    height: f32,
    padding: Edges,
    background: Option<Color>,
    wrap: bool,
    first_page: usize,
    pages: &'a mut Vec<PageLayout>,
    cursor: f32,
    open: Vec<OpenBox>,
}

impl Paginator<'_> {
    fn content_top(&self) -> f32 {
        self.padding.top
    }

    fn content_bottom(&self) -> f32 {
        self.height - self.padding.bottom
    }

    fn start_page(&mut self) -> LayoutResult<()> {
        if self.pages.len() >= MAX_PAGES {
            return Err(format!("document exceeds {MAX_PAGES} pages"));
        }
        let mut ops = Vec::new();
        if let Some(color) = self.background {
            ops.push(DrawOp::Fill {
                x: 0.0,
                y: 0.0,
                width: self.width,
                height: self.height,
                color,
            });
        }
        self.pages.push(PageLayout {
            width: self.width,
            height: self.height,
            ops,
        });
        self.cursor = self.content_top();
        Ok(())
    }

    fn ops(&mut self) -> &mut Vec<DrawOp> {
        let page = self.pages.len() - 1;
        debug_assert!(page >= self.first_page);
        &mut self.pages[page].ops
    }

    fn at_top(&self) -> bool {
        self.cursor <= self.content_top() + EPSILON
    }

    fn fits(&self, height: f32) -> bool {
        !self.wrap || self.cursor + height <= self.content_bottom() + EPSILON
    }

    fn new_page(&mut self) -> LayoutResult<()> {
        if !self.wrap {
            return Ok(());
        }
        let bottom = self.content_bottom();
        for index in (0..self.open.len()).rev() {
            let fragment = decoration(&self.open[index], bottom, false);
            let at = self.open[index].op_index;
            self.ops().splice(at..at, fragment).for_each(drop);
        }
        self.start_page()?;
        let top = self.content_top();
        let at = self.ops().len();
        for open in &mut self.open {
            open.top = top;
            open.op_index = at;
            open.first = false;
        }
        Ok(())
    }

    /// Places `b` with its margin box starting at `x` on the current line of flow.
    fn place(&mut self, b: &LayoutBox, x: f32) -> LayoutResult<()> {
        if b.break_before && !self.at_top() {
            self.new_page()?;
        }

        if !self.fits(b.outer_height()) && !b.can_split() && !self.at_top() {
            self.new_page()?;
        }

        if self.fits(b.outer_height()) || !b.can_split() {
            self.cursor += b.margin.top;
            let y = self.cursor;
            self.draw(b, x + b.margin.left, y);
            self.cursor += b.height + b.margin.bottom;
            return Ok(());
        }

        self.cursor += b.margin.top;
        let bx = x + b.margin.left;
        let op_index = self.ops().len();
        self.open.push(OpenBox {
            x: bx,
            width: b.width,
            border: b.border,
            background: b.background,
            link: b.link.clone(),
            top: self.cursor,
            op_index,
            first: true,
        });

        self.cursor += b.border.width.top + b.padding.top;
        let cx = bx + b.border.width.left + b.padding.left;
        match &b.kind {
            BoxKind::Stack { children, gap } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.cursor += gap;
                    }
                    self.place(child, cx)?;
                }
            }
            BoxKind::Lines(lines) => {
                for line in lines {
                    if !self.fits(line.height) && !self.at_top() {
                        self.new_page()?;
                    }
                    let y = self.cursor;
                    let ops = draw_line(line, cx, y);
                    self.ops().extend(ops);
                    self.cursor += line.height;
                }
            }
            BoxKind::Row(_) | BoxKind::Image(_) | BoxKind::Empty => {}
        }
        self.cursor += b.padding.bottom + b.border.width.bottom;

        if let Some(open) = self.open.pop() {
            let fragment = decoration(&open, self.cursor, true);
            self.ops().splice(open.op_index..open.op_index, fragment).for_each(drop);
        }
        self.cursor += b.margin.bottom;
        Ok(())
    }

    /// Draws `b` whole with its border box at (`x`, `y`).
    fn draw(&mut self, b: &LayoutBox, x: f32, y: f32) {
        let whole = OpenBox {
            x,
            width: b.width,
            border: b.border,
            background: b.background,
            link: b.link.clone(),
            top: y,
            op_index: 0,
            first: true,
        };
        let fragment = decoration(&whole, y + b.height, true);
        self.ops().extend(fragment);

        let cx = x + b.border.width.left + b.padding.left;
        let cy = y + b.border.width.top + b.padding.top;
        match &b.kind {
            BoxKind::Stack { children, gap } => {
                let mut y = cy;
                for child in children {
                    y += child.margin.top;
                    self.draw(child, cx + child.margin.left, y);
                    y += child.height + child.margin.bottom + gap;
                }
            }
            BoxKind::Row(cells) => {
                for (offset, cell) in cells {
                    self.draw(cell, cx + offset + cell.margin.left, cy + cell.margin.top);
                }
            }
            BoxKind::Lines(lines) => {
                let mut y = cy;
                for line in lines {
                    let ops = draw_line(line, cx, y);
                    self.ops().extend(ops);
                    y += line.height;
                }
            }
            BoxKind::Image(image) => {
                let inset_h = b.border.width.horizontal() + b.padding.horizontal();
                let inset_v = b.border.width.vertical() + b.padding.vertical();
                self.ops().push(DrawOp::Image {
                    x: cx,
                    y: cy,
                    width: (b.width - inset_h).max(0.0),
                    height: (b.height - inset_v).max(0.0),
                    image: image.clone(),
                });
            }
            BoxKind::Empty => {}
        }
    }
}

/// Background, borders and link area of one fragment of a box.
fn decoration(open: &OpenBox, bottom: f32, last: bool) -> Vec<DrawOp> {
    let mut ops = Vec::new();
    let height = (bottom - open.top).max(0.0);
    if height <= 0.0 && !open.first {
        return ops;
    }
    if let Some(color) = open.background {
        ops.push(DrawOp::Fill {
            x: open.x,
            y: open.top,
            width: open.width,
            height,
            color,
        });
    }
    let border = &open.border;
    if border.is_visible() {
        let [top, right, bottom_color, left] = border.colors;
        let mut rect = |x: f32, y: f32, width: f32, height: f32, color: Color| {
            if width > 0.0 && height > 0.0 {
                ops.push(DrawOp::Fill {
                    x,
                    y,
                    width,
                    height,
                    color,
                });
            }
        };
        if open.first {
            rect(open.x, open.top, open.width, border.width.top, top);
        }
        if last {
            rect(open.x, bottom - border.width.bottom, open.width, border.width.bottom, bottom_color);
        }
        rect(open.x, open.top, border.width.left, height, left);
        rect(open.x + open.width - border.width.right, open.top, border.width.right, height, right);
    }
    if let Some(url) = &open.link {
        ops.push(DrawOp::Link {
            x: open.x,
            y: open.top,
            width: open.width,
            height,
            url: url.clone(),
        });
    }
    ops
}

fn draw_line(line: &Line, x: f32, y: f32) -> Vec<DrawOp> {
    let mut ops = Vec::with_capacity(line.runs.len());
    for run in &line.runs {
        let rx = x + run.x;
        ops.push(DrawOp::Text {
            x: rx,
            baseline: y + line.baseline,
            text: run.text.clone(),
            font: run.font,
            size: run.size,
            color: run.color,
        });
        if run.underline {
            let thickness = (run.size * 0.05).max(0.5);
            ops.push(DrawOp::Fill {
                x: rx,
                y: y + line.baseline + run.size * 0.1,
                width: run.width,
                height: thickness,
                color: run.color,
            });
        }
        if let Some(url) = &run.link {
            ops.push(DrawOp::Link {
                x: rx,
                y,
                width: run.width,
                height: line.height,
                url: url.clone(),
            });
        }
    }
    ops
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

    fn text(value: &str) -> Node {
        el("Text", json!({}), vec![Node::text(value)])
    }

    fn texts(page: &PageLayout) -> Vec<&str> {
        page.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parses_margin_shorthands() {
        let style = style::merge(Some(&json!({"margin": "4 8", "marginLeft": 2, "paddingVertical": 3})));
        let margin = Edges::from_style(&style, "margin", 100.0);
        assert_eq!(margin, Edges { top: 4.0, right: 8.0, bottom: 4.0, left: 2.0 });
        let padding = Edges::from_style(&style, "padding", 100.0);
        assert_eq!(padding.vertical(), 6.0);
        assert_eq!(padding.horizontal(), 0.0);
    }

    #[test]
    fn test_parses_border_shorthand() {
        let style = style::merge(Some(&json!({"borderBottom": "2pt solid #ff0000"})));
        let border = Border::from_style(&style, 100.0);
        assert_eq!(border.width.bottom, 2.0);
        assert_eq!(border.width.top, 0.0);
        assert_eq!(border.colors[2], Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_wraps_text_to_width() {
        let spans = vec![Span {
            text: "aaa bbb   ccc\nddd".into(),
            style: TextStyle::default(),
            link: None,
        }];
        let word = Font::Helvetica.measure("aaa", DEFAULT_FONT_SIZE);
        let space = Font::Helvetica.measure(" ", DEFAULT_FONT_SIZE);
        let lines = break_lines(&spans, word * 2.0 + space + 0.1, Align::Left);

        let text: Vec<String> = lines
            .iter()
            .map(|l| l.runs.iter().map(|r| r.text.as_str()).collect())
            .collect();
        assert_eq!(text, vec!["aaa bbb", "ccc", "ddd"]);
        assert!((lines[0].height - DEFAULT_FONT_SIZE * DEFAULT_LINE_HEIGHT).abs() < 1e-4);
    }

    #[test]
    fn test_splits_words_longer_than_the_line() {
        let spans = vec![Span {
            text: "abcdefghij".into(),
            style: TextStyle::default(),
            link: None,
        }];
        let lines = break_lines(&spans, Font::Helvetica.measure("abcd", DEFAULT_FONT_SIZE), Align::Left);
        assert!(lines.len() >= 3);
        let joined: String = lines.iter().flat_map(|l| l.runs.iter().map(|r| r.text.clone())).collect();
        assert_eq!(joined, "abcdefghij");
    }

    #[test]
    fn test_aligns_lines() {
        let spans = vec![Span {
            text: "hi".into(),
            style: TextStyle::default(),
            link: None,
        }];
        let width = Font::Helvetica.measure("hi", DEFAULT_FONT_SIZE);
        let right = break_lines(&spans, 100.0, Align::Right);
        assert!((right[0].runs[0].x - (100.0 - width)).abs() < 1e-4);
        let center = break_lines(&spans, 100.0, Align::Center);
        assert!((center[0].runs[0].x - (100.0 - width) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_nested_text_inherits_and_overrides() {
        let tree = vec![el(
            "Document",
            json!({"title": "Report"}),
            vec![el(
                "Page",
                json!({"style": {"color": "#333", "fontSize": 10}}),
                vec![el(
                    "Text",
                    json!({}),
                    vec![
                        Node::text("Clip "),
                        el("Text", json!({"style": {"fontWeight": "bold"}}), vec![Node::text("A001")]),
                    ],
                )],
            )],
        )];
        let doc = layout(&tree).unwrap();
        assert_eq!(doc.info.title.as_deref(), Some("Report"));
        let fonts: Vec<(Font, f32)> = doc.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { font, size, .. } => Some((*font, *size)),
                _ => None,
            })
            .collect();
        assert_eq!(fonts, vec![(Font::Helvetica, 10.0), (Font::HelveticaBold, 10.0)]);
    }

    #[test]
    fn test_flows_onto_new_pages() {
        let rows: Vec<Node> = (0..200).map(|i| text(&format!("row {i}"))).collect();
        let doc = layout(&[el("Page", json!({"size": "A5", "style": {"padding": 30}}), rows)]).unwrap();
        assert!(doc.pages.len() > 1);
        assert!(doc.pages.iter().all(|p| p.width == 419.53));

        let all: Vec<&str> = doc.pages.iter().flat_map(texts).collect();
        assert_eq!(all.len(), 200);
        assert_eq!(all[0], "row 0");
        assert_eq!(all[199], "row 199");

        for page in &doc.pages {
            for op in &page.ops {
                if let DrawOp::Text { baseline, .. } = op {
                    assert!(*baseline <= page.height - 30.0 + 1.0);
                }
            }
        }
    }

    #[test]
    fn test_break_prop_starts_a_new_page() {
        let doc = layout(&[el(
            "Page",
            json!({}),
            vec![text("first"), el("View", json!({"break": true}), vec![text("second")])],
        )])
        .unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(texts(&doc.pages[1]), vec!["second"]);
    }

    #[test]
    fn test_unwrappable_views_move_whole() {
        let filler = el("View", json!({"style": {"height": 700}}), vec![]);
        let block = el(
            "View",
            json!({"wrap": false}),
            (0..10).map(|i| text(&format!("line {i}"))).collect(),
        );
        let doc = layout(&[el("Page", json!({}), vec![filler, block])]).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(texts(&doc.pages[1]).len(), 10);
    }

    #[test]
    fn test_split_backgrounds_are_drawn_per_page() {
        let block = el(
            "View",
            json!({"style": {"backgroundColor": "#eee"}}),
            (0..120).map(|i| text(&format!("line {i}"))).collect(),
        );
        let doc = layout(&[el("Page", json!({}), vec![block])]).unwrap();
        assert!(doc.pages.len() > 1);
        for page in &doc.pages {
            let first = page.ops.first().unwrap();
            assert!(matches!(first, DrawOp::Fill { color, .. } if *color == Color::rgb(238, 238, 238)));
        }
    }

    #[test]
    fn test_rows_share_width_by_flex() {
        let row = el(
            "View",
            json!({"style": {"flexDirection": "row"}}),
            vec![
                el("View", json!({"style": {"width": 100}}), vec![text("a")]),
                el("View", json!({"style": {"flex": 1}}), vec![text("b")]),
                el("View", json!({"style": {"flex": 3}}), vec![text("c")]),
            ],
        );
        let b = measure(&row, &TextStyle::default(), 500.0).unwrap().unwrap();
        let BoxKind::Row(cells) = &b.kind else {
            panic!("expected a row");
        };
        let offsets: Vec<f32> = cells.iter().map(|(x, _)| *x).collect();
        assert_eq!(offsets, vec![0.0, 100.0, 200.0]);
        assert_eq!(cells[2].1.width, 300.0);
    }

    #[test]
    fn test_page_sizes_and_orientation() {
        let portrait = page_size(&Map::new()).unwrap();
        assert_eq!(portrait, A4);
        let props = json!({"size": "letter", "orientation": "landscape"});
        assert_eq!(page_size(props.as_object().unwrap()).unwrap(), (792.0, 612.0));
        let props = json!({"size": [200, 300]});
        assert_eq!(page_size(props.as_object().unwrap()).unwrap(), (200.0, 300.0));
        let props = json!({"size": "B9"});
        assert!(page_size(props.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_links_produce_annotations() {
        let doc = layout(&[el(
            "Page",
            json!({}),
            vec![
                el("Link", json!({"src": "https://example.com"}), vec![Node::text("site")]),
                el("Link", json!({"src": "javascript:alert(1)"}), vec![Node::text("bad")]),
            ],
        )])
        .unwrap();
        let urls: Vec<&str> = doc.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Link { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(urls, vec!["https://example.com"]);
    }

    #[test]
    fn test_rejects_misplaced_elements() {
        assert!(layout(&[text("loose")]).unwrap_err().contains("inside a <Page>"));
        let nested = el("Page", json!({}), vec![el("Text", json!({}), vec![el("View", json!({}), vec![])])]);
        assert!(layout(&[nested]).unwrap_err().contains("inside <Text>"));
        let html = el("Page", json!({}), vec![el("div", json!({}), vec![])]);
        assert!(layout(&[html]).unwrap_err().contains("not a pdf element"));
    }

    #[test]
    fn test_empty_documents_have_one_page() {
        let doc = layout(&[el("Document", json!({}), vec![])]).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.pages[0].ops.is_empty());
    }
}
