//! Capability registry: the fixed, per-kind allow-list of building blocks a
//! template may reference.
//!
//! Each [`DocumentKind`] owns its own [`CapabilitySet`]. The sets are built
//! once per process and never merged, so a name such as `Text` resolves to an
//! email paragraph in one and a PDF text block in the other, while `Page` only
//! exists for PDF.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Target output format of a render request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A complete HTML document suitable for an email body.
    Email,
    /// A paginated PDF document, returned base64 encoded.
    Pdf,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailPrimitive {
    Html,
    Head,
    Preview,
    Body,
    Container,
    Section,
    Row,
    Column,
    Heading,
    Text,
    Link,
    Button,
    Img,
    Hr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfPrimitive {
    Document,
    Page,
    View,
    Text,
    Image,
    Link,
}

/// Non-element values exposed alongside the primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    /// `StyleSheet.create(styles)` returns `styles` unchanged.
    StyleSheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Email(EmailPrimitive),
    Pdf(PdfPrimitive),
    Helper(Helper),
}

impl Capability {
    pub fn is_element(self) -> bool {
        !matches!(self, Self::Helper(_))
    }
}

/// Immutable mapping from global name to capability for one document kind.
#[derive(Debug)]
pub struct CapabilitySet {
    kind: DocumentKind,
    entries: BTreeMap<&'static str, Capability>,
    intrinsics: &'static [&'static str],
}

impl CapabilitySet {
    fn new(
        kind: DocumentKind,
        entries: &[(&'static str, Capability)],
        intrinsics: &'static [&'static str],
    ) -> Self {
        Self {
            kind,
            entries: entries.iter().copied().collect(),
            intrinsics,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<Capability> {
        self.entries.get(name).copied()
    }

    /// Lowercase markup tags a template may use directly (`<div>`, `<br/>`).
    pub fn intrinsics(&self) -> &'static [&'static str] {
        self.intrinsics
    }

    pub fn is_intrinsic(&self, tag: &str) -> bool {
        self.intrinsics.contains(&tag)
    }

    /// Names of element primitives, in sorted order.
    pub fn elements(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .filter(|(_, capability)| capability.is_element())
            .map(|(name, _)| *name)
    }

    /// Names of helper values, in sorted order.
    pub fn helpers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .filter(|(_, capability)| !capability.is_element())
            .map(|(name, _)| *name)
    }

    /// Every global name this set installs, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

const EMAIL_INTRINSICS: &[&str] = &[
    "a", "b", "br", "center", "code", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i",
    "img", "li", "ol", "p", "pre", "small", "span", "strong", "sub", "sup", "table", "tbody", "td",
    "th", "thead", "tr", "u", "ul",
];

static EMAIL: LazyLock<CapabilitySet> = LazyLock::new(|| {
    use EmailPrimitive::*;
    CapabilitySet::new(
        DocumentKind::Email,
        &[
            ("Html", Capability::Email(Html)),
            ("Head", Capability::Email(Head)),
            ("Preview", Capability::Email(Preview)),
            ("Body", Capability::Email(Body)),
            ("Container", Capability::Email(Container)),
            ("Section", Capability::Email(Section)),
            ("Row", Capability::Email(Row)),
            ("Column", Capability::Email(Column)),
            ("Heading", Capability::Email(Heading)),
            ("Text", Capability::Email(Text)),
            ("Link", Capability::Email(Link)),
            ("Button", Capability::Email(Button)),
            ("Img", Capability::Email(Img)),
            ("Hr", Capability::Email(Hr)),
        ],
        EMAIL_INTRINSICS,
    )
});

static PDF: LazyLock<CapabilitySet> = LazyLock::new(|| {
    use PdfPrimitive::*;
    CapabilitySet::new(
        DocumentKind::Pdf,
        &[
            ("Document", Capability::Pdf(Document)),
            ("Page", Capability::Pdf(Page)),
            ("View", Capability::Pdf(View)),
            ("Text", Capability::Pdf(Text)),
            ("Image", Capability::Pdf(Image)),
            ("Link", Capability::Pdf(Link)),
            ("StyleSheet", Capability::Helper(Helper::StyleSheet)),
        ],
        &[],
    )
});

/// Returns the capability set for `kind`.
pub fn capabilities_for(kind: DocumentKind) -> &'static CapabilitySet {
    match kind {
        DocumentKind::Email => &EMAIL,
        DocumentKind::Pdf => &PDF,
    }
}
