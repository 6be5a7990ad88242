//! Document renderers: turn the primitive tree a template produced into the
//! final output for its kind.

pub mod email;
pub mod pdf;

use crate::capabilities::DocumentKind;
use crate::tree::Node;
use crate::RenderError;

pub use email::EmailRenderer;
pub use pdf::PdfRenderer;

pub trait DocumentRenderer {
    /// Renders `tree` to the kind's output string: HTML for email, base64
    /// PDF bytes for pdf.
    fn render(&self, tree: &[Node]) -> Result<String, RenderError>;
}

/// Returns the renderer for `kind`.
pub fn renderer_for(kind: DocumentKind) -> &'static dyn DocumentRenderer {
    match kind {
        DocumentKind::Email => &EmailRenderer,
        DocumentKind::Pdf => &PdfRenderer,
    }
}
