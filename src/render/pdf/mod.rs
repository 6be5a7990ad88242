//! PDF rendering: the primitive tree is laid out into fixed-size pages, then
//! serialized with `pdf-writer`. The output string is the base64 encoding of
//! the PDF bytes.

mod bitmap;
mod fonts;
mod layout;
mod writer;

use super::DocumentRenderer;
use crate::capabilities::DocumentKind;
use crate::tree::Node;
use crate::RenderError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, tree: &[Node]) -> Result<String, RenderError> {
        let document =
            layout::layout(tree).map_err(|msg| RenderError::render(DocumentKind::Pdf, msg))?;
        let bytes = writer::write(&document);
        tracing::debug!(
            pages = document.pages.len(),
            bytes = bytes.len(),
            "pdf document written"
        );
        Ok(STANDARD.encode(bytes))
    }
}
