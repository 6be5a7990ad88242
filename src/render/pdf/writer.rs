//! Serializes a laid-out document with `pdf-writer`.
//!
//! Output is a pure function of the layout: no timestamps, no random file
//! identifiers, objects numbered in a fixed order.

use super::bitmap::{DecodedImage, ImageData};
use super::fonts::{self, Font};
use super::layout::{DocumentLayout, DrawOp, PageLayout};
use crate::style::Color;
use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use std::collections::BTreeSet;
use std::rc::Rc;

const CREATOR: &str = "docsandbox";

pub fn write(document: &DocumentLayout) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut alloc = Ref::new(1);

    let catalog_id = alloc.bump();
    let page_tree_id = alloc.bump();

    // Fonts actually used, in a fixed order.
    let used: BTreeSet<Font> = document
        .pages
        .iter()
        .flat_map(|page| page.ops.iter())
        .filter_map(|op| match op {
            DrawOp::Text { font, .. } => Some(*font),
            _ => None,
        })
        .collect();
    let font_ids: Vec<(Font, Ref)> = used.into_iter().map(|font| (font, alloc.bump())).collect();
    for (font, id) in &font_ids {
        pdf.type1_font(*id)
            .base_font(Name(font.base_name().as_bytes()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    let mut page_ids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let page_id = alloc.bump();
        page_ids.push(page_id);
        write_page(&mut pdf, &mut alloc, page, page_id, page_tree_id, &font_ids);
    }

    pdf.pages(page_tree_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);
    pdf.catalog(catalog_id).pages(page_tree_id);

    let info_id = alloc.bump();
    let info = &document.info;
    let mut doc_info = pdf.document_info(info_id);
    if let Some(title) = &info.title {
        doc_info.title(TextStr(title));
    }
    if let Some(author) = &info.author {
        doc_info.author(TextStr(author));
    }
    if let Some(subject) = &info.subject {
        doc_info.subject(TextStr(subject));
    }
    if let Some(keywords) = &info.keywords {
        doc_info.keywords(TextStr(keywords));
    }
    doc_info.creator(TextStr(info.creator.as_deref().unwrap_or(CREATOR)));
    doc_info.producer(TextStr(CREATOR));
    doc_info.finish();

    pdf.finish()
}

fn write_page(
    pdf: &mut Pdf,
    alloc: &mut Ref,
    page: &PageLayout,
    page_id: Ref,
    page_tree_id: Ref,
    font_ids: &[(Font, Ref)],
) {
    let content_id = alloc.bump();

    // Images on this page, deduplicated by identity.
    let mut images: Vec<(Rc<DecodedImage>, Ref)> = Vec::new();
    for op in &page.ops {
        if let DrawOp::Image { image, .. } = op {
            if !images.iter().any(|(known, _)| Rc::ptr_eq(known, image)) {
                images.push((image.clone(), alloc.bump()));
            }
        }
    }
    for (image, id) in &images {
        write_image(pdf, alloc, image, *id);
    }
    let image_name = |image: &Rc<DecodedImage>| {
        let index = images
            .iter()
            .position(|(known, _)| Rc::ptr_eq(known, image))
            .unwrap_or_default();
        format!("Im{}", index + 1)
    };

    let mut annotation_ids = Vec::new();
    let mut content = Content::new();
    let height = page.height;

    for op in &page.ops {
        match op {
            DrawOp::Fill {
                x,
                y,
                width,
                height: h,
                color,
            } => {
                content.save_state();
                set_fill(&mut content, *color);
                content.rect(*x, height - y - h, *width, *h);
                content.fill_nonzero();
                content.restore_state();
            }
            DrawOp::Text {
                x,
                baseline,
                text,
                font,
                size,
                color,
            } => {
                content.begin_text();
                set_fill(&mut content, *color);
                content.set_font(Name(font.resource_name().as_bytes()), *size);
                content.next_line(*x, height - baseline);
                content.show(Str(&fonts::win_ansi(text)));
                content.end_text();
            }
            DrawOp::Image {
                x,
                y,
                width,
                height: h,
                image,
            } => {
                let name = image_name(image);
                content.save_state();
                content.transform([*width, 0.0, 0.0, *h, *x, height - y - h]);
                content.x_object(Name(name.as_bytes()));
                content.restore_state();
            }
            DrawOp::Link {
                x,
                y,
                width,
                height: h,
                url,
            } => {
                let id = alloc.bump();
                annotation_ids.push(id);
                let mut annotation = pdf.annotation(id);
                annotation
                    .subtype(AnnotationType::Link)
                    .rect(Rect::new(*x, height - y - h, x + width, height - y))
                    .border(0.0, 0.0, 0.0, None);
                annotation
                    .action()
                    .action_type(ActionType::Uri)
                    .uri(Str(url.as_bytes()));
                annotation.finish();
            }
        }
    }

    pdf.stream(content_id, &content.finish());

    let mut pdf_page = pdf.page(page_id);
    pdf_page
        .media_box(Rect::new(0.0, 0.0, page.width, page.height))
        .parent(page_tree_id)
        .contents(content_id);
    {
        let mut resources = pdf_page.resources();
        {
            let mut fonts = resources.fonts();
            for (font, id) in font_ids {
                fonts.pair(Name(font.resource_name().as_bytes()), *id);
            }
        }
        if !images.is_empty() {
            let mut x_objects = resources.x_objects();
            for (index, (_, id)) in images.iter().enumerate() {
                let name = format!("Im{}", index + 1);
                x_objects.pair(Name(name.as_bytes()), *id);
            }
        }
    }
    if !annotation_ids.is_empty() {
        pdf_page.annotations(annotation_ids.iter().copied());
    }
    pdf_page.finish();
}

fn write_image(pdf: &mut Pdf, alloc: &mut Ref, image: &DecodedImage, id: Ref) {
    let width = image.width as i32;
    let height = image.height as i32;
    match &image.data {
        ImageData::Jpeg { bytes } => {
            let mut xobject = pdf.image_xobject(id, bytes);
            xobject.filter(Filter::DctDecode);
            xobject.width(width);
            xobject.height(height);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            xobject.finish();
        }
        ImageData::Raw { rgb, alpha } => {
            let mask_id = alpha.as_ref().map(|_| alloc.bump());
            let mut xobject = pdf.image_xobject(id, rgb);
            xobject.width(width);
            xobject.height(height);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            if let Some(mask_id) = mask_id {
                xobject.s_mask(mask_id);
            }
            xobject.finish();

            if let (Some(alpha), Some(mask_id)) = (alpha, mask_id) {
                let mut mask = pdf.image_xobject(mask_id, alpha);
                mask.width(width);
                mask.height(height);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                mask.finish();
            }
        }
    }
}

fn set_fill(content: &mut Content, color: Color) {
    content.set_fill_rgb(color.r, color.g, color.b);
}

#[cfg(test)]
mod tests {
    use super::super::layout::{DocumentInfo, A4};
    use super::*;

    fn page(ops: Vec<DrawOp>) -> PageLayout {
        PageLayout {
            width: A4.0,
            height: A4.1,
            ops,
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_writes_a_pdf_with_used_fonts_only() {
        let document = DocumentLayout {
            info: DocumentInfo {
                title: Some("Day 1".into()),
                ..Default::default()
            },
            pages: vec![page(vec![DrawOp::Text {
                x: 10.0,
                baseline: 20.0,
                text: "A001".into(),
                font: Font::HelveticaBold,
                size: 12.0,
                color: Color::BLACK,
            }])],
        };
        let bytes = write(&document);
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, b"/Helvetica-Bold"));
        assert!(!contains(&bytes, b"/Courier"));
        assert!(contains(&bytes, b"(A001) Tj"));
        assert!(contains(&bytes, b"(Day 1)"));
    }

    #[test]
    fn test_writes_link_annotations() {
        let document = DocumentLayout {
            info: DocumentInfo::default(),
            pages: vec![page(vec![DrawOp::Link {
                x: 0.0,
                y: 0.0,
                width: 50.0,
                height: 10.0,
                url: "https://example.com".into(),
            }])],
        };
        let bytes = write(&document);
        assert!(contains(&bytes, b"/Link"));
        assert!(contains(&bytes, b"(https://example.com)"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let document = DocumentLayout {
            info: DocumentInfo::default(),
            pages: vec![page(vec![]), page(vec![])],
        };
        assert_eq!(write(&document), write(&document));
        assert!(contains(&write(&document), b"/Count 2"));
    }
}
