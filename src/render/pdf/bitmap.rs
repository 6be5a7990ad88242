//! `data:` URI images for the PDF renderer. Remote and file sources are
//! refused; the sandbox never fetches anything.

use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};

#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// Baseline JPEG, embedded as is with `DCTDecode`.
    Jpeg { bytes: Vec<u8> },
    /// Decoded 8-bit RGB samples with an optional 8-bit alpha mask.
    Raw { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
}

impl DecodedImage {
    /// Intrinsic size in points, treating pixels as CSS pixels.
    pub fn natural_size(&self) -> (f32, f32) {
        (self.width as f32 * 0.75, self.height as f32 * 0.75)
    }
}

/// Decodes a `data:image/png;base64,...` or `data:image/jpeg;base64,...` URI.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, String> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| "image sources must be data: URIs".to_string())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "malformed data: URI".to_string())?;
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err("data: URI images must be base64 encoded".into());
    };

    let format = match mime.to_ascii_lowercase().as_str() {
        "image/png" => ImageFormat::Png,
        "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
        other => return Err(format!("unsupported image type `{other}`")),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 image data: {e}"))?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| format!("failed to decode image: {e}"))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".into());
    }

    let data = match (format, &decoded) {
        (ImageFormat::Jpeg, DynamicImage::ImageRgb8(_)) => ImageData::Jpeg { bytes },
        _ => raw(&decoded),
    };
    Ok(DecodedImage {
        width,
        height,
        data,
    })
}

fn raw(image: &DynamicImage) -> ImageData {
    let rgba = image.to_rgba8();
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(rgba.len() / 4);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    let opaque = alpha.iter().all(|&a| a == u8::MAX);
    ImageData::Raw {
        rgb,
        alpha: (!opaque).then_some(alpha),
    }
}
