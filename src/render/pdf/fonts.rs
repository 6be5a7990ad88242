//! Standard (base-14) fonts: selection from style, WinAnsi encoding and
//! glyph advance widths. Nothing is embedded; every PDF viewer ships these.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Font {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl Font {
    pub const ALL: [Font; 8] = [
        Font::Helvetica,
        Font::HelveticaBold,
        Font::HelveticaOblique,
        Font::HelveticaBoldOblique,
        Font::Courier,
        Font::CourierBold,
        Font::CourierOblique,
        Font::CourierBoldOblique,
    ];

    /// Picks a font from `fontFamily`, `fontWeight` and `fontStyle` values.
    /// Families other than Courier or monospace fall back to Helvetica.
    pub fn select(family: Option<&Value>, weight: Option<&Value>, style: Option<&Value>) -> Self {
        let family = family
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mono = family.contains("courier") || family.contains("mono");
        let bold = family.contains("bold") || is_bold(weight);
        let italic = family.contains("oblique")
            || family.contains("italic")
            || matches!(style.and_then(Value::as_str), Some("italic" | "oblique"));

        match (mono, bold, italic) {
            (false, false, false) => Font::Helvetica,
            (false, true, false) => Font::HelveticaBold,
            (false, false, true) => Font::HelveticaOblique,
            (false, true, true) => Font::HelveticaBoldOblique,
            (true, false, false) => Font::Courier,
            (true, true, false) => Font::CourierBold,
            (true, false, true) => Font::CourierOblique,
            (true, true, true) => Font::CourierBoldOblique,
        }
    }

    pub fn base_name(self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
            Font::HelveticaOblique => "Helvetica-Oblique",
            Font::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Font::Courier => "Courier",
            Font::CourierBold => "Courier-Bold",
            Font::CourierOblique => "Courier-Oblique",
            Font::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
            Font::HelveticaOblique => "F3",
            Font::HelveticaBoldOblique => "F4",
            Font::Courier => "F5",
            Font::CourierBold => "F6",
            Font::CourierOblique => "F7",
            Font::CourierBoldOblique => "F8",
        }
    }

    fn is_bold(self) -> bool {
        matches!(
            self,
            Font::HelveticaBold | Font::HelveticaBoldOblique | Font::CourierBold | Font::CourierBoldOblique
        )
    }

    fn is_mono(self) -> bool {
        matches!(
            self,
            Font::Courier | Font::CourierBold | Font::CourierOblique | Font::CourierBoldOblique
        )
    }

    /// Advance width of `c` in thousandths of the font size.
    pub fn char_width(self, c: char) -> u16 {
        if self.is_mono() {
            return 600;
        }
        let table = if self.is_bold() {
            &HELVETICA_BOLD
        } else {
            &HELVETICA
        };
        match c as u32 {
            code @ 32..=126 => table[(code - 32) as usize],
            _ => extended_width(c, self.is_bold()),
        }
    }

    /// Width of `text` in points at `size`.
    pub fn measure(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c))).sum();
        units as f32 * size / 1000.0
    }

    pub fn ascent(self) -> f32 {
        if self.is_mono() {
            0.629
        } else {
            0.718
        }
    }
}

fn is_bold(weight: Option<&Value>) -> bool {
    match weight {
        Some(Value::Number(n)) => n.as_f64().is_some_and(|w| w >= 600.0),
        Some(Value::String(s)) => match s.as_str() {
            "bold" | "bolder" | "semibold" | "ultrabold" | "heavy" => true,
            other => other.parse::<f64>().is_ok_and(|w| w >= 600.0),
        },
        _ => false,
    }
}

fn extended_width(c: char, bold: bool) -> u16 {
    match c {
        '\u{2014}' | '\u{2026}' | '\u{2030}' | '\u{2122}' => 1000,
        '\u{2013}' | '\u{20AC}' => 556,
        '\u{2018}' | '\u{2019}' | '\u{201A}' => {
            if bold {
                278
            } else {
                222
            }
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' => {
            if bold {
                500
            } else {
                333
            }
        }
        '\u{2022}' => 350,
        '\u{00A0}' => 278,
        _ => 556,
    }
}

/// Encodes `text` as WinAnsi bytes; characters outside the encoding become `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    match c as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
        _ => match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            '\t' => b' ',
            _ => b'?',
        },
    }
}

// Advance widths for ASCII 32..=126 from the Adobe AFM files.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
