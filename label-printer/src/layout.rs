//! Label geometry and text fitting
//!
//! All measurements are PDF points (1/72 in). Text widths use the standard
//! Adobe metrics of the two built-in Times faces the renderer draws with, so
//! fitting is identical wherever the PDF is produced.

use crate::error::{PrintError, PrintResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const PT_PER_INCH: f32 = 72.0;

/// Largest headline size tried when fitting
pub const HEADLINE_MAX_SIZE: f32 = 220.0;
/// Smallest headline size; longer headlines are allowed to overflow
pub const HEADLINE_MIN_SIZE: f32 = 28.0;
/// Side margin reserved around the headline
pub const HEADLINE_SIDE_MARGIN_IN: f32 = 0.08;
/// Share of the headline size treated as the ascent
pub const ASCENT_RATIO: f32 = 0.80;
pub const UNDERLINE_GAP_PT: f32 = 3.0;
pub const UNDERLINE_STROKE_PT: f32 = 3.0;

pub const DESC_MAX_SIZE: f32 = 52.0;
pub const DESC_MIN_SIZE: f32 = 28.0;
/// The description block starts at this fraction of the label height
pub const DESC_TOP_FRACTION: f32 = 0.60;
pub const DESC_LINE_SPACING: f32 = 1.22;

pub const FOOTER_SIZE: f32 = 10.0;
pub const BANNER_MAX_HEIGHT_IN: f32 = 0.6;

/// Margin kept free around the label on a host sheet
pub const HOST_MARGIN_IN: f32 = 0.25;

/// Physical label size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelLayout {
    pub width_in: f32,
    pub height_in: f32,
    pub margin_in: f32,
}

impl Default for LabelLayout {
    fn default() -> Self {
        Self {
            width_in: 4.0,
            height_in: 6.0,
            margin_in: 0.25,
        }
    }
}

impl LabelLayout {
    pub fn width_pt(&self) -> f32 {
        self.width_in * PT_PER_INCH
    }

    pub fn height_pt(&self) -> f32 {
        self.height_in * PT_PER_INCH
    }

    pub fn margin_pt(&self) -> f32 {
        self.margin_in * PT_PER_INCH
    }

    /// Reject sizes that leave no printable area
    pub fn validate(&self) -> PrintResult<()> {
        if !(self.width_in.is_finite() && self.height_in.is_finite())
            || !(self.width_in > 0.0 && self.height_in > 0.0)
        {
            return Err(PrintError::InvalidConfig(format!(
                "label size must be positive, got {}x{} in",
                self.width_in, self.height_in
            )));
        }
        if !self.margin_in.is_finite()
            || self.margin_in < 0.0
            || self.margin_in * 2.0 >= self.width_in.min(self.height_in)
        {
            return Err(PrintError::InvalidConfig(format!(
                "label margin {} in leaves no printable area",
                self.margin_in
            )));
        }
        Ok(())
    }
}

// ========== Font metrics ==========

/// The two built-in faces used on a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Typeface {
    TimesRoman,
    TimesBold,
}

// Advance widths (1/1000 em) for ASCII 32..=126.
#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

// Advance widths for WinAnsi 0x80..=0xFF. Unassigned slots are 0 and never
// produced by `win_ansi_byte`.
#[rustfmt::skip]
const TIMES_ROMAN_HIGH_WIDTHS: [u16; 128] = [
    500, 0, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 0, 611, 0,
    0, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 0, 444, 722,
    250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333,
    400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444,
    722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333,
    722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500,
    444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500,
];

#[rustfmt::skip]
const TIMES_BOLD_HIGH_WIDTHS: [u16; 128] = [
    500, 0, 333, 500, 500, 1000, 500, 500, 333, 1000, 556, 333, 1000, 0, 667, 0,
    0, 333, 333, 500, 500, 350, 500, 1000, 333, 1000, 389, 333, 722, 0, 444, 722,
    250, 333, 500, 500, 500, 500, 220, 500, 333, 747, 300, 500, 570, 333, 747, 333,
    400, 570, 300, 300, 333, 556, 540, 250, 333, 300, 330, 500, 750, 750, 750, 500,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 389, 389, 389, 389,
    722, 722, 778, 778, 778, 778, 778, 570, 778, 722, 722, 722, 722, 722, 611, 556,
    500, 500, 500, 500, 500, 500, 722, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 556, 500, 500, 500, 500, 500, 570, 500, 556, 556, 556, 556, 500, 556, 500,
];

/// Characters WinAnsiEncoding places at 0x80..=0x9F; `None` is unassigned
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// WinAnsiEncoding byte for `ch`, if the built-in fonts have a glyph for it
///
/// Control characters (C0, DEL and C1) have no glyph.
pub fn win_ansi_byte(ch: char) -> Option<u8> {
    match ch as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => Some(code as u8),
        0x80..=0x9F => None,
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&c| c == Some(ch))
            .map(|idx| 0x80 + idx as u8),
    }
}

impl Typeface {
    /// Width of the glyph actually drawn for `ch` (`?` when unencodable)
    fn glyph_width(self, ch: char) -> u16 {
        let byte = win_ansi_byte(ch).unwrap_or(b'?');
        let (low, high) = match self {
            Typeface::TimesRoman => (&TIMES_ROMAN_WIDTHS, &TIMES_ROMAN_HIGH_WIDTHS),
            Typeface::TimesBold => (&TIMES_BOLD_WIDTHS, &TIMES_BOLD_HIGH_WIDTHS),
        };
        match byte {
            0x20..=0x7E => low[usize::from(byte - 0x20)],
            0x80..=0xFF => high[usize::from(byte - 0x80)],
            _ => low[usize::from(b'?' - 0x20)],
        }
    }

    /// Rendered width of `text` at `size` points
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.glyph_width(c))).sum();
        units as f32 * size / 1000.0
    }
}

/// Largest whole point size in `min..=max` at which `text` fits `max_width`
///
/// Returns `min` when nothing fits.
pub fn fit_font_size(text: &str, face: Typeface, max_width: f32, max: f32, min: f32) -> f32 {
    let mut size = max.floor();
    while size >= min {
        if face.text_width(text, size) <= max_width {
            return size;
        }
        size -= 1.0;
    }
    min
}

/// Greedy word wrap of a single paragraph
///
/// A word wider than the line is kept on its own line rather than split.
pub fn wrap_text(text: &str, face: Typeface, size: f32, max_width: f32) -> Vec<String> {
    let cleaned = text.replace('\r', "");
    let mut words = cleaned.split_whitespace();
    let Some(first) = words.next() else {
        return vec![String::new()];
    };

    let mut lines = Vec::new();
    let mut current = first.to_string();
    for word in words {
        let candidate = format!("{} {}", current, word);
        if face.text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    lines.push(current);
    lines
}

fn wrap_paragraphs(text: &str, face: Typeface, size: f32, max_width: f32) -> Vec<String> {
    let cleaned = text.replace('\r', "");
    cleaned
        .split('\n')
        .flat_map(|raw| wrap_text(raw, face, size, max_width))
        .collect()
}

/// Pick the description size so the wrapped block fits `max_height`
///
/// Explicit newlines start new paragraphs. Falls back to the minimum size
/// (and lets the block run long) when even that does not fit.
pub fn fit_paragraph(text: &str, max_width: f32, max_height: f32) -> (f32, Vec<String>) {
    let face = Typeface::TimesRoman;
    let mut size = DESC_MAX_SIZE;
    while size >= DESC_MIN_SIZE {
        let lines = wrap_paragraphs(text, face, size, max_width);
        if lines.len() as f32 * size * DESC_LINE_SPACING <= max_height {
            return (size, lines);
        }
        size -= 1.0;
    }
    (
        DESC_MIN_SIZE,
        wrap_paragraphs(text, face, DESC_MIN_SIZE, max_width),
    )
}

// ========== Host paper ==========

/// Sheet the label is placed on when the printer is loaded with office paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostPaper {
    Letter,
    A4,
}

impl HostPaper {
    pub fn size_pt(self) -> (f32, f32) {
        match self {
            HostPaper::Letter => (8.5 * PT_PER_INCH, 11.0 * PT_PER_INCH),
            HostPaper::A4 => (210.0 / 25.4 * PT_PER_INCH, 297.0 / 25.4 * PT_PER_INCH),
        }
    }
}

impl FromStr for HostPaper {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(HostPaper::Letter),
            "a4" => Ok(HostPaper::A4),
            other => Err(PrintError::InvalidConfig(format!(
                "unknown host paper: {}",
                other
            ))),
        }
    }
}

/// Whether the label is enlarged to the host sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostScale {
    Fit,
    NoScale,
}

impl FromStr for HostScale {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fit" => Ok(HostScale::Fit),
            "noscale" => Ok(HostScale::NoScale),
            other => Err(PrintError::InvalidConfig(format!(
                "unknown host scale mode: {}",
                other
            ))),
        }
    }
}

/// Where a label lands on its host sheet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostPlacement {
    pub scale: f32,
    /// Lower-left corner of the placed box on the sheet
    pub x: f32,
    pub y: f32,
    /// Label turned 90° counter-clockwise
    pub rotated: bool,
}

impl HostPlacement {
    /// PDF `cm` matrix mapping label space onto the sheet
    pub fn matrix(&self, label_height: f32) -> [f32; 6] {
        let s = self.scale;
        if self.rotated {
            [0.0, s, -s, 0.0, self.x + label_height * s, self.y]
        } else {
            [s, 0.0, 0.0, s, self.x, self.y]
        }
    }
}

/// Centre a `width`×`height` label on `paper`, rotating when that prints larger
pub fn place_on_host(width: f32, height: f32, paper: HostPaper, scale: HostScale) -> HostPlacement {
    let (host_w, host_h) = paper.size_pt();
    let margin = HOST_MARGIN_IN * PT_PER_INCH;
    let avail_w = (host_w - 2.0 * margin).max(1.0);
    let avail_h = (host_h - 2.0 * margin).max(1.0);

    let fit = |box_w: f32, box_h: f32| match scale {
        HostScale::Fit => (avail_w / box_w).min(avail_h / box_h),
        HostScale::NoScale => 1.0,
    };

    let upright = fit(width, height);
    let turned = fit(height, width);
    let upright_area = (width * upright) * (height * upright);
    let turned_area = (height * turned) * (width * turned);

    if turned_area > upright_area {
        HostPlacement {
            scale: turned,
            x: (host_w - height * turned) / 2.0,
            y: (host_h - width * turned) / 2.0,
            rotated: true,
        }
    } else {
        HostPlacement {
            scale: upright,
            x: (host_w - width * upright) / 2.0,
            y: (host_h - height * upright) / 2.0,
            rotated: false,
        }
    }
}
