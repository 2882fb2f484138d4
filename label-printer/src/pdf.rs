//! Fixed-layout label PDF rendering
//!
//! One label is drawn as a single content stream. When a document needs
//! several copies of the label (the duplicate-pages strategy), every page
//! points at that same stream, so the composited page (banner and host sheet
//! placement included) is built once and then repeated.
//!
//! Output is deterministic: no clock or random value reaches the file. The
//! `/Info` dates come from [`LabelContent::issued_at`] and the trailer `/ID`
//! is a digest of the content and settings.

use crate::error::{PrintError, PrintResult};
use crate::layout::{
    self, ASCENT_RATIO, BANNER_MAX_HEIGHT_IN, DESC_LINE_SPACING, DESC_TOP_FRACTION,
    FOOTER_SIZE, HEADLINE_MAX_SIZE, HEADLINE_MIN_SIZE, HEADLINE_SIDE_MARGIN_IN, HostPaper,
    HostScale, LabelLayout, PT_PER_INCH, Typeface, UNDERLINE_GAP_PT, UNDERLINE_STROKE_PT,
    win_ansi_byte,
};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const FONT_BOLD: &str = "F1";
const FONT_ROMAN: &str = "F2";
const BANNER_NAME: &str = "Im1";

/// What goes on a label
///
/// Business code maps its records onto this; the renderer only knows about
/// text blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelContent {
    /// Large underlined text at the top
    pub headline: String,
    /// Secondary underlined word under the headline (e.g. "Scrap")
    pub tag: Option<String>,
    /// Paragraph under the headline, auto-fitted
    pub description: String,
    /// Additional lines appended to the description block
    pub extra_lines: Vec<String>,
    /// Small line at the bottom edge
    pub footer: Option<String>,
    /// Unix milliseconds; only used for document metadata, never drawn
    pub issued_at: i64,
}

/// Placement of the label on a full office sheet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostWrap {
    pub paper: HostPaper,
    pub scale: HostScale,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub layout: LabelLayout,
    /// `None` prints at label size
    pub host: Option<HostWrap>,
    /// Image composited above the footer; must exist when set
    pub banner: Option<PathBuf>,
}

/// Decoded banner, already flattened onto white
struct Banner {
    width_px: u32,
    height_px: u32,
    rgb: Vec<u8>,
}

/// Renders [`LabelContent`] into PDF documents
#[derive(Debug, Clone)]
pub struct LabelRenderer {
    settings: RenderSettings,
}

impl LabelRenderer {
    pub fn new(settings: RenderSettings) -> PrintResult<Self> {
        settings.layout.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `pages` identical pages into PDF bytes
    ///
    /// `pages` below 1 is treated as 1.
    #[instrument(skip(self, content), fields(headline = %content.headline))]
    pub fn render_bytes(&self, content: &LabelContent, pages: u32) -> PrintResult<Vec<u8>> {
        let pages = pages.max(1);
        let banner = self.load_banner()?;
        let (page_w, page_h) = self.page_size();

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let bold_id = doc.add_object(builtin_font("Times-Bold"));
        let roman_id = doc.add_object(builtin_font("Times-Roman"));
        let mut resources = dictionary! {
            "Font" => dictionary! {
                FONT_BOLD => bold_id,
                FONT_ROMAN => roman_id,
            },
        };
        if let Some(banner) = &banner {
            let image_id = doc.add_object(banner_stream(banner));
            resources.set("XObject", dictionary! { BANNER_NAME => image_id });
        }
        let resources_id = doc.add_object(resources);

        let operations = self.page_operations(content, banner.as_ref());
        let encoded = Content { operations }
            .encode()
            .map_err(|e| PrintError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });

        let stamp = pdf_date(content.issued_at);
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(win_ansi(document_title(content).as_str())),
            "Producer" => Object::string_literal("label-printer"),
            "CreationDate" => Object::string_literal(stamp.clone()),
            "ModDate" => Object::string_literal(stamp),
        });

        let id = self.document_id(content, pages);
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.trailer.set(
            "ID",
            vec![
                Object::String(id.clone(), StringFormat::Hexadecimal),
                Object::String(id, StringFormat::Hexadecimal),
            ],
        );

        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| PrintError::Pdf(e.to_string()))?;

        debug!(pages, bytes = bytes.len(), "label rendered");
        Ok(bytes)
    }

    /// Render into a fresh uniquely named file inside `dir`
    ///
    /// The file is created only after rendering succeeded, so a render error
    /// never leaves a partial PDF behind. The caller owns the returned path
    /// and is responsible for deleting it.
    pub fn render_to_spool(
        &self,
        content: &LabelContent,
        pages: u32,
        dir: &Path,
    ) -> PrintResult<PathBuf> {
        let bytes = self.render_bytes(content, pages)?;

        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("label-")
            .suffix(".pdf")
            .tempfile_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;

        let (_, path) = file.keep().map_err(|e| PrintError::Io(e.error))?;
        debug!(path = %path.display(), "label spooled");
        Ok(path)
    }

    fn page_size(&self) -> (f32, f32) {
        match self.settings.host {
            Some(host) => host.paper.size_pt(),
            None => (
                self.settings.layout.width_pt(),
                self.settings.layout.height_pt(),
            ),
        }
    }

    fn page_operations(&self, content: &LabelContent, banner: Option<&Banner>) -> Vec<Operation> {
        let layout = &self.settings.layout;
        let label = self.label_operations(content, banner);

        let Some(host) = self.settings.host else {
            return label;
        };

        let placement = layout::place_on_host(
            layout.width_pt(),
            layout.height_pt(),
            host.paper,
            host.scale,
        );
        let matrix = placement.matrix(layout.height_pt());

        let mut ops = Vec::with_capacity(label.len() + 3);
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            matrix.iter().map(|v| Object::Real(*v)).collect(),
        ));
        ops.extend(label);
        ops.push(Operation::new("Q", vec![]));
        ops
    }

    /// Operations for one label in label space (origin bottom-left)
    fn label_operations(&self, content: &LabelContent, banner: Option<&Banner>) -> Vec<Operation> {
        let layout = &self.settings.layout;
        let w = layout.width_pt();
        let h = layout.height_pt();
        let m = layout.margin_pt();
        let center = w / 2.0;
        let mut ops = Ops::default();

        // Headline
        let side = HEADLINE_SIDE_MARGIN_IN * PT_PER_INCH;
        let size = layout::fit_font_size(
            &content.headline,
            Typeface::TimesBold,
            w - 2.0 * side,
            HEADLINE_MAX_SIZE,
            HEADLINE_MIN_SIZE,
        );
        let baseline = h - 1.0 - ASCENT_RATIO * size;
        let rule_y = ops.underlined(&content.headline, size, center, baseline);

        if let Some(tag) = content.tag.as_deref().filter(|t| !t.trim().is_empty()) {
            let tag_baseline = rule_y - (UNDERLINE_GAP_PT + ASCENT_RATIO * size);
            ops.underlined(tag, size, center, tag_baseline);
        }

        // Bottom band: footer, then banner above it
        let mut reserved = 0.0;
        if let Some(footer) = content.footer.as_deref().filter(|f| !f.is_empty()) {
            ops.text(Typeface::TimesRoman, footer, FOOTER_SIZE, center, m);
            reserved += FOOTER_SIZE * 1.5;
        }
        if let Some(banner) = banner {
            let max_w = w - 2.0 * m;
            let max_h = BANNER_MAX_HEIGHT_IN * PT_PER_INCH;
            let aspect = banner.width_px as f32 / banner.height_px as f32;
            let (bw, bh) = if max_w / max_h > aspect {
                (max_h * aspect, max_h)
            } else {
                (max_w, max_w / aspect)
            };
            ops.image((w - bw) / 2.0, m + reserved, bw, bh);
            reserved += bh + UNDERLINE_GAP_PT;
        }

        // Description block
        let mut block = content.description.clone();
        for line in &content.extra_lines {
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(line);
        }
        if !block.trim().is_empty() {
            let top = h * DESC_TOP_FRACTION;
            let max_height = (top - m - reserved).max(1.0);
            let (desc_size, lines) = layout::fit_paragraph(&block, w - 2.0 * m, max_height);
            let line_height = desc_size * DESC_LINE_SPACING;
            let mut y = top;
            for line in lines {
                ops.text(Typeface::TimesRoman, &line, desc_size, center, y);
                y -= line_height;
            }
        }

        ops.0
    }

    fn load_banner(&self) -> PrintResult<Option<Banner>> {
        let Some(path) = &self.settings.banner else {
            return Ok(None);
        };
        if !path.is_file() {
            return Err(PrintError::MissingAsset(path.clone()));
        }

        let img = image::open(path).map_err(|e| PrintError::CorruptAsset {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        // Composite against white so transparent banners print cleanly
        let rgba = img.to_rgba8();
        let (width_px, height_px) = rgba.dimensions();
        if width_px == 0 || height_px == 0 {
            return Err(PrintError::CorruptAsset {
                path: path.clone(),
                reason: "image has no pixels".to_string(),
            });
        }
        let mut rgb = Vec::with_capacity((width_px * height_px * 3) as usize);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as f32 / 255.0;
            for channel in [r, g, b] {
                rgb.push((channel as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8);
            }
        }

        Ok(Some(Banner {
            width_px,
            height_px,
            rgb,
        }))
    }

    fn document_id(&self, content: &LabelContent, pages: u32) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(content.headline.as_bytes());
        hasher.update([0]);
        hasher.update(content.tag.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0]);
        hasher.update(content.description.as_bytes());
        for line in &content.extra_lines {
            hasher.update([0]);
            hasher.update(line.as_bytes());
        }
        hasher.update([0]);
        hasher.update(content.footer.as_deref().unwrap_or_default().as_bytes());
        hasher.update(content.issued_at.to_be_bytes());
        hasher.update(pages.to_be_bytes());
        hasher.update(format!("{:?}", self.settings).as_bytes());
        hasher.finalize()[..16].to_vec()
    }
}

/// Small builder over content-stream operations
#[derive(Default)]
struct Ops(Vec<Operation>);

impl Ops {
    fn text(&mut self, face: Typeface, text: &str, size: f32, center_x: f32, baseline: f32) {
        let font = match face {
            Typeface::TimesBold => FONT_BOLD,
            Typeface::TimesRoman => FONT_ROMAN,
        };
        let x = center_x - face.text_width(text, size) / 2.0;
        self.0.push(Operation::new("BT", vec![]));
        self.0
            .push(Operation::new("Tf", vec![font.into(), Object::Real(size)]));
        self.0.push(Operation::new(
            "Td",
            vec![Object::Real(round(x)), Object::Real(round(baseline))],
        ));
        self.0.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
        self.0.push(Operation::new("ET", vec![]));
    }

    /// Bold centred text with a rule under it; returns the rule's y
    fn underlined(&mut self, text: &str, size: f32, center_x: f32, baseline: f32) -> f32 {
        self.text(Typeface::TimesBold, text, size, center_x, baseline);
        let half = Typeface::TimesBold.text_width(text, size) / 2.0;
        let y = baseline - UNDERLINE_GAP_PT;
        self.0.push(Operation::new("w", vec![Object::Real(UNDERLINE_STROKE_PT)]));
        self.0.push(Operation::new(
            "m",
            vec![Object::Real(round(center_x - half)), Object::Real(round(y))],
        ));
        self.0.push(Operation::new(
            "l",
            vec![Object::Real(round(center_x + half)), Object::Real(round(y))],
        ));
        self.0.push(Operation::new("S", vec![]));
        y
    }

    fn image(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.0.push(Operation::new("q", vec![]));
        self.0.push(Operation::new(
            "cm",
            vec![
                Object::Real(round(width)),
                0.into(),
                0.into(),
                Object::Real(round(height)),
                Object::Real(round(x)),
                Object::Real(round(y)),
            ],
        ));
        self.0.push(Operation::new("Do", vec![BANNER_NAME.into()]));
        self.0.push(Operation::new("Q", vec![]));
    }
}

fn round(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

fn builtin_font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn banner_stream(banner: &Banner) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => banner.width_px as i64,
            "Height" => banner.height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        banner.rgb.clone(),
    )
}

fn document_title(content: &LabelContent) -> String {
    match content.footer.as_deref() {
        Some(code) if !code.is_empty() => format!("Label {}", code),
        _ => format!("Label {}", content.headline),
    }
}

/// Built-in fonts only cover a single-byte encoding
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| win_ansi_byte(c).unwrap_or(b'?'))
        .collect()
}

fn pdf_date(issued_at_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(issued_at_ms)
        .unwrap_or_default()
        .format("D:%Y%m%d%H%M%SZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabelContent {
        LabelContent {
            headline: "VG0100".to_string(),
            tag: None,
            description: "Virgin polypropylene, natural".to_string(),
            extra_lines: vec!["quantity: 25".to_string()],
            footer: Some("LBL-20260101120000000-0001".to_string()),
            issued_at: 1_767_268_800_000,
        }
    }

    fn renderer(host: Option<HostWrap>) -> LabelRenderer {
        LabelRenderer::new(RenderSettings {
            layout: LabelLayout::default(),
            host,
            banner: None,
        })
        .unwrap()
    }

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = renderer(None);
        let a = r.render_bytes(&sample(), 1).unwrap();
        let b = r.render_bytes(&sample(), 1).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn test_render_differs_for_different_content() {
        let r = renderer(None);
        let mut other = sample();
        other.headline = "VG0200".to_string();
        assert_ne!(
            r.render_bytes(&sample(), 1).unwrap(),
            r.render_bytes(&other, 1).unwrap()
        );
    }

    #[test]
    fn test_duplicate_pages() {
        let r = renderer(None);
        assert_eq!(page_count(&r.render_bytes(&sample(), 1).unwrap()), 1);
        assert_eq!(page_count(&r.render_bytes(&sample(), 3).unwrap()), 3);
        assert_eq!(page_count(&r.render_bytes(&sample(), 0).unwrap()), 1);
    }

    #[test]
    fn test_host_wrap_uses_sheet_size() {
        let r = renderer(Some(HostWrap {
            paper: HostPaper::Letter,
            scale: HostScale::Fit,
        }));
        let bytes = r.render_bytes(&sample(), 1).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        let page_id = *pages.values().next().unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("cm"));
        assert!(text.contains("VG0100"));
    }

    #[test]
    fn test_tag_is_drawn() {
        let r = renderer(None);
        let mut content = sample();
        content.tag = Some("Scrap".to_string());
        let bytes = r.render_bytes(&content, 1).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let text = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).to_string();
        assert!(text.contains("(Scrap)"));
    }

    #[test]
    fn test_missing_banner_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = LabelRenderer::new(RenderSettings {
            banner: Some(dir.path().join("banner.png")),
            ..Default::default()
        })
        .unwrap();
        let err = r.render_bytes(&sample(), 1).unwrap_err();
        assert!(matches!(err, PrintError::MissingAsset(_)));
        assert!(err.is_render_error());
    }

    #[test]
    fn test_corrupt_banner_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("banner.png");
        std::fs::write(&path, b"not an image").unwrap();
        let r = LabelRenderer::new(RenderSettings {
            banner: Some(path),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            r.render_bytes(&sample(), 1),
            Err(PrintError::CorruptAsset { .. })
        ));
    }

    #[test]
    fn test_banner_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("banner.png");
        image::RgbaImage::from_pixel(40, 10, image::Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();
        let r = LabelRenderer::new(RenderSettings {
            banner: Some(path),
            ..Default::default()
        })
        .unwrap();
        let a = r.render_bytes(&sample(), 2).unwrap();
        assert_eq!(a, r.render_bytes(&sample(), 2).unwrap());
        assert_eq!(page_count(&a), 2);
    }

    #[test]
    fn test_render_to_spool_creates_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let r = renderer(None);
        let a = r.render_to_spool(&sample(), 1, dir.path()).unwrap();
        let b = r.render_to_spool(&sample(), 1, dir.path()).unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
        assert_eq!(a.extension().unwrap(), "pdf");
    }

    #[test]
    fn test_failed_render_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("spool");
        let r = LabelRenderer::new(RenderSettings {
            banner: Some(dir.path().join("missing.png")),
            ..Default::default()
        })
        .unwrap();
        assert!(r.render_to_spool(&sample(), 1, &spool).is_err());
        assert!(!spool.exists());
    }

    #[test]
    fn test_win_ansi_replaces_wide_chars() {
        assert_eq!(win_ansi("A\u{e9}\u{4e2d}"), vec![b'A', 0xE9, b'?']);
    }

    #[test]
    fn test_win_ansi_typographic_glyphs() {
        assert_eq!(
            win_ansi("\u{2018}\u{2019}\u{201C}\u{201D}\u{2013}\u{2014}\u{20AC}\u{2022}\u{2026}"),
            vec![0x91, 0x92, 0x93, 0x94, 0x96, 0x97, 0x80, 0x95, 0x85]
        );
        // C1 controls and DEL have no glyph
        assert_eq!(win_ansi("\u{92}\u{80}\u{7f}"), vec![b'?', b'?', b'?']);
    }

    #[test]
    fn test_typographic_description_keeps_glyphs() {
        let r = renderer(None);
        let mut content = sample();
        content.description = "Operator\u{2019}s lot \u{2013} 5 kg \u{20AC}".to_string();
        let bytes = r.render_bytes(&content, 1).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let ops = Content::decode(&doc.get_page_content(page_id).unwrap())
            .unwrap()
            .operations;
        let drawn: Vec<u8> = ops
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(text, _)) => Some(text.clone()),
                _ => None,
            })
            .flat_map(|mut text| {
                text.push(b' ');
                text
            })
            .collect();

        let find = |needle: &[u8]| drawn.windows(needle.len()).any(|w| w == needle);
        assert!(find(b"Operator\x92s"));
        assert!(find(b"lot \x96 5 kg \x80"));
        assert!(!drawn.contains(&b'?'));
    }
}
