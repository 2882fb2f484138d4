//! On-screen preview of a rendered label
//!
//! Rasterizing PDF is delegated to an external tool. When no rasterizer is
//! configured or it fails, the caller gets [`Preview::Unavailable`] instead of
//! an error; a missing preview never blocks printing.

use crate::error::{PrintError, PrintResult};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Turns the first page of a PDF into an image
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path) -> PrintResult<DynamicImage>;
}

/// Rasterizer backed by poppler's `pdftoppm`
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    executable: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(executable: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            executable: executable.into(),
            dpi: dpi.clamp(24, 600),
        }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> PrintResult<DynamicImage> {
        let scratch = tempfile::Builder::new().prefix("label-preview-").tempdir()?;
        let prefix = scratch.path().join("page");

        let status = Command::new(&self.executable)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .args(["-f", "1", "-l", "1", "-singlefile"])
            .arg(pdf_path)
            .arg(&prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if !status.success() {
            return Err(PrintError::Pdf(format!(
                "{} exited with {}",
                self.executable.display(),
                status
            )));
        }

        let png = prefix.with_extension("png");
        image::open(&png).map_err(|e| PrintError::CorruptAsset {
            path: png,
            reason: e.to_string(),
        })
    }
}

/// Outcome of a preview request
#[derive(Debug)]
pub enum Preview {
    Image(DynamicImage),
    Unavailable { reason: String },
}

impl Preview {
    pub fn is_available(&self) -> bool {
        matches!(self, Preview::Image(_))
    }
}

/// Produces previews, degrading gracefully without a rasterizer
#[derive(Default)]
pub struct Previewer {
    rasterizer: Option<Box<dyn Rasterizer>>,
}

impl Previewer {
    pub fn new(rasterizer: Option<Box<dyn Rasterizer>>) -> Self {
        Self { rasterizer }
    }

    /// Previewer that always reports [`Preview::Unavailable`]
    pub fn disabled() -> Self {
        Self { rasterizer: None }
    }

    pub fn preview(&self, pdf_path: &Path) -> Preview {
        let Some(rasterizer) = self.rasterizer.as_deref() else {
            return Preview::Unavailable {
                reason: "no preview rasterizer configured".to_string(),
            };
        };

        match rasterizer.rasterize(pdf_path) {
            Ok(image) => {
                debug!(
                    width = image.width(),
                    height = image.height(),
                    "preview rasterized"
                );
                Preview::Image(image)
            }
            Err(e) => {
                warn!(pdf = %pdf_path.display(), error = %e, "preview unavailable");
                Preview::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Light grey image with a darker border, shown where a preview would be
pub fn placeholder_image(width: u32, height: u32) -> DynamicImage {
    let width = width.max(1);
    let height = height.max(1);
    let fill = Rgba([0xee, 0xee, 0xee, 0xff]);
    let border = Rgba([0x99, 0x99, 0x99, 0xff]);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            border
        } else {
            fill
        }
    });
    DynamicImage::ImageRgba8(img)
}
