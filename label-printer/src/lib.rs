//! # label-printer
//!
//! Label rendering and silent PDF printing - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - Fixed-layout label PDF rendering (Times fonts, auto-fitted text)
//! - Host-sheet wrapping (Letter / A4) and page duplication
//! - Silent printing through SumatraPDF (executable resolution, copy strategies)
//! - PDF preview rasterizing (optional)
//! - Installed printer enumeration (Windows)
//!
//! Business logic (WHAT to print) stays in application code:
//! - Label records, codes and storage → label-station
//! - Print job orchestration and cleanup → label-station
//!
//! ## Example
//!
//! ```ignore
//! use label_printer::{
//!     CopyStrategy, ExecutableLocator, LabelContent, LabelRenderer, PrintBackend,
//!     RenderSettings, SumatraBackend, SumatraSettings,
//! };
//!
//! let renderer = LabelRenderer::new(RenderSettings::default())?;
//! let content = LabelContent {
//!     headline: "VG0100".into(),
//!     description: "Virgin resin, natural".into(),
//!     ..Default::default()
//! };
//! let pdf = renderer.render_to_spool(&content, 1, &std::env::temp_dir())?;
//!
//! let backend = SumatraBackend::new(
//!     ExecutableLocator::new("assets", true),
//!     SumatraSettings::default(),
//! );
//! backend.dispatch(&pdf, 2, CopyStrategy::Loop, None)?;
//! ```

mod backend;
mod error;
mod layout;
mod pdf;
mod preview;
mod printer;
mod sumatra;

// Re-exports
pub use backend::{CopyStrategy, DispatchReport, LoopFailurePolicy, PrintBackend};
pub use error::{PrintError, PrintResult};
pub use layout::{
    HostPaper, HostPlacement, HostScale, LabelLayout, Typeface, fit_font_size, fit_paragraph,
    place_on_host, wrap_text,
};
pub use pdf::{HostWrap, LabelContent, LabelRenderer, RenderSettings};
pub use preview::{PdftoppmRasterizer, Preview, Previewer, Rasterizer, placeholder_image};
pub use printer::{default_printer, is_virtual_port, list_printers};
pub use sumatra::{
    ExecutableLocator, Launcher, Orientation, PageScale, ProcessLauncher, SumatraBackend,
    SumatraSettings,
};
