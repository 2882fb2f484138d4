//! Print backend abstraction
//!
//! A backend takes an already rendered PDF and gets it onto paper. The
//! production backend launches SumatraPDF silently (see [`crate::sumatra`]);
//! tests plug in doubles that only record what they were asked to do.

use crate::error::{PrintError, PrintResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the requested copy count is achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStrategy {
    /// One single-copy invocation per copy
    #[default]
    Loop,
    /// One invocation against a document expanded to one page per copy
    DuplicatePages,
}

impl CopyStrategy {
    /// Pages the rendered document must contain for `copies` copies
    pub fn pages_per_document(self, copies: u32) -> u32 {
        match self {
            CopyStrategy::Loop => 1,
            CopyStrategy::DuplicatePages => copies.max(1),
        }
    }

    /// Executable invocations needed for `copies` copies
    pub fn invocations(self, copies: u32) -> u32 {
        match self {
            CopyStrategy::Loop => copies,
            CopyStrategy::DuplicatePages => 1,
        }
    }
}

impl fmt::Display for CopyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyStrategy::Loop => write!(f, "loop"),
            CopyStrategy::DuplicatePages => write!(f, "nx"),
        }
    }
}

impl FromStr for CopyStrategy {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loop" => Ok(CopyStrategy::Loop),
            "nx" | "duplicate-pages" | "duplicate_pages" => Ok(CopyStrategy::DuplicatePages),
            other => Err(PrintError::InvalidConfig(format!(
                "unknown copies mode: {}",
                other
            ))),
        }
    }
}

/// What to do when one invocation of the loop strategy fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopFailurePolicy {
    /// Stop launching further copies
    #[default]
    StopOnFirst,
    /// Keep launching the remaining copies, then report
    ContinueAll,
}

/// Result of a successful dispatch
///
/// "Successful" means every invocation was launched; whether the pages
/// actually came out of the printer is not tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Executable that was launched
    pub executable: PathBuf,
    /// Number of processes launched
    pub invocations: u32,
    /// Copies sent
    pub copies: u32,
    /// Target printer, `None` for the system default
    pub printer: Option<String>,
}

/// Something that can print a PDF file
pub trait PrintBackend: Send + Sync {
    /// Send `copies` copies of `pdf_path` to `printer` (or the default printer)
    ///
    /// Returns once the work has been handed off, not once paper comes out.
    /// For [`CopyStrategy::DuplicatePages`] the file must already contain one
    /// page per copy.
    fn dispatch(
        &self,
        pdf_path: &Path,
        copies: u32,
        strategy: CopyStrategy,
        printer: Option<&str>,
    ) -> PrintResult<DispatchReport>;
}

impl<T: PrintBackend + ?Sized> PrintBackend for std::sync::Arc<T> {
    fn dispatch(
        &self,
        pdf_path: &Path,
        copies: u32,
        strategy: CopyStrategy,
        printer: Option<&str>,
    ) -> PrintResult<DispatchReport> {
        (**self).dispatch(pdf_path, copies, strategy, printer)
    }
}
