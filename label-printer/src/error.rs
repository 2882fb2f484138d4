//! Error types for the label printer library

use std::path::PathBuf;
use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// A layout asset (banner image) is configured but missing on disk
    #[error("Layout asset missing: {}", .0.display())]
    MissingAsset(PathBuf),

    /// A layout asset exists but could not be decoded
    #[error("Layout asset unreadable: {}: {reason}", .path.display())]
    CorruptAsset { path: PathBuf, reason: String },

    /// The PDF writer failed
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    /// No silent-print executable could be resolved
    #[error("No silent-print executable found (searched {} paths)", .searched.len())]
    PrinterNotFound { searched: Vec<PathBuf> },

    /// The executable was found but launching it failed
    #[error("Print dispatch failed after {launched} of {requested} copies: {reason}")]
    DispatchFailure {
        launched: u32,
        requested: u32,
        reason: String,
    },

    /// IO error while writing spool files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid printer or layout configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Windows-specific printer enumeration error
    #[cfg(windows)]
    #[error("Windows printer error: {0}")]
    WindowsPrinter(String),
}

impl PrintError {
    /// True for errors raised while producing the PDF, before any dispatch
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            PrintError::MissingAsset(_) | PrintError::CorruptAsset { .. } | PrintError::Pdf(_)
        )
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
