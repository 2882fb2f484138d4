//! Application error handling
//!
//! [`AppError`] is the single error type returned by the label station core.
//! Storage errors and printing errors are folded into it; the shell shows
//! [`AppError::user_message`] to the operator and logs the `Display` form.
//!
//! # Error kinds
//!
//! | Kind | Raised by | Effect |
//! |------|-----------|--------|
//! | DuplicateCode | store insert | record not saved |
//! | DuplicateName | store insert / update | record not saved |
//! | GenerationExhausted | generator | record not created |
//! | NotFound | store lookups | nothing changed |
//! | Print (render) | renderer | job aborted before dispatch |
//! | Print (PrinterNotFound / DispatchFailure) | dispatcher | job failed, PDF still cleaned up |
//! | Abandoned | print worker | caller left before dispatch |

use crate::labels::LabelStorageError;
use label_printer::PrintError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Record errors ==========
    #[error("Label code already exists: {0}")]
    DuplicateCode(String),

    #[error("Material name already exists: {0}")]
    DuplicateName(String),

    #[error("No unique label code after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    #[error("Label not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Access denied")]
    AccessDenied,

    // ========== Printing errors ==========
    #[error(transparent)]
    Print(#[from] PrintError),

    #[error("Print job abandoned before dispatch")]
    Abandoned,

    // ========== System errors ==========
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn not_found(code: impl Into<String>) -> Self {
        AppError::NotFound(code.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidRequest(msg.into())
    }

    /// Message suitable for showing to the operator
    pub fn user_message(&self) -> String {
        match self {
            AppError::DuplicateCode(code) => {
                format!("A label with code {} already exists.", code)
            }
            AppError::DuplicateName(name) => {
                format!("A label named {} already exists.", name)
            }
            AppError::GenerationExhausted { .. } => {
                "Could not generate a unique label code. Please try again.".to_string()
            }
            AppError::NotFound(code) => format!("No label found for \"{}\".", code),
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::AccessDenied => "Incorrect admin password.".to_string(),
            AppError::Abandoned => "The print request was cancelled.".to_string(),
            AppError::Print(e) => print_message(e),
            AppError::Storage(_) | AppError::Task(_) | AppError::Io(_) => {
                format!("Unexpected error: {}", self)
            }
        }
    }
}

fn print_message(e: &PrintError) -> String {
    match e {
        PrintError::PrinterNotFound { searched } => {
            let paths: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
            format!(
                "SumatraPDF was not found. Put SumatraPDF.exe in the assets folder or install it.\nSearched:\n  {}",
                paths.join("\n  ")
            )
        }
        PrintError::DispatchFailure {
            launched,
            requested,
            reason,
        } => format!(
            "{} of {} copies sent. Printing failed: {}",
            launched, requested, reason
        ),
        PrintError::MissingAsset(path) => {
            format!("Label image is missing: {}", path.display())
        }
        PrintError::CorruptAsset { path, .. } => {
            format!("Label image could not be read: {}", path.display())
        }
        PrintError::Pdf(reason) => format!("Could not create the label PDF: {}", reason),
        other => format!("Printing failed: {}", other),
    }
}

impl From<LabelStorageError> for AppError {
    fn from(e: LabelStorageError) -> Self {
        match e {
            LabelStorageError::DuplicateCode(code) => AppError::DuplicateCode(code),
            LabelStorageError::NotFound(code) => AppError::NotFound(code),
            LabelStorageError::DuplicateName(name) => AppError::DuplicateName(name),
            LabelStorageError::MissingName(code) => {
                AppError::InvalidRequest(format!("label {} needs a material name", code))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Task(e.to_string())
    }
}

/// Result type for label station operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_dispatch_message() {
        let err = AppError::from(PrintError::DispatchFailure {
            launched: 3,
            requested: 5,
            reason: "access denied".into(),
        });
        assert_eq!(
            err.user_message(),
            "3 of 5 copies sent. Printing failed: access denied"
        );
    }

    #[test]
    fn test_storage_errors_keep_their_kind() {
        let err = AppError::from(LabelStorageError::DuplicateCode("LBL-1".into()));
        assert!(matches!(err, AppError::DuplicateCode(ref c) if c == "LBL-1"));
        let err = AppError::from(LabelStorageError::NotFound("LBL-2".into()));
        assert!(matches!(err, AppError::NotFound(_)));
        let err = AppError::from(LabelStorageError::DuplicateName("VG0100".into()));
        assert_eq!(err.user_message(), "A label named VG0100 already exists.");
        let err = AppError::from(LabelStorageError::MissingName("LBL-3".into()));
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_printer_not_found_lists_paths() {
        let err = AppError::from(PrintError::PrinterNotFound {
            searched: vec!["assets/SumatraPDF-32.exe".into()],
        });
        assert!(err.user_message().contains("assets/SumatraPDF-32.exe"));
    }
}
