//! Label Station - label records, silent printing and preview
//!
//! # Architecture
//!
//! - **Labels** (`labels`): record types, redb store, code generator, bulk
//!   import, search normalisation
//! - **Printing** (`printing`): print jobs, render -> dispatch -> cleanup
//!   pipeline, background print worker
//! - **Admin** (`admin`): password gate for editing commands
//! - **Shell** (`cli`): command line front end
//!
//! Rendering, SumatraPDF dispatch and previews live in `label-printer`.
//!
//! # Module layout
//!
//! ```text
//! label-station/src/
//! ├── core/          # configuration, application state
//! ├── labels/        # records, storage, generator, import, search
//! ├── printing/      # jobs, pipeline, cleanup, worker
//! ├── utils/         # errors, logging
//! ├── admin.rs       # admin password gate
//! └── cli.rs         # command line shell
//! ```

pub mod admin;
pub mod cli;
pub mod core;
pub mod labels;
pub mod printing;
pub mod utils;

// Re-export common types
pub use admin::AdminGate;
pub use cli::{Cli, run};
pub use core::{AppState, Config};
pub use labels::{CodeGenerator, LabelFields, LabelRecord, LabelStore, LabelTag};
pub use printing::{JobOutcome, PrintPipeline, PrintQueue, PrintRequest};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env` from the working directory, if there is one
pub fn setup_environment() {
    if let Ok(path) = dotenvy::dotenv() {
        // Logger is not up yet
        eprintln!("Loaded environment from {}", path.display());
    }
}
