use crate::admin::DEFAULT_ADMIN_PASSWORD_HASH;
use crate::labels::generator::{DEFAULT_CODE_PREFIX, DEFAULT_MAX_ATTEMPTS};
use label_printer::{
    CopyStrategy, ExecutableLocator, HostPaper, HostScale, HostWrap, LabelLayout,
    LoopFailurePolicy, Orientation, PageScale, RenderSettings, SumatraSettings,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Label station configuration
///
/// # Environment variables
///
/// Every value can be overridden from the environment (or a `.env` file):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | . | data directory (database, spool, default assets) |
/// | ASSETS_DIR | $WORK_DIR/assets | bundled SumatraPDF, banner image |
/// | BANNER_FILE | unset | banner image, relative to ASSETS_DIR |
/// | LABEL_WIDTH_IN | 4 | label width (inches) |
/// | LABEL_HEIGHT_IN | 6 | label height (inches) |
/// | LABEL_MARGIN_IN | 0.25 | label margin (inches) |
/// | HOST_PAPER | Letter | Letter, A4 or none (print at label size) |
/// | HOST_SCALE | fit | fit or noscale |
/// | SUMATRA_32BIT_FIRST | true | try 32-bit SumatraPDF before 64-bit |
/// | SUMATRA_PAPER | Letter | `-print-settings` paper, empty to omit |
/// | SUMATRA_ORIENTATION | portrait | portrait, landscape or none |
/// | SUMATRA_SCALE | noscale | noscale, fit, shrink or none |
/// | PRINTER_NAME | unset | target printer (default printer when unset) |
/// | COPIES_MODE | loop | loop or nx |
/// | STOP_ON_FIRST_FAILURE | true | loop mode stops at the first failed copy |
/// | PERSIST_PDF_SECONDS | 25 | delay before the temp PDF is removed |
/// | CLEANUP_RETRY_SECONDS | 60 | delay before a failed removal is retried |
/// | CODE_PREFIX | LBL | generated code prefix |
/// | CODE_MAX_ATTEMPTS | 5 | code generation retry bound |
/// | PREVIEW_RASTERIZER | pdftoppm | rasterizer executable, none to disable |
/// | PREVIEW_DPI | 96 | preview resolution |
/// | ADMIN_PASSWORD_HASH | built-in | SHA-256 hex of the admin password |
/// | LOG_LEVEL | info | log level |
/// | LOG_DIR | unset | daily log files directory |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=C:\labels COPIES_MODE=nx label-station print LBL-20240315093012345-0042 -n 3
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory: database, spool files
    pub work_dir: PathBuf,
    /// Bundled executables and images
    pub assets_dir: PathBuf,
    /// Banner file name inside `assets_dir`
    pub banner_file: Option<String>,
    pub label: LabelLayout,
    /// `None` prints at label size
    pub host: Option<HostWrap>,
    pub sumatra_32bit_first: bool,
    pub sumatra: SumatraSettings,
    pub printer_name: Option<String>,
    pub copies_mode: CopyStrategy,
    pub stop_on_first_failure: bool,
    pub persist_pdf: Duration,
    pub cleanup_retry: Duration,
    pub code_prefix: String,
    pub code_max_attempts: u32,
    /// `None` disables previews
    pub preview_rasterizer: Option<PathBuf>,
    pub preview_dpi: u32,
    pub admin_password_hash: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let work_dir = PathBuf::from(env_string("WORK_DIR").unwrap_or_else(|| ".".into()));
        let assets_dir = env_string("ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| work_dir.join("assets"));

        let defaults = LabelLayout::default();
        let label = LabelLayout {
            width_in: env_parse("LABEL_WIDTH_IN").unwrap_or(defaults.width_in),
            height_in: env_parse("LABEL_HEIGHT_IN").unwrap_or(defaults.height_in),
            margin_in: env_parse("LABEL_MARGIN_IN").unwrap_or(defaults.margin_in),
        };

        let host = match env_string("HOST_PAPER") {
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            paper => Some(HostWrap {
                paper: paper
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(HostPaper::Letter),
                scale: env_parse("HOST_SCALE").unwrap_or(HostScale::Fit),
            }),
        };

        let sumatra = SumatraSettings {
            paper: match std::env::var("SUMATRA_PAPER") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v.trim().to_string()),
                Err(_) => Some("Letter".to_string()),
            },
            orientation: env_optional("SUMATRA_ORIENTATION", Orientation::Portrait),
            scale: env_optional("SUMATRA_SCALE", PageScale::NoScale),
        };

        Self {
            work_dir,
            assets_dir,
            banner_file: env_string("BANNER_FILE"),
            label,
            host,
            sumatra_32bit_first: env_parse("SUMATRA_32BIT_FIRST").unwrap_or(true),
            sumatra,
            printer_name: env_string("PRINTER_NAME"),
            copies_mode: env_parse("COPIES_MODE").unwrap_or_default(),
            stop_on_first_failure: env_parse("STOP_ON_FIRST_FAILURE").unwrap_or(true),
            persist_pdf: Duration::from_secs(env_parse("PERSIST_PDF_SECONDS").unwrap_or(25)),
            cleanup_retry: Duration::from_secs(env_parse("CLEANUP_RETRY_SECONDS").unwrap_or(60)),
            code_prefix: env_string("CODE_PREFIX").unwrap_or_else(|| DEFAULT_CODE_PREFIX.into()),
            code_max_attempts: env_parse("CODE_MAX_ATTEMPTS").unwrap_or(DEFAULT_MAX_ATTEMPTS),
            preview_rasterizer: match env_string("PREVIEW_RASTERIZER") {
                Some(v) if v.eq_ignore_ascii_case("none") => None,
                Some(v) => Some(PathBuf::from(v)),
                None => Some(PathBuf::from("pdftoppm")),
            },
            preview_dpi: env_parse("PREVIEW_DPI").unwrap_or(96),
            admin_password_hash: env_string("ADMIN_PASSWORD_HASH")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD_HASH.into()),
            log_level: env_string("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: env_string("LOG_DIR").map(PathBuf::from),
        }
    }

    /// Environment configuration with a different working directory
    ///
    /// The assets directory follows the working directory. Mostly for tests.
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.assets_dir = config.work_dir.join("assets");
        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.work_dir.join("labels.redb")
    }

    /// Where rendered PDFs are written until cleanup
    pub fn spool_dir(&self) -> PathBuf {
        self.work_dir.join("spool")
    }

    pub fn banner_path(&self) -> Option<PathBuf> {
        self.banner_file
            .as_deref()
            .map(|name| resolve_in(&self.assets_dir, name))
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            layout: self.label,
            host: self.host,
            banner: self.banner_path(),
        }
    }

    pub fn executable_locator(&self) -> ExecutableLocator {
        ExecutableLocator::new(&self.assets_dir, self.sumatra_32bit_first)
    }

    pub fn failure_policy(&self) -> LoopFailurePolicy {
        if self.stop_on_first_failure {
            LoopFailurePolicy::StopOnFirst
        } else {
            LoopFailurePolicy::ContinueAll
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn resolve_in(dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// `none` unsets the value, anything unparsable keeps the default
fn env_optional<T: FromStr>(key: &str, default: T) -> Option<T> {
    match env_string(key) {
        Some(v) if v.eq_ignore_ascii_case("none") => None,
        Some(v) => Some(v.parse().unwrap_or(default)),
        None => Some(default),
    }
}
