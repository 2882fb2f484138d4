//! Silent printing through SumatraPDF
//!
//! SumatraPDF prints a PDF without showing a window when started with
//! `-silent -exit-on-print`. The executable is looked up in a fixed order
//! (bundled portable copies first, then the installer locations) and started
//! as a detached background process; the call returns as soon as the process
//! is running.

use crate::backend::{CopyStrategy, DispatchReport, LoopFailurePolicy, PrintBackend};
use crate::error::{PrintError, PrintResult};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Portable 32-bit build shipped next to the application
pub const BUNDLED_32BIT: &str = "SumatraPDF-32.exe";
/// Portable 64-bit build shipped next to the application
pub const BUNDLED_64BIT: &str = "SumatraPDF.exe";
pub const SYSTEM_32BIT: &str = r"C:\Program Files (x86)\SumatraPDF\SumatraPDF.exe";
pub const SYSTEM_64BIT: &str = r"C:\Program Files\SumatraPDF\SumatraPDF.exe";

// ========== Executable resolution ==========

/// Finds a usable SumatraPDF executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableLocator {
    bundled_dir: PathBuf,
    system_32bit: PathBuf,
    system_64bit: PathBuf,
    prefer_32bit: bool,
}

impl ExecutableLocator {
    /// Look for bundled copies in `bundled_dir`, then in the installer paths
    pub fn new(bundled_dir: impl Into<PathBuf>, prefer_32bit: bool) -> Self {
        Self {
            bundled_dir: bundled_dir.into(),
            system_32bit: PathBuf::from(SYSTEM_32BIT),
            system_64bit: PathBuf::from(SYSTEM_64BIT),
            prefer_32bit,
        }
    }

    /// Override the installer locations
    pub fn with_system_paths(
        mut self,
        system_32bit: impl Into<PathBuf>,
        system_64bit: impl Into<PathBuf>,
    ) -> Self {
        self.system_32bit = system_32bit.into();
        self.system_64bit = system_64bit.into();
        self
    }

    /// Search order: bundled pair, then system pair, each ordered by preference
    pub fn candidates(&self) -> Vec<PathBuf> {
        let bundled_32 = self.bundled_dir.join(BUNDLED_32BIT);
        let bundled_64 = self.bundled_dir.join(BUNDLED_64BIT);
        if self.prefer_32bit {
            vec![
                bundled_32,
                bundled_64,
                self.system_32bit.clone(),
                self.system_64bit.clone(),
            ]
        } else {
            vec![
                bundled_64,
                bundled_32,
                self.system_64bit.clone(),
                self.system_32bit.clone(),
            ]
        }
    }

    /// First candidate that is an existing executable file
    pub fn resolve(&self) -> PrintResult<PathBuf> {
        let candidates = self.candidates();
        for path in &candidates {
            if is_executable_file(path) {
                debug!(path = %path.display(), "resolved print executable");
                return Ok(path.clone());
            }
        }
        warn!(searched = candidates.len(), "no print executable found");
        Err(PrintError::PrinterNotFound {
            searched: candidates,
        })
    }
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

// ========== Print settings ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(PrintError::InvalidConfig(format!(
                "unknown orientation: {}",
                other
            ))),
        }
    }
}

/// How SumatraPDF scales pages onto the paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageScale {
    NoScale,
    Fit,
    Shrink,
}

impl FromStr for PageScale {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "noscale" => Ok(PageScale::NoScale),
            "fit" => Ok(PageScale::Fit),
            "shrink" => Ok(PageScale::Shrink),
            other => Err(PrintError::InvalidConfig(format!(
                "unknown page scale: {}",
                other
            ))),
        }
    }
}

/// Values passed through `-print-settings`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumatraSettings {
    pub paper: Option<String>,
    pub orientation: Option<Orientation>,
    pub scale: Option<PageScale>,
}

impl Default for SumatraSettings {
    fn default() -> Self {
        Self {
            paper: Some("Letter".to_string()),
            orientation: Some(Orientation::Portrait),
            scale: Some(PageScale::NoScale),
        }
    }
}

impl SumatraSettings {
    /// Comma separated `-print-settings` value, `None` when nothing is set
    pub fn print_settings(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(paper) = self.paper.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            parts.push(format!("paper={}", paper));
        }
        if let Some(orientation) = self.orientation {
            parts.push(
                match orientation {
                    Orientation::Portrait => "portrait",
                    Orientation::Landscape => "landscape",
                }
                .to_string(),
            );
        }
        if let Some(scale) = self.scale {
            parts.push(
                match scale {
                    PageScale::NoScale => "noscale",
                    PageScale::Fit => "fit",
                    PageScale::Shrink => "shrink",
                }
                .to_string(),
            );
        }
        (!parts.is_empty()).then(|| parts.join(","))
    }
}

// ========== Process launching ==========

/// Starts an external program without waiting for it
pub trait Launcher: Send + Sync {
    fn launch(&self, program: &Path, args: &[OsString]) -> std::io::Result<()>;
}

/// Spawns a hidden, detached child process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

impl Launcher for ProcessLauncher {
    fn launch(&self, program: &Path, args: &[OsString]) -> std::io::Result<()> {
        use std::process::{Command, Stdio};

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn()?;
        let pid = child.id();
        debug!(pid, program = %program.display(), "print process launched");

        // Reap in the background so the caller never waits on the printer
        std::thread::spawn(move || match child.wait() {
            Ok(status) => debug!(pid, %status, "print process exited"),
            Err(e) => warn!(pid, error = %e, "print process wait failed"),
        });
        Ok(())
    }
}

// ========== Backend ==========

/// [`PrintBackend`] that drives SumatraPDF
#[derive(Debug, Clone)]
pub struct SumatraBackend<L = ProcessLauncher> {
    locator: ExecutableLocator,
    settings: SumatraSettings,
    policy: LoopFailurePolicy,
    launcher: L,
}

impl SumatraBackend<ProcessLauncher> {
    pub fn new(locator: ExecutableLocator, settings: SumatraSettings) -> Self {
        Self {
            locator,
            settings,
            policy: LoopFailurePolicy::default(),
            launcher: ProcessLauncher,
        }
    }
}

impl<L: Launcher> SumatraBackend<L> {
    /// Replace the process launcher
    pub fn with_launcher<M: Launcher>(self, launcher: M) -> SumatraBackend<M> {
        SumatraBackend {
            locator: self.locator,
            settings: self.settings,
            policy: self.policy,
            launcher,
        }
    }

    pub fn with_failure_policy(mut self, policy: LoopFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn locator(&self) -> &ExecutableLocator {
        &self.locator
    }

    /// Arguments for one single-document invocation
    pub fn command_args(&self, pdf_path: &Path, printer: Option<&str>) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(8);
        match printer.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => {
                args.push("-print-to".into());
                args.push(name.into());
            }
            None => args.push("-print-to-default".into()),
        }
        if let Some(settings) = self.settings.print_settings() {
            args.push("-print-settings".into());
            args.push(settings.into());
        }
        args.push(pdf_path.as_os_str().to_owned());
        args.push("-silent".into());
        args.push("-exit-on-print".into());
        args
    }
}

impl<L: Launcher> PrintBackend for SumatraBackend<L> {
    #[instrument(skip(self), fields(pdf = %pdf_path.display()))]
    fn dispatch(
        &self,
        pdf_path: &Path,
        copies: u32,
        strategy: CopyStrategy,
        printer: Option<&str>,
    ) -> PrintResult<DispatchReport> {
        if copies == 0 {
            return Err(PrintError::InvalidConfig(
                "copies must be at least 1".to_string(),
            ));
        }

        let executable = self.locator.resolve()?;
        if !pdf_path.is_file() {
            return Err(PrintError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("rendered PDF missing: {}", pdf_path.display()),
            )));
        }

        let args = self.command_args(pdf_path, printer);
        let invocations = strategy.invocations(copies);
        info!(
            executable = %executable.display(),
            %strategy,
            copies,
            invocations,
            printer = printer.unwrap_or("(system default)"),
            "Dispatching print job"
        );

        let mut launched = 0;
        let mut first_error: Option<String> = None;
        for attempt in 1..=invocations {
            match self.launcher.launch(&executable, &args) {
                Ok(()) => launched += 1,
                Err(e) => {
                    warn!(attempt, invocations, error = %e, "print invocation failed");
                    first_error.get_or_insert_with(|| e.to_string());
                    if strategy == CopyStrategy::DuplicatePages
                        || self.policy == LoopFailurePolicy::StopOnFirst
                    {
                        break;
                    }
                }
            }
        }

        let copies_sent = match strategy {
            CopyStrategy::Loop => launched,
            CopyStrategy::DuplicatePages if launched == 1 => copies,
            CopyStrategy::DuplicatePages => 0,
        };

        if let Some(reason) = first_error {
            return Err(PrintError::DispatchFailure {
                launched: copies_sent,
                requested: copies,
                reason,
            });
        }

        Ok(DispatchReport {
            executable,
            invocations: launched,
            copies: copies_sent,
            printer: printer.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        calls: Mutex<Vec<Vec<OsString>>>,
        fail_on: Vec<usize>,
    }

    impl Launcher for RecordingLauncher {
        fn launch(&self, _program: &Path, args: &[OsString]) -> std::io::Result<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(args.to_vec());
            if self.fail_on.contains(&calls.len()) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "access denied",
                ));
            }
            Ok(())
        }
    }

    fn make_executable(path: &Path) {
        std::fs::write(path, b"stub").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    fn locator(dir: &Path, prefer_32bit: bool) -> ExecutableLocator {
        ExecutableLocator::new(dir.join("assets"), prefer_32bit).with_system_paths(
            dir.join("x86").join("SumatraPDF.exe"),
            dir.join("x64").join("SumatraPDF.exe"),
        )
    }

    #[test]
    fn test_candidate_order_flips_with_preference() {
        let l32 = ExecutableLocator::new("assets", true);
        let l64 = ExecutableLocator::new("assets", false);
        assert_eq!(
            l32.candidates(),
            vec![
                PathBuf::from("assets").join(BUNDLED_32BIT),
                PathBuf::from("assets").join(BUNDLED_64BIT),
                PathBuf::from(SYSTEM_32BIT),
                PathBuf::from(SYSTEM_64BIT),
            ]
        );
        assert_eq!(l64.candidates()[0], PathBuf::from("assets").join(BUNDLED_64BIT));
        assert_eq!(l64.candidates()[2], PathBuf::from(SYSTEM_64BIT));
    }

    #[test]
    fn test_resolve_falls_through_to_bundled_64bit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        let exe = dir.path().join("assets").join(BUNDLED_64BIT);
        make_executable(&exe);

        assert_eq!(locator(dir.path(), true).resolve().unwrap(), exe);
    }

    #[test]
    fn test_resolve_prefers_system_over_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("x64")).unwrap();
        let exe = dir.path().join("x64").join("SumatraPDF.exe");
        make_executable(&exe);

        assert_eq!(locator(dir.path(), true).resolve().unwrap(), exe);
    }

    #[test]
    fn test_resolve_none_is_printer_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match locator(dir.path(), true).resolve() {
            Err(PrintError::PrinterNotFound { searched }) => assert_eq!(searched.len(), 4),
            other => panic!("expected PrinterNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_is_not_an_executable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets").join(BUNDLED_32BIT)).unwrap();
        assert!(locator(dir.path(), true).resolve().is_err());
    }

    #[test]
    fn test_print_settings_string() {
        assert_eq!(
            SumatraSettings::default().print_settings().as_deref(),
            Some("paper=Letter,portrait,noscale")
        );
        let empty = SumatraSettings {
            paper: None,
            orientation: None,
            scale: None,
        };
        assert_eq!(empty.print_settings(), None);
    }

    #[test]
    fn test_command_args() {
        let backend = SumatraBackend::new(ExecutableLocator::new("assets", true), SumatraSettings::default());
        let args = backend.command_args(Path::new("job.pdf"), Some("Zebra ZD420"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-print-to",
                "Zebra ZD420",
                "-print-settings",
                "paper=Letter,portrait,noscale",
                "job.pdf",
                "-silent",
                "-exit-on-print",
            ]
        );

        let default_args = backend.command_args(Path::new("job.pdf"), Some("  "));
        assert_eq!(default_args[0], OsString::from("-print-to-default"));
    }

    fn setup(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        make_executable(&dir.join("assets").join(BUNDLED_32BIT));
        let pdf = dir.join("job.pdf");
        std::fs::write(&pdf, b"%PDF-1.5").unwrap();
        pdf
    }

    #[test]
    fn test_loop_invokes_once_per_copy() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = setup(dir.path());
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_launcher(RecordingLauncher::default());

        let report = backend.dispatch(&pdf, 3, CopyStrategy::Loop, None).unwrap();
        assert_eq!(report.invocations, 3);
        assert_eq!(report.copies, 3);
        assert_eq!(backend.launcher.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_pages_invokes_once() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = setup(dir.path());
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_launcher(RecordingLauncher::default());

        let report = backend
            .dispatch(&pdf, 3, CopyStrategy::DuplicatePages, Some("Label Printer"))
            .unwrap();
        assert_eq!(report.invocations, 1);
        assert_eq!(report.copies, 3);
        assert_eq!(report.printer.as_deref(), Some("Label Printer"));
        assert_eq!(backend.launcher.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_loop_stops_on_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = setup(dir.path());
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_launcher(RecordingLauncher {
                fail_on: vec![3],
                ..Default::default()
            });

        match backend.dispatch(&pdf, 5, CopyStrategy::Loop, None) {
            Err(PrintError::DispatchFailure { launched, requested, .. }) => {
                assert_eq!((launched, requested), (2, 5));
            }
            other => panic!("expected DispatchFailure, got {:?}", other),
        }
        assert_eq!(backend.launcher.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_loop_continue_all_reports_partial() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = setup(dir.path());
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_failure_policy(LoopFailurePolicy::ContinueAll)
            .with_launcher(RecordingLauncher {
                fail_on: vec![2, 4],
                ..Default::default()
            });

        match backend.dispatch(&pdf, 5, CopyStrategy::Loop, None) {
            Err(PrintError::DispatchFailure { launched, requested, .. }) => {
                assert_eq!((launched, requested), (3, 5));
            }
            other => panic!("expected DispatchFailure, got {:?}", other),
        }
        assert_eq!(backend.launcher.calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_duplicate_pages_failure_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = setup(dir.path());
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_launcher(RecordingLauncher {
                fail_on: vec![1],
                ..Default::default()
            });

        match backend.dispatch(&pdf, 4, CopyStrategy::DuplicatePages, None) {
            Err(PrintError::DispatchFailure { launched, requested, .. }) => {
                assert_eq!((launched, requested), (0, 4));
            }
            other => panic!("expected DispatchFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_executable_launches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("job.pdf");
        std::fs::write(&pdf, b"%PDF-1.5").unwrap();
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_launcher(RecordingLauncher::default());

        assert!(matches!(
            backend.dispatch(&pdf, 2, CopyStrategy::Loop, None),
            Err(PrintError::PrinterNotFound { .. })
        ));
        assert!(backend.launcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_copies_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = setup(dir.path());
        let backend = SumatraBackend::new(locator(dir.path(), true), SumatraSettings::default())
            .with_launcher(RecordingLauncher::default());
        assert!(matches!(
            backend.dispatch(&pdf, 0, CopyStrategy::Loop, None),
            Err(PrintError::InvalidConfig(_))
        ));
    }
}
