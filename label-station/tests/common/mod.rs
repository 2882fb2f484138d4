#![allow(dead_code)]

use label_printer::{
    CopyStrategy, DispatchReport, Launcher, PrintBackend, PrintError, PrintResult,
};
use label_station::{LabelFields, LabelRecord};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn record(code: &str, name: &str) -> LabelRecord {
    let mut fields = LabelFields::new();
    fields.set("name", name);
    fields.set("description", "Integration test label");
    LabelRecord {
        code: code.to_string(),
        created_at: 1_710_000_000_000,
        fields,
    }
}

pub fn make_executable(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"stub").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// One launcher call: program, arguments and the page count of the PDF argument
#[derive(Debug, Clone)]
pub struct Launch {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub pages: usize,
}

/// Records launches instead of starting processes
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    pub launches: Arc<Mutex<Vec<Launch>>>,
}

impl RecordingLauncher {
    pub fn count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, program: &Path, args: &[OsString]) -> std::io::Result<()> {
        let pages = args
            .iter()
            .map(Path::new)
            .find(|p| p.extension().is_some_and(|e| e == "pdf"))
            .and_then(|p| lopdf::Document::load(p).ok())
            .map(|doc| doc.get_pages().len())
            .unwrap_or(0);
        self.launches.lock().unwrap().push(Launch {
            program: program.to_path_buf(),
            args: args.to_vec(),
            pages,
        });
        Ok(())
    }
}

/// One dispatch call seen by [`RecordingBackend`]
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub pdf_path: PathBuf,
    pub copies: u32,
    pub strategy: CopyStrategy,
    pub printer: Option<String>,
}

/// Print backend double: records calls, optionally fails
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<Dispatch>>,
    pub fail: bool,
}

impl RecordingBackend {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PrintBackend for RecordingBackend {
    fn dispatch(
        &self,
        pdf_path: &Path,
        copies: u32,
        strategy: CopyStrategy,
        printer: Option<&str>,
    ) -> PrintResult<DispatchReport> {
        self.calls.lock().unwrap().push(Dispatch {
            pdf_path: pdf_path.to_path_buf(),
            copies,
            strategy,
            printer: printer.map(str::to_string),
        });
        if self.fail {
            return Err(PrintError::DispatchFailure {
                launched: 0,
                requested: copies,
                reason: "printer offline".to_string(),
            });
        }
        Ok(DispatchReport {
            executable: PathBuf::from("recording"),
            invocations: strategy.invocations(copies),
            copies,
            printer: printer.map(str::to_string),
        })
    }
}
