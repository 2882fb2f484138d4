mod common;

use common::{RecordingBackend, RecordingLauncher, make_executable, record};
use label_printer::{
    CopyStrategy, ExecutableLocator, LabelRenderer, PrintError, RenderSettings, SumatraBackend,
    SumatraSettings,
};
use label_station::AppError;
use label_station::printing::{
    CleanupScheduler, CleanupStatus, JobState, PrintPipeline, PrintRequest,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn cleanup() -> CleanupScheduler {
    CleanupScheduler::new(Duration::from_millis(200), Duration::from_millis(50))
}

fn locator(root: &Path) -> ExecutableLocator {
    ExecutableLocator::new(root.join("assets"), true).with_system_paths(
        root.join("x86").join("SumatraPDF.exe"),
        root.join("x64").join("SumatraPDF.exe"),
    )
}

fn sumatra_pipeline(root: &Path, launcher: RecordingLauncher) -> PrintPipeline {
    let backend = SumatraBackend::new(locator(root), SumatraSettings::default())
        .with_launcher(launcher);
    let renderer = LabelRenderer::new(RenderSettings::default()).expect("Failed to create renderer");
    PrintPipeline::new(renderer, Arc::new(backend), cleanup(), root.join("spool"))
}

fn spool_files(root: &Path) -> usize {
    std::fs::read_dir(root.join("spool"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_loop_three_copies_three_invocations() {
    let dir = tempfile::tempdir().unwrap();
    make_executable(&dir.path().join("assets").join("SumatraPDF-32.exe"));
    let launcher = RecordingLauncher::default();
    let pipeline = sumatra_pipeline(dir.path(), launcher.clone());

    let request = PrintRequest::new("LBL-1", 3).with_strategy(CopyStrategy::Loop);
    let outcome = pipeline.run(record("LBL-1", "VG0100"), &request).await;

    let report = outcome.result.expect("Print failed");
    assert_eq!(report.invocations, 3);
    assert_eq!(report.copies, 3);
    assert_eq!(outcome.state, JobState::Dispatched);

    let launches = launcher.all();
    assert_eq!(launches.len(), 3);
    assert!(launches.iter().all(|l| l.pages == 1));
    assert!(launches.iter().all(|l| l.args[0] == "-print-to-default"));

    let cleanup = outcome.cleanup.expect("Cleanup not scheduled");
    assert_eq!(cleanup.wait().await, CleanupStatus::CleanedUp);
    assert_eq!(spool_files(dir.path()), 0);
}

#[tokio::test]
async fn test_duplicate_pages_single_invocation() {
    let dir = tempfile::tempdir().unwrap();
    make_executable(&dir.path().join("assets").join("SumatraPDF-32.exe"));
    let launcher = RecordingLauncher::default();
    let pipeline = sumatra_pipeline(dir.path(), launcher.clone());

    let request = PrintRequest::new("LBL-1", 3)
        .with_strategy(CopyStrategy::DuplicatePages)
        .with_printer("Zebra ZD420");
    let outcome = pipeline.run(record("LBL-1", "VG0100"), &request).await;

    let report = outcome.result.expect("Print failed");
    assert_eq!(report.invocations, 1);
    assert_eq!(report.copies, 3);

    let launches = launcher.all();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].pages, 3);
    assert_eq!(launches[0].args[0], "-print-to");
    assert_eq!(launches[0].args[1], "Zebra ZD420");

    outcome.cleanup.unwrap().wait().await;
}

#[tokio::test]
async fn test_resolves_bundled_64bit_when_32bit_missing() {
    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("assets").join("SumatraPDF.exe");
    make_executable(&exe);
    let launcher = RecordingLauncher::default();
    let pipeline = sumatra_pipeline(dir.path(), launcher.clone());

    let outcome = pipeline
        .run(record("LBL-1", "VG0100"), &PrintRequest::new("LBL-1", 1))
        .await;
    assert!(outcome.is_success());
    assert_eq!(launcher.all()[0].program, exe);

    outcome.cleanup.unwrap().wait().await;
}

#[tokio::test]
async fn test_printer_not_found_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = RecordingLauncher::default();
    let pipeline = sumatra_pipeline(dir.path(), launcher.clone());

    // 1. No executable anywhere
    let request = PrintRequest::new("AUTO-0001", 2).with_strategy(CopyStrategy::Loop);
    let outcome = pipeline.run(record("AUTO-0001", "Widget"), &request).await;

    // 2. Fails with PrinterNotFound, nothing launched
    assert!(matches!(
        outcome.result,
        Err(AppError::Print(PrintError::PrinterNotFound { .. }))
    ));
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(launcher.count(), 0);

    // 3. The rendered PDF exists until the scheduled cleanup runs
    let cleanup = outcome.cleanup.expect("Cleanup not scheduled");
    assert!(cleanup.path().exists());
    let path = cleanup.path().to_path_buf();
    assert_eq!(cleanup.wait().await, CleanupStatus::CleanedUp);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_render_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let settings = RenderSettings {
        banner: Some(dir.path().join("assets").join("missing.png")),
        ..Default::default()
    };
    let renderer = LabelRenderer::new(settings).unwrap();
    let pipeline = PrintPipeline::new(renderer, backend.clone(), cleanup(), dir.path().join("spool"));

    let outcome = pipeline
        .run(record("LBL-1", "VG0100"), &PrintRequest::new("LBL-1", 1))
        .await;

    assert!(matches!(
        outcome.result,
        Err(AppError::Print(PrintError::MissingAsset(_)))
    ));
    assert!(outcome.cleanup.is_none());
    assert_eq!(backend.count(), 0);
    assert_eq!(spool_files(dir.path()), 0);
}

#[tokio::test]
async fn test_invalid_copies_rejected_before_render() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let renderer = LabelRenderer::new(RenderSettings::default()).unwrap();
    let pipeline = PrintPipeline::new(renderer, backend.clone(), cleanup(), dir.path().join("spool"));

    let outcome = pipeline
        .run(record("LBL-1", "VG0100"), &PrintRequest::new("LBL-1", 0))
        .await;
    assert!(matches!(outcome.result, Err(AppError::InvalidRequest(_))));
    assert_eq!(backend.count(), 0);
    assert_eq!(spool_files(dir.path()), 0);
}

#[tokio::test]
async fn test_abandoned_job_is_not_dispatched() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let renderer = LabelRenderer::new(RenderSettings::default()).unwrap();
    let pipeline = PrintPipeline::new(renderer, backend.clone(), cleanup(), dir.path().join("spool"));

    let outcome = pipeline
        .run_with(record("LBL-1", "VG0100"), &PrintRequest::new("LBL-1", 1), || false)
        .await;

    assert!(matches!(outcome.result, Err(AppError::Abandoned)));
    assert_eq!(outcome.state, JobState::Abandoned);
    assert_eq!(backend.count(), 0);
    assert_eq!(outcome.cleanup.unwrap().wait().await, CleanupStatus::CleanedUp);
    assert_eq!(spool_files(dir.path()), 0);
}

#[tokio::test]
async fn test_events_follow_state_machine() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::failing());
    let renderer = LabelRenderer::new(RenderSettings::default()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = PrintPipeline::new(renderer, backend.clone(), cleanup(), dir.path().join("spool"))
        .with_events(tx);

    let outcome = pipeline
        .run(record("LBL-1", "VG0100"), &PrintRequest::new("LBL-1", 2))
        .await;
    assert!(matches!(
        outcome.result,
        Err(AppError::Print(PrintError::DispatchFailure { .. }))
    ));
    outcome.cleanup.unwrap().wait().await;

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.job_id, outcome.job_id);
        states.push(event.to);
    }
    assert_eq!(
        states,
        vec![
            JobState::Rendering,
            JobState::Dispatching,
            JobState::Failed,
            JobState::CleanupPending,
            JobState::CleanedUp,
        ]
    );
}

#[tokio::test]
async fn test_default_printer_applied() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let renderer = LabelRenderer::new(RenderSettings::default()).unwrap();
    let pipeline = PrintPipeline::new(renderer, backend.clone(), cleanup(), dir.path().join("spool"))
        .with_default_strategy(CopyStrategy::DuplicatePages)
        .with_default_printer(Some("Label Printer".into()));

    let outcome = pipeline
        .run(record("LBL-1", "VG0100"), &PrintRequest::new("LBL-1", 2))
        .await;
    assert!(outcome.is_success());

    let calls = backend.calls.lock().unwrap().clone();
    assert_eq!(calls[0].printer.as_deref(), Some("Label Printer"));
    assert_eq!(calls[0].strategy, CopyStrategy::DuplicatePages);
    drop(calls);
    outcome.cleanup.unwrap().wait().await;
}
