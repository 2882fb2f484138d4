//! Application state
//!
//! Built once from [`Config`] at startup; every component gets its settings
//! here instead of reading the environment itself.

use super::config::Config;
use crate::admin::AdminGate;
use crate::labels::{CodeGenerator, LabelStore};
use crate::printing::{CleanupScheduler, PrintPipeline, PrintQueue, PrintWorker};
use crate::utils::AppResult;
use label_printer::{
    LabelRenderer, PdftoppmRasterizer, PrintBackend, Previewer, Rasterizer, SumatraBackend,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: LabelStore,
    pub generator: Arc<CodeGenerator>,
    pub pipeline: Arc<PrintPipeline>,
    pub previewer: Arc<Previewer>,
    pub admin: AdminGate,
}

impl AppState {
    /// Open the store and wire the print pipeline with the production backend
    pub fn initialize(config: &Config) -> AppResult<Self> {
        let backend = SumatraBackend::new(config.executable_locator(), config.sumatra.clone())
            .with_failure_policy(config.failure_policy());
        Self::with_backend(config, Arc::new(backend))
    }

    /// Same as [`initialize`](Self::initialize) with a custom print backend
    pub fn with_backend(config: &Config, backend: Arc<dyn PrintBackend>) -> AppResult<Self> {
        let store = LabelStore::open(config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "Label store opened");

        let renderer = LabelRenderer::new(config.render_settings())?;
        let cleanup = CleanupScheduler::new(config.persist_pdf, config.cleanup_retry);
        let pipeline = PrintPipeline::new(renderer, backend, cleanup, config.spool_dir())
            .with_default_strategy(config.copies_mode)
            .with_default_printer(config.printer_name.clone());

        let rasterizer = config.preview_rasterizer.as_ref().map(|exe| {
            Box::new(PdftoppmRasterizer::new(exe, config.preview_dpi)) as Box<dyn Rasterizer>
        });

        Ok(Self {
            config: config.clone(),
            store,
            generator: Arc::new(CodeGenerator::new(
                config.code_prefix.clone(),
                config.code_max_attempts,
            )),
            pipeline: Arc::new(pipeline),
            previewer: Arc::new(Previewer::new(rasterizer)),
            admin: AdminGate::from_hex(&config.admin_password_hash)?,
        })
    }

    /// Start the background print worker
    pub fn start_print_worker(&self, shutdown: CancellationToken) -> (PrintQueue, JoinHandle<()>) {
        let worker = PrintWorker::new(Arc::clone(&self.pipeline), self.store.clone());
        PrintQueue::spawn(worker, shutdown)
    }
}
