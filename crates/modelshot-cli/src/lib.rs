//! CLI logic for the modelshot tool.
//!
//! [`run`] loads the configuration and the store snapshot, wires the
//! service to the WebDriver renderer and the local asset store, executes
//! one [`Command`] and saves the store again after mutating commands.

pub mod error_adapter;

mod args;
mod commands;
mod config;

pub use args::{Args, Command};

use std::{env, io::Write, path::PathBuf, sync::Arc};

use log::{debug, error, info};

use modelshot::{
    ModelshotError,
    assets::LocalAssetStore,
    config::AppConfig,
    identity::StaticTokens,
    pipeline::ScreenshotPipeline,
    render::WebDriverLauncher,
    service::ContentModelService,
    store::MemoryStore,
    worker::RegenerationWorker,
};

/// Everything a command needs, built from the configuration.
pub(crate) struct Runtime {
    pub(crate) config: AppConfig,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) pipeline: Arc<ScreenshotPipeline>,
    pub(crate) worker: Arc<RegenerationWorker>,
    pub(crate) service: ContentModelService,
    store_path: PathBuf,
}

impl Runtime {
    fn new(config: AppConfig) -> Result<Self, ModelshotError> {
        let store_path = config.store().path().clone();
        let store = Arc::new(MemoryStore::load(&store_path)?);
        let assets = Arc::new(LocalAssetStore::new(config.assets().root().clone()));
        let launcher = Arc::new(WebDriverLauncher::new(config.render().clone()));

        let pipeline = Arc::new(ScreenshotPipeline::new(
            &config,
            launcher,
            assets,
            store.clone(),
        )?);
        let worker = Arc::new(RegenerationWorker::start(pipeline.clone())?);
        let identity = Arc::new(StaticTokens::new(config.access().tokens()));
        let service = ContentModelService::new(&config, store.clone(), worker.clone(), identity)?;

        Ok(Self {
            config,
            store,
            pipeline,
            worker,
            service,
            store_path,
        })
    }

    /// Waits for queued regenerations and writes the store snapshot.
    fn finish(&self) -> Result<(), ModelshotError> {
        self.worker.shutdown();
        self.store.save(&self.store_path)?;
        info!(path:? = self.store_path; "Store saved");
        Ok(())
    }
}

/// Run the modelshot CLI application
///
/// Command output (views, listings, summaries) is written to `out`.
///
/// # Errors
///
/// Returns `ModelshotError` for:
/// - Configuration loading errors
/// - Payload parse errors
/// - Validation, authentication and not-found errors
/// - Store, asset store and browser failures
pub fn run(args: &Args, out: &mut dyn Write) -> Result<(), ModelshotError> {
    debug!(command:? = args.command; "Running command");

    match &args.command {
        Command::CheckModel { path } => return commands::check_model(path, out),
        Command::CheckLayout { path } => return commands::check_layout(path, out),
        _ => {}
    }

    let mut app_config = config::load_config(args.config.as_ref())?;
    config::apply_env_overrides(&mut app_config, |key| env::var(key).ok());
    if let Some(path) = &args.store {
        app_config.store_mut().set_path(path);
    }

    let runtime = Runtime::new(app_config)?;
    let result = commands::execute(&runtime, &args.command, out);

    if !args.command.is_mutating() {
        runtime.worker.shutdown();
        return result;
    }

    // Queued jobs run even when the command failed half-way. The command's
    // own error takes precedence over a failed save.
    match (result, runtime.finish()) {
        (Err(err), Err(save)) => {
            error!(path:? = runtime.store_path, error:% = save; "Failed to save store");
            Err(err)
        }
        (result, saved) => result.and(saved),
    }
}
