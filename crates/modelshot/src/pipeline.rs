//! The screenshot pipeline.
//!
//! One run renders up to three images of a content model and writes the
//! resulting asset references back to the store:
//!
//! ```text
//! AcquireSession -> RenderMeta? -> MeasureDiagram -> RenderDiagramWithConnections
//!     -> RenderDiagramWithoutConnections -> Persist -> Release
//! ```
//!
//! Runs are detached from the mutation that triggered them, so a failing
//! stage is logged and reported in the [`ScreenshotReport`] but never
//! returned as an error. The browser session is released on every path
//! once it was acquired.

use std::{fmt, sync::Arc, thread};

use log::{debug, error, info};

use modelshot_core::{
    asset::{ImageAsset, ImageSlot},
    identifier::ModelId,
    record::{ContentModel, ModelWithLatest},
};

use crate::{
    assets::{AssetStore, UploadTarget},
    config::{AppConfig, RenderConfig},
    error::ModelshotError,
    render::{
        BrowserError, BrowserLauncher, BrowserSession, DIMENSIONS_SCRIPT, DiagramDimensions,
        EmbedMode, RenderTargets, Viewport,
    },
    revision::Regeneration,
    store::Store,
};

/// Which existing assets a run replaces instead of creating new ones.
///
/// Resolved against the record as it is when the run starts, not when it
/// was requested. Replacing an asset keeps its URL stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Every upload creates a new asset.
    Nothing,
    /// The meta image is replaced if the model has one.
    MetaImage,
    /// Every slot that holds an asset is replaced.
    Everything,
}

/// What one pipeline run renders and where uploads go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotOptions {
    pub generate_meta_image: bool,
    pub generate_diagram_images: bool,
    pub overwrite: Overwrite,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            generate_meta_image: true,
            generate_diagram_images: true,
            overwrite: Overwrite::Nothing,
        }
    }
}

impl ScreenshotOptions {
    /// All three images, each created as a new asset.
    pub fn create() -> Self {
        Self::default()
    }

    /// All three images, overwriting whichever slots already hold an asset.
    pub fn refresh() -> Self {
        Self {
            overwrite: Overwrite::Everything,
            ..Self::default()
        }
    }

    /// Only the meta image, overwritten if one exists.
    pub fn meta_only() -> Self {
        Self {
            generate_diagram_images: false,
            overwrite: Overwrite::MetaImage,
            ..Self::default()
        }
    }

    /// The meta image overwritten if one exists, both diagram images created
    /// fresh. Used after a new version was appended.
    pub fn new_version() -> Self {
        Self {
            overwrite: Overwrite::MetaImage,
            ..Self::default()
        }
    }

    /// The run an update classified as `regeneration` asks for, if any.
    pub fn for_regeneration(regeneration: Regeneration) -> Option<Self> {
        match regeneration {
            Regeneration::None => None,
            Regeneration::MetaOnly => Some(Self::meta_only()),
            Regeneration::RefreshInPlace => Some(Self::refresh()),
            Regeneration::NewVersion => Some(Self::new_version()),
        }
    }

    pub fn without_meta_image(mut self) -> Self {
        self.generate_meta_image = false;
        self
    }

    pub fn without_diagram_images(mut self) -> Self {
        self.generate_diagram_images = false;
        self
    }

    /// The asset in `slot` of `record` that the upload replaces.
    fn replaces<'a>(&self, slot: ImageSlot, record: &'a ModelWithLatest) -> Option<&'a ImageAsset> {
        match (self.overwrite, slot) {
            (Overwrite::Nothing, _) => None,
            (_, ImageSlot::Meta) => record.model.meta_image.as_ref(),
            (Overwrite::MetaImage, _) => None,
            (Overwrite::Everything, ImageSlot::Diagram) => record.latest.image.as_ref(),
            (Overwrite::Everything, ImageSlot::DiagramNoConnections) => {
                record.latest.image_no_connections.as_ref()
            }
        }
    }
}

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AcquireSession,
    RenderMeta,
    MeasureDiagram,
    RenderDiagramWithConnections,
    RenderDiagramWithoutConnections,
    Persist,
    Release,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcquireSession => "acquire-session",
            Self::RenderMeta => "render-meta",
            Self::MeasureDiagram => "measure-diagram",
            Self::RenderDiagramWithConnections => "render-diagram",
            Self::RenderDiagramWithoutConnections => "render-diagram-no-connections",
            Self::Persist => "persist",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage a run stopped at and why.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: ModelshotError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T, E: Into<ModelshotError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|err| StageFailure {
            stage,
            error: err.into(),
        })
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct ScreenshotReport {
    /// Stored meta image, if it was rendered.
    pub meta_image: Option<ImageAsset>,
    /// Stored diagram images, if both were rendered and persisted.
    pub images: Option<(ImageAsset, ImageAsset)>,
    /// Stages that ran to completion, in order.
    pub completed: Vec<Stage>,
    pub failure: Option<StageFailure>,
    /// The model was deleted before the run started; nothing was rendered.
    pub skipped: bool,
}

impl ScreenshotReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|failure| failure.stage)
    }

    fn fail(&mut self, failure: StageFailure) {
        error!(stage:% = failure.stage, error:% = failure.error; "Screenshot pipeline aborted");
        // The first failure wins; a later release failure is only logged.
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }
}

/// Renders content model images through a browser and stores them.
pub struct ScreenshotPipeline {
    launcher: Arc<dyn BrowserLauncher>,
    assets: Arc<dyn AssetStore>,
    store: Arc<dyn Store>,
    targets: RenderTargets,
    render: RenderConfig,
    folder_base: String,
}

impl ScreenshotPipeline {
    pub fn new(
        config: &AppConfig,
        launcher: Arc<dyn BrowserLauncher>,
        assets: Arc<dyn AssetStore>,
        store: Arc<dyn Store>,
    ) -> Result<Self, ModelshotError> {
        let targets = RenderTargets::new(
            config.render().frontend_url(),
            config.access().preview_secret().map(str::to_string),
        )?;
        Ok(Self {
            launcher,
            assets,
            store,
            targets,
            render: config.render().clone(),
            folder_base: config.assets().folder_base().trim_end_matches('/').to_string(),
        })
    }

    /// Runs the pipeline for a model and whatever version is latest when
    /// the run starts.
    ///
    /// The record is read again here because queued runs may start long
    /// after the write that requested them. A model deleted in between is
    /// skipped without a browser session.
    pub fn run(&self, model_id: ModelId, options: &ScreenshotOptions) -> ScreenshotReport {
        let mut report = ScreenshotReport::default();
        let target = match self.store.model_with_latest(model_id).at(Stage::AcquireSession) {
            Ok(Some(target)) => target,
            Ok(None) => {
                info!(id:% = model_id; "Content model is gone, skipping screenshots");
                report.skipped = true;
                return report;
            }
            Err(failure) => {
                report.fail(failure);
                return report;
            }
        };

        let slug = target.model.slug.as_str();
        info!(
            slug,
            version = target.latest.number,
            meta = options.generate_meta_image,
            diagrams = options.generate_diagram_images,
            overwrite:? = options.overwrite;
            "Screenshot pipeline started"
        );

        let mut session = match self.launcher.launch().at(Stage::AcquireSession) {
            Ok(session) => session,
            Err(failure) => {
                report.fail(failure);
                return report;
            }
        };
        report.completed.push(Stage::AcquireSession);

        if let Err(failure) = self.render_all(session.as_mut(), &target, options, &mut report) {
            report.fail(failure);
        }

        match session.release().at(Stage::Release) {
            Ok(()) => report.completed.push(Stage::Release),
            Err(failure) => report.fail(failure),
        }

        if report.is_success() {
            info!(slug; "Screenshot pipeline finished");
        }
        report
    }

    fn render_all(
        &self,
        session: &mut dyn BrowserSession,
        target: &ModelWithLatest,
        options: &ScreenshotOptions,
        report: &mut ScreenshotReport,
    ) -> Result<(), StageFailure> {
        let ModelWithLatest { model, latest } = target;

        if options.generate_meta_image {
            let asset = self
                .render_meta(session, model, options.replaces(ImageSlot::Meta, target))
                .at(Stage::RenderMeta)?;
            report.meta_image = Some(asset);
            report.completed.push(Stage::RenderMeta);
        } else {
            debug!(slug = model.slug.as_str(); "Skipping meta image");
        }

        if !options.generate_diagram_images {
            debug!(slug = model.slug.as_str(); "Skipping diagram images");
            return Ok(());
        }

        let viewport = self.measure(session, model).at(Stage::MeasureDiagram)?;
        report.completed.push(Stage::MeasureDiagram);

        let image = self
            .render_diagram(session, target, options, EmbedMode::WithConnections, viewport)
            .at(Stage::RenderDiagramWithConnections)?;
        report.completed.push(Stage::RenderDiagramWithConnections);

        let no_connections = self
            .render_diagram(session, target, options, EmbedMode::WithoutConnections, viewport)
            .at(Stage::RenderDiagramWithoutConnections)?;
        report.completed.push(Stage::RenderDiagramWithoutConnections);

        self.store
            .set_version_images(latest.id, image.clone(), no_connections.clone())
            .at(Stage::Persist)?;
        info!(slug = model.slug.as_str(), version = latest.number; "Stored diagram images");
        report.images = Some((image, no_connections));
        report.completed.push(Stage::Persist);
        Ok(())
    }

    fn render_meta(
        &self,
        session: &mut dyn BrowserSession,
        model: &ContentModel,
        replaces: Option<&ImageAsset>,
    ) -> Result<ImageAsset, ModelshotError> {
        let url = self.targets.preview_image(&model.slug, model.visibility)?;
        session.open_page(Viewport::META)?;
        session.navigate(&url)?;
        session.wait_for_selector(self.render.ready_selector(), self.render.navigation_timeout())?;
        let bytes = session.screenshot()?;
        session.close_page()?;

        let asset = self.upload(&bytes, model, replaces)?;
        self.store.set_meta_image(model.id, asset.clone())?;
        info!(slug = model.slug.as_str(), public_id = asset.public_id.as_str(); "Stored meta image");
        Ok(asset)
    }

    /// Polls the embed page for its computed dimensions and opens a fresh
    /// page sized to fit them.
    fn measure(
        &self,
        session: &mut dyn BrowserSession,
        model: &ContentModel,
    ) -> Result<Viewport, ModelshotError> {
        let url = self
            .targets
            .embed(&model.slug, model.visibility, EmbedMode::Measure)?;
        session.open_page(Viewport::META)?;
        session.navigate(&url)?;

        let attempts = self.render.max_poll_attempts();
        let mut dimensions = None;
        for attempt in 1..=attempts {
            let value = session.evaluate(DIMENSIONS_SCRIPT)?;
            if let Some(found) = DiagramDimensions::from_script_value(value)? {
                debug!(attempt, width = found.total_width, height = found.total_height; "Diagram measured");
                dimensions = Some(found);
                break;
            }
            if attempt < attempts {
                thread::sleep(self.render.poll_interval());
            }
        }
        let dimensions = dimensions.ok_or_else(|| BrowserError::Timeout {
            waited: self.render.poll_interval() * attempts,
            what: "diagram dimensions".to_string(),
        })?;

        let viewport = dimensions.viewport(
            self.render.diagram_padding(),
            self.render.device_scale_factor(),
        );
        session.close_page()?;
        session.open_page(viewport)?;
        Ok(viewport)
    }

    fn render_diagram(
        &self,
        session: &mut dyn BrowserSession,
        target: &ModelWithLatest,
        options: &ScreenshotOptions,
        mode: EmbedMode,
        viewport: Viewport,
    ) -> Result<ImageAsset, ModelshotError> {
        let model = &target.model;
        let slot = match mode {
            EmbedMode::WithoutConnections => ImageSlot::DiagramNoConnections,
            _ => ImageSlot::Diagram,
        };

        let url = self.targets.embed(&model.slug, model.visibility, mode)?;
        session.navigate(&url)?;
        session.wait_for_selector(self.render.ready_selector(), self.render.navigation_timeout())?;
        let bytes = session.screenshot()?;
        if mode == EmbedMode::WithoutConnections {
            session.close_page()?;
        }

        debug!(slot:% = slot, viewport:% = viewport, bytes = bytes.len(); "Captured diagram");
        self.upload(&bytes, model, options.replaces(slot, target))
    }

    fn upload(
        &self,
        bytes: &[u8],
        model: &ContentModel,
        replaces: Option<&ImageAsset>,
    ) -> Result<ImageAsset, ModelshotError> {
        let folder = format!("{}/{}", self.folder_base, model.slug);
        let target = UploadTarget::overwrite_or_create(
            replaces.map(|asset| asset.public_id.as_str()),
            folder,
        );
        Ok(self.assets.upload(bytes, &target)?.into_asset(replaces))
    }
}
