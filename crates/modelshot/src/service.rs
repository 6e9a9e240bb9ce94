//! Content model operations.
//!
//! [`ContentModelService`] validates input, applies the version diff engine,
//! writes through the [`Store`] and hands image regeneration to a
//! [`RegenerationQueue`]. Mutations return as soon as the write is done; the
//! images of the returned view may still be missing or stale.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use serde_json::Value;

use modelshot_core::{
    graph::ContentGraph,
    identifier::{ModelId, Slug, UserId, VersionId},
    layout::Layout,
    record::{ContentModel, ModelWithLatest, Version},
    visibility::Visibility,
};

use crate::{
    access::{AccessPolicy, Viewer},
    assets::AssetUrls,
    config::AppConfig,
    error::ModelshotError,
    identity::IdentityResolver,
    pipeline::ScreenshotOptions,
    revision::{ProposedChange, VersionAction, classify, trimmed},
    store::{DEFAULT_PAGE_SIZE, ListQuery, ModelUpdate, Page, Store, StoreError, VersionWrite},
    view::{ContentModelSummary, ContentModelView, PageView},
    worker::{RegenerationJob, RegenerationQueue},
};

/// Attempts at drawing a slug that is not taken yet.
const SLUG_ATTEMPTS: usize = 8;

/// A model or layout payload as received from a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// JSON text. Parse errors point into it.
    Text(String),
    /// An already decoded JSON value.
    Json(Value),
}

impl RawPayload {
    fn source(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }

    pub fn parse_graph(&self) -> Result<ContentGraph, ModelshotError> {
        let parsed = match self {
            Self::Text(text) => modelshot_parser::parse_content_model(text),
            Self::Json(value) => modelshot_parser::parse_content_model(value),
        };
        parsed.map_err(|err| ModelshotError::new_parse_error(err, self.source()))
    }

    pub fn parse_layout(&self) -> Result<Layout, ModelshotError> {
        let parsed = match self {
            Self::Text(text) => modelshot_parser::parse_layout(text),
            Self::Json(value) => modelshot_parser::parse_layout(value),
        };
        parsed.map_err(|err| ModelshotError::new_parse_error(err, self.source()))
    }
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub title: String,
    pub description: String,
    pub model: RawPayload,
    pub layout: RawPayload,
    /// PUBLIC when not given.
    pub visibility: Option<Visibility>,
}

/// A partial update. Absent and blank fields are left unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub id: ModelId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub model: Option<RawPayload>,
    pub layout: Option<RawPayload>,
}

impl UpdateRequest {
    pub fn new(id: ModelId) -> Self {
        Self {
            id,
            title: None,
            description: None,
            visibility: None,
            model: None,
            layout: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub page: Option<u32>,
    pub count: Option<u32>,
    pub search: Option<String>,
    pub owner: Option<UserId>,
    pub visibility: Option<Visibility>,
}

/// Whether a maintenance backfill may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceMode {
    Off,
    /// Regenerate the images of the `limit` most recently created models.
    Backfill { limit: usize },
}

/// Entry point for every content model operation.
pub struct ContentModelService {
    store: Arc<dyn Store>,
    queue: Arc<dyn RegenerationQueue>,
    identity: Arc<dyn IdentityResolver>,
    access: AccessPolicy,
    urls: AssetUrls,
}

impl ContentModelService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        queue: Arc<dyn RegenerationQueue>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Result<Self, ModelshotError> {
        Ok(Self {
            store,
            queue,
            identity,
            access: AccessPolicy::new(config.access().preview_secret().map(str::to_string)),
            urls: AssetUrls::new(config.assets().base_url())?,
        })
    }

    /// Builds the viewer of a request from its optional bearer token and
    /// preview secret. Unknown tokens yield an anonymous viewer.
    pub fn viewer(&self, token: Option<&str>, preview_secret: Option<&str>) -> Viewer {
        let user = token.and_then(|token| self.identity.resolve(token));
        let viewer = Viewer::anonymous().with_user(user);
        match preview_secret {
            Some(secret) => viewer.with_preview_secret(secret),
            None => viewer,
        }
    }

    /// Creates a model with its first version and queues all three images.
    pub fn create(
        &self,
        viewer: &Viewer,
        request: CreateRequest,
    ) -> Result<ContentModelView, ModelshotError> {
        let author = authenticated(viewer)?;
        let title = trimmed(Some(request.title.as_str()))
            .ok_or_else(|| ModelshotError::Invalid("Title is required".to_string()))?;
        let description = trimmed(Some(request.description.as_str()))
            .ok_or_else(|| ModelshotError::Invalid("Description is required".to_string()))?;
        let graph = request.model.parse_graph()?;
        let layout = request.layout.parse_layout()?.normalize();
        log_cross_reference(&graph, &layout);

        let now = Utc::now();
        let model = ContentModel {
            id: ModelId::new(),
            slug: self.free_slug()?,
            title: title.clone(),
            description,
            owner: author.clone(),
            visibility: request.visibility.unwrap_or_default(),
            meta_image: None,
            created_at: now,
            updated_at: now,
        };
        let first = Version {
            id: VersionId::new(),
            model_id: model.id,
            number: 1,
            name: title,
            graph,
            layout,
            author,
            image: None,
            image_no_connections: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_model(model.clone(), first.clone())?;
        info!(slug:% = model.slug, id:% = model.id; "Created content model");

        let created = ModelWithLatest {
            model,
            latest: first,
        };
        self.queue
            .dispatch(RegenerationJob::new(&created.model, ScreenshotOptions::create()));
        Ok(ContentModelView::new(&self.urls, created))
    }

    /// Applies a partial update owned by the viewer.
    pub fn update(
        &self,
        viewer: &Viewer,
        request: UpdateRequest,
    ) -> Result<ContentModelView, ModelshotError> {
        let caller = authenticated(viewer)?;
        let current = self.owned(&caller, request.id)?;

        let graph = request.model.as_ref().map(RawPayload::parse_graph).transpose()?;
        let layout = request.layout.as_ref().map(RawPayload::parse_layout).transpose()?;

        let revision = classify(
            &current.model,
            &current.latest,
            ProposedChange {
                title: request.title,
                description: request.description,
                visibility: request.visibility,
                graph,
                layout,
            },
        );
        if revision.is_noop() {
            debug!(slug:% = current.model.slug; "Update changes nothing");
            return Ok(ContentModelView::new(&self.urls, current));
        }

        let now = Utc::now();
        let regeneration = revision.regeneration();
        let version = match revision.action {
            VersionAction::Keep => VersionWrite::Keep,
            VersionAction::PatchLayout(layout) => {
                log_cross_reference(&current.latest.graph, &layout);
                VersionWrite::PatchLayout(layout)
            }
            VersionAction::Create {
                number,
                name,
                graph,
                layout,
            } => {
                log_cross_reference(&graph, &layout);
                VersionWrite::Insert(Version {
                    id: VersionId::new(),
                    model_id: current.model.id,
                    number,
                    name,
                    graph,
                    layout,
                    author: caller,
                    image: None,
                    image_no_connections: None,
                    created_at: now,
                    updated_at: now,
                })
            }
        };

        let updated = self.store.apply_update(ModelUpdate {
            model_id: current.model.id,
            title: revision.scalars.title,
            description: revision.scalars.description,
            visibility: revision.scalars.visibility,
            version,
            updated_at: now,
        })?;
        info!(
            slug:% = updated.model.slug,
            version = updated.latest.number,
            regeneration:? = regeneration;
            "Updated content model"
        );

        if let Some(options) = ScreenshotOptions::for_regeneration(regeneration) {
            self.queue
                .dispatch(RegenerationJob::new(&updated.model, options));
        }
        Ok(ContentModelView::new(&self.urls, updated))
    }

    /// Deletes a model owned by the viewer and returns its last state.
    pub fn delete(&self, viewer: &Viewer, id: ModelId) -> Result<ContentModelView, ModelshotError> {
        let caller = authenticated(viewer)?;
        let current = self.owned(&caller, id)?;
        self.store.delete_model(id)?;
        info!(slug:% = current.model.slug, id:% = id; "Deleted content model");
        Ok(ContentModelView::new(&self.urls, current))
    }

    /// Reads a model by slug, subject to its visibility.
    pub fn get_by_slug(&self, viewer: &Viewer, slug: &Slug) -> Result<ContentModelView, ModelshotError> {
        let model = self
            .store
            .model_by_slug(slug)?
            .filter(|model| self.access.can_read(model, viewer))
            .ok_or(ModelshotError::NotFound("content model"))?;
        let latest = self.latest(model.id)?;
        Ok(ContentModelView::new(&self.urls, ModelWithLatest { model, latest }))
    }

    pub fn list(
        &self,
        viewer: &Viewer,
        request: ListRequest,
    ) -> Result<PageView<ContentModelSummary>, ModelshotError> {
        let Some(scope) = self
            .access
            .list_scope(viewer, request.visibility, request.owner)?
        else {
            return Ok(PageView::from(Page::empty()));
        };

        let query = ListQuery::new(scope.visibility)
            .with_owner(scope.owner)
            .with_search(request.search)
            .with_page(request.page.unwrap_or(1))
            .with_count(request.count.unwrap_or(DEFAULT_PAGE_SIZE));
        let page = self.store.list_models(&query)?;
        debug!(total = page.total, page = query.page(); "Listed content models");
        Ok(page.map(|model| ContentModelSummary::new(&self.urls, model)).into())
    }

    /// Queues a full create-mode regeneration for recently created models.
    /// Returns the number of queued jobs.
    pub fn backfill(&self, mode: MaintenanceMode) -> Result<usize, ModelshotError> {
        let MaintenanceMode::Backfill { limit } = mode else {
            info!("Maintenance mode is off, skipping backfill");
            return Ok(0);
        };

        let mut queued = 0;
        for model in self.store.recent_models(limit)? {
            self.queue
                .dispatch(RegenerationJob::new(&model, ScreenshotOptions::create()));
            queued += 1;
        }
        info!(queued, limit; "Backfill queued");
        Ok(queued)
    }

    /// The model behind a slug and its latest version, without access
    /// checks. For operator tooling such as a foreground screenshot run.
    pub fn regeneration_target(&self, slug: &Slug) -> Result<ModelWithLatest, ModelshotError> {
        let model = self
            .store
            .model_by_slug(slug)?
            .ok_or(ModelshotError::NotFound("content model"))?;
        let latest = self.latest(model.id)?;
        Ok(ModelWithLatest { model, latest })
    }

    fn latest(&self, id: ModelId) -> Result<Version, ModelshotError> {
        Ok(self.store.latest_version(id)?.ok_or_else(|| StoreError::Missing {
            what: "version of content model",
            id: id.to_string(),
        })?)
    }

    /// The model if it exists and belongs to `caller`. Foreign models look
    /// missing.
    fn owned(&self, caller: &UserId, id: ModelId) -> Result<ModelWithLatest, ModelshotError> {
        self.store
            .model_with_latest(id)?
            .filter(|record| record.model.owner == *caller)
            .ok_or(ModelshotError::NotFound("content model"))
    }

    fn free_slug(&self) -> Result<Slug, ModelshotError> {
        for _ in 0..SLUG_ATTEMPTS {
            let slug = Slug::generate();
            if self.store.model_by_slug(&slug)?.is_none() {
                return Ok(slug);
            }
        }
        Err(StoreError::Conflict("could not draw a free slug".to_string()).into())
    }
}

fn authenticated(viewer: &Viewer) -> Result<UserId, ModelshotError> {
    viewer.user_id().cloned().ok_or(ModelshotError::Unauthenticated)
}

fn log_cross_reference(graph: &ContentGraph, layout: &Layout) {
    let unpositioned = layout.unpositioned_nodes(graph);
    if !unpositioned.is_empty() {
        debug!(nodes:? = unpositioned; "Content types without a position");
    }
    let stray = layout.stray_positions(graph);
    if !stray.is_empty() {
        debug!(nodes:? = stray; "Positions for unknown content types");
    }
}
