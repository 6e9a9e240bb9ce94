//! Persistence of content models, versions and their image references.
//!
//! The [`Store`] trait is the seam to the persistence layer. Every method is
//! a single atomic operation; in particular [`Store::create_model`] writes a
//! model together with its first version and [`Store::apply_update`] writes
//! scalar fields and the version change together.

mod memory;

pub use memory::MemoryStore;

use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

use modelshot_core::{
    asset::ImageAsset,
    identifier::{ModelId, Slug, UserId, VersionId},
    layout::Layout,
    record::{ContentModel, ModelWithLatest, Version},
    visibility::Visibility,
};

/// Smallest and largest page size of a listing.
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no {what} with id {id}")]
    Missing { what: &'static str, id: String },

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("failed to read or write store snapshot: {0}")]
    Io(#[from] io::Error),

    #[error("malformed store snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// The version-history part of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionWrite {
    Keep,
    /// Replace the layout of the latest version.
    PatchLayout(Layout),
    /// Append a version; its number must follow the current latest.
    Insert(Version),
}

/// An update of one content model, applied atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpdate {
    pub model_id: ModelId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub version: VersionWrite,
    pub updated_at: DateTime<Utc>,
}

/// A listing request: filter, search and page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub visibility: Visibility,
    pub owner: Option<UserId>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    page: u32,
    count: u32,
}

impl ListQuery {
    pub fn new(visibility: Visibility) -> Self {
        Self {
            visibility,
            owner: None,
            search: None,
            page: 1,
            count: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the 1-based page number; zero is treated as the first page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Sets the page size, clamped to `1..=1000`.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self
    }

    pub fn with_owner(mut self, owner: Option<UserId>) -> Self {
        self.owner = owner;
        self
    }

    /// Blank search terms are ignored.
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of items before the requested page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.count as usize
    }

    /// True if `model` passes the filter and search of this query.
    pub fn matches(&self, model: &ContentModel) -> bool {
        if model.visibility != self.visibility {
            return false;
        }
        if self.owner.as_ref().is_some_and(|owner| *owner != model.owner) {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                model.title.to_lowercase().contains(&term)
                    || model.description.to_lowercase().contains(&term)
            }
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            has_next: false,
            has_prev: false,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Persistence collaborator for content models and versions.
pub trait Store: Send + Sync {
    /// Stores a new model and its first version in one write.
    fn create_model(&self, model: ContentModel, first: Version) -> Result<(), StoreError>;

    fn model_by_id(&self, id: ModelId) -> Result<Option<ContentModel>, StoreError>;

    fn model_by_slug(&self, slug: &Slug) -> Result<Option<ContentModel>, StoreError>;

    /// The highest-numbered version of a model.
    fn latest_version(&self, id: ModelId) -> Result<Option<Version>, StoreError>;

    /// All versions of a model, oldest first.
    fn versions(&self, id: ModelId) -> Result<Vec<Version>, StoreError>;

    /// Applies scalar fields and the version change in one write and returns
    /// the updated model with its latest version.
    fn apply_update(&self, update: ModelUpdate) -> Result<ModelWithLatest, StoreError>;

    fn set_meta_image(&self, id: ModelId, asset: ImageAsset) -> Result<(), StoreError>;

    /// Sets both diagram images of a version in one write.
    fn set_version_images(
        &self,
        version: VersionId,
        image: ImageAsset,
        no_connections: ImageAsset,
    ) -> Result<(), StoreError>;

    /// Removes a model after all of its versions.
    fn delete_model(&self, id: ModelId) -> Result<(), StoreError>;

    /// Newest first.
    fn list_models(&self, query: &ListQuery) -> Result<Page<ContentModel>, StoreError>;

    /// The `limit` most recently created models of any visibility.
    fn recent_models(&self, limit: usize) -> Result<Vec<ContentModel>, StoreError>;

    /// Model and latest version together.
    fn model_with_latest(&self, id: ModelId) -> Result<Option<ModelWithLatest>, StoreError> {
        let Some(model) = self.model_by_id(id)? else {
            return Ok(None);
        };
        let latest = self.latest_version(id)?.ok_or_else(|| StoreError::Missing {
            what: "version of content model",
            id: id.to_string(),
        })?;
        Ok(Some(ModelWithLatest { model, latest }))
    }
}
