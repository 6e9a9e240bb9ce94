//! What callers see of a content model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use modelshot_core::{
    asset::ImageAsset,
    graph::ContentGraph,
    identifier::{ModelId, Slug, UserId, VersionId},
    layout::Layout,
    record::{ContentModel, ModelWithLatest, Version},
    visibility::Visibility,
};

use crate::{
    assets::{AssetUrls, ImageLink},
    store::Page,
};

/// A content model with its latest version and delivery links of its images.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModelView {
    pub id: ModelId,
    pub slug: Slug,
    pub title: String,
    pub description: String,
    pub owner: UserId,
    pub visibility: Visibility,
    pub meta_image: Option<ImageLink>,
    pub version: VersionView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    pub id: VersionId,
    pub number: u32,
    pub name: String,
    pub model: ContentGraph,
    pub positions: Layout,
    pub image: Option<ImageLink>,
    pub image_no_connections: Option<ImageLink>,
    pub created_at: DateTime<Utc>,
}

/// A listed content model. Listings skip the graph and layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModelSummary {
    pub id: ModelId,
    pub slug: Slug,
    pub title: String,
    pub description: String,
    pub owner: UserId,
    pub visibility: Visibility,
    pub meta_image: Option<ImageLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<Page<T>> for PageView<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            total: page.total,
            has_next: page.has_next,
            has_prev: page.has_prev,
        }
    }
}

fn link(urls: &AssetUrls, asset: Option<&ImageAsset>) -> Option<ImageLink> {
    asset.map(|asset| urls.link(asset))
}

impl ContentModelView {
    pub fn new(urls: &AssetUrls, record: ModelWithLatest) -> Self {
        let ModelWithLatest { model, latest } = record;
        Self {
            meta_image: link(urls, model.meta_image.as_ref()),
            version: VersionView::new(urls, latest),
            id: model.id,
            slug: model.slug,
            title: model.title,
            description: model.description,
            owner: model.owner,
            visibility: model.visibility,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl VersionView {
    pub fn new(urls: &AssetUrls, version: Version) -> Self {
        Self {
            image: link(urls, version.image.as_ref()),
            image_no_connections: link(urls, version.image_no_connections.as_ref()),
            id: version.id,
            number: version.number,
            name: version.name,
            model: version.graph,
            positions: version.layout,
            created_at: version.created_at,
        }
    }
}

impl ContentModelSummary {
    pub fn new(urls: &AssetUrls, model: ContentModel) -> Self {
        Self {
            meta_image: link(urls, model.meta_image.as_ref()),
            id: model.id,
            slug: model.slug,
            title: model.title,
            description: model.description,
            owner: model.owner,
            visibility: model.visibility,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
