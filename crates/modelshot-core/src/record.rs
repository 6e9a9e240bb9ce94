//! Persisted records: content models and their versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    asset::ImageAsset,
    graph::ContentGraph,
    identifier::{ModelId, Slug, UserId, VersionId},
    layout::Layout,
    visibility::Visibility,
};

/// A versioned content model diagram owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModel {
    pub id: ModelId,
    /// Assigned at creation, never changed.
    pub slug: Slug,
    pub title: String,
    pub description: String,
    pub owner: UserId,
    pub visibility: Visibility,
    pub meta_image: Option<ImageAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A snapshot of a content model's graph and layout.
///
/// Only the latest version of a model is ever modified in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub model_id: ModelId,
    /// Starts at 1 and increases strictly per content model.
    pub number: u32,
    /// Title of the model when this version was created.
    pub name: String,
    pub graph: ContentGraph,
    /// Always stored normalized.
    pub layout: Layout,
    pub author: UserId,
    pub image: Option<ImageAsset>,
    pub image_no_connections: Option<ImageAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A content model together with its latest version.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelWithLatest {
    pub model: ContentModel,
    pub latest: Version,
}
