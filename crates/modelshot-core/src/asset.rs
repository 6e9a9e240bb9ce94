//! Stored image asset references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::AssetId;

/// The three image slots a content model can have rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageSlot {
    /// Fixed-size link-sharing preview, stored on the content model.
    Meta,
    /// Full diagram render, stored on a version.
    Diagram,
    /// Diagram render without relation edges, stored on a version.
    DiagramNoConnections,
}

impl ImageSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Diagram => "diagram",
            Self::DiagramNoConnections => "diagram-no-connections",
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to an uploaded image, as returned by the asset store.
///
/// Each asset row is referenced by exactly one slot; rows are never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: AssetId,
    /// Provider-assigned public identifier, stable across overwrites.
    pub public_id: String,
    /// Revision stamp; changes on every overwrite of the same public id.
    pub version: u64,
    pub signature: String,
    pub width: u32,
    pub height: u32,
    pub resource_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}
