//! Image asset storage.
//!
//! An [`AssetStore`] accepts PNG bytes and returns a permanent public id
//! together with a revision stamp, a signature and the pixel dimensions.
//! Uploading with [`UploadTarget::Overwrite`] replaces the image behind an
//! existing public id, so its delivery URL path stays stable apart from the
//! revision segment.

mod local;
mod memory;
mod urls;

pub use local::LocalAssetStore;
pub use memory::MemoryAssetStore;
pub use urls::{AssetUrls, ImageLink};

use std::io;

use thiserror::Error;

use modelshot_core::{asset::ImageAsset, identifier::AssetId};

/// Resource type reported for every stored image.
pub const RESOURCE_TYPE_IMAGE: &str = "image";

/// Delivery type reported for every stored image.
pub const DELIVERY_TYPE_UPLOAD: &str = "upload";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid public id `{0}`")]
    InvalidPublicId(String),

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("asset I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("asset metadata is malformed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("invalid asset base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("asset store lock poisoned")]
    Poisoned,
}

/// Where an upload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// Create a new asset with a generated public id inside this folder.
    Folder(String),
    /// Replace the asset behind this public id.
    Overwrite(String),
}

impl UploadTarget {
    /// Overwrite `existing` if given, otherwise create inside `folder`.
    pub fn overwrite_or_create(existing: Option<&str>, folder: impl Into<String>) -> Self {
        match existing {
            Some(public_id) => Self::Overwrite(public_id.to_string()),
            None => Self::Folder(folder.into()),
        }
    }

    pub fn is_overwrite(&self) -> bool {
        matches!(self, Self::Overwrite(_))
    }
}

/// The asset store's answer to an upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadedAsset {
    pub public_id: String,
    pub version: u64,
    pub signature: String,
    pub width: u32,
    pub height: u32,
    pub resource_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl UploadedAsset {
    /// Turns the upload into an asset row. An overwrite keeps the id of the
    /// row it replaces; a creation gets a fresh id.
    pub fn into_asset(self, replaces: Option<&ImageAsset>) -> ImageAsset {
        ImageAsset {
            id: replaces.map_or_else(AssetId::new, |asset| asset.id),
            public_id: self.public_id,
            version: self.version,
            signature: self.signature,
            width: self.width,
            height: self.height,
            resource_type: self.resource_type,
            kind: self.kind,
        }
    }
}

/// Image storage collaborator.
pub trait AssetStore: Send + Sync {
    fn upload(&self, bytes: &[u8], target: &UploadTarget) -> Result<UploadedAsset, AssetError>;
}

/// Rejects absolute paths, empty or parent segments and characters outside
/// `[A-Za-z0-9_-]`.
pub(crate) fn validate_public_id(public_id: &str) -> Result<(), AssetError> {
    let valid = !public_id.is_empty()
        && public_id.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });

    if valid {
        Ok(())
    } else {
        Err(AssetError::InvalidPublicId(public_id.to_string()))
    }
}

/// Public id for a new asset inside `folder`.
pub(crate) fn new_public_id(folder: &str) -> Result<String, AssetError> {
    let folder = folder.trim_matches('/');
    let public_id = if folder.is_empty() {
        uuid::Uuid::new_v4().simple().to_string()
    } else {
        format!("{folder}/{}", uuid::Uuid::new_v4().simple())
    };
    validate_public_id(&public_id)?;
    Ok(public_id)
}

/// Pixel dimensions read from the image header.
pub(crate) fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), AssetError> {
    let reader = image::ImageReader::new(io::Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Hex SHA-256 of the image bytes.
pub(crate) fn signature(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = io::Cursor::new(Vec::new());
    image::RgbaImage::new(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_public_id() {
        assert!(validate_public_id("app/public/staging/abc/0f3e").is_ok());
        assert!(validate_public_id("").is_err());
        assert!(validate_public_id("/etc/passwd").is_err());
        assert!(validate_public_id("a/../b").is_err());
        assert!(validate_public_id("a//b").is_err());
        assert!(validate_public_id("a/b.png").is_err());
    }

    #[test]
    fn test_new_public_id_is_inside_folder() {
        let id = new_public_id("/app/public/staging/Xy_1-/").unwrap();
        assert!(id.starts_with("app/public/staging/Xy_1-/"));
        assert_eq!(id.rsplit('/').next().unwrap().len(), 32);
    }

    #[test]
    fn test_image_dimensions_and_signature() {
        let bytes = png(12, 7);
        assert_eq!(image_dimensions(&bytes).unwrap(), (12, 7));
        assert_eq!(signature(&bytes).len(), 64);
        assert!(image_dimensions(b"not an image").is_err());
    }

    #[test]
    fn test_into_asset_keeps_replaced_id() {
        let uploaded = UploadedAsset {
            public_id: "f/a".to_string(),
            version: 2,
            signature: "s".to_string(),
            width: 1,
            height: 1,
            resource_type: RESOURCE_TYPE_IMAGE.to_string(),
            kind: DELIVERY_TYPE_UPLOAD.to_string(),
        };
        let previous = uploaded.clone().into_asset(None);
        let replaced = uploaded.into_asset(Some(&previous));
        assert_eq!(replaced.id, previous.id);
    }
}
