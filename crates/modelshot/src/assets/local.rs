//! Content-addressed image store on the local filesystem.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Utc;
use log::{debug, info};

use super::{
    AssetError, AssetStore, DELIVERY_TYPE_UPLOAD, RESOURCE_TYPE_IMAGE, UploadTarget,
    UploadedAsset, image_dimensions, new_public_id, signature, validate_public_id,
};

/// Writes images to `<root>/<public_id>.png` with the upload metadata next to
/// them in `<root>/<public_id>.json`.
///
/// Revision stamps are Unix seconds. Overwriting an asset always yields a
/// stamp greater than the previous one, even within the same second.
#[derive(Debug)]
pub struct LocalAssetStore {
    root: PathBuf,
    /// Serializes read-modify-write of the metadata files.
    lock: Mutex<()>,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the image file behind a public id.
    pub fn image_path(&self, public_id: &str) -> PathBuf {
        self.root.join(format!("{public_id}.png"))
    }

    fn metadata_path(&self, public_id: &str) -> PathBuf {
        self.root.join(format!("{public_id}.json"))
    }

    /// Metadata of a stored asset, if present.
    pub fn metadata(&self, public_id: &str) -> Result<Option<UploadedAsset>, AssetError> {
        validate_public_id(public_id)?;
        let path = self.metadata_path(public_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }
}

impl AssetStore for LocalAssetStore {
    fn upload(&self, bytes: &[u8], target: &UploadTarget) -> Result<UploadedAsset, AssetError> {
        let public_id = match target {
            UploadTarget::Folder(folder) => new_public_id(folder)?,
            UploadTarget::Overwrite(public_id) => {
                validate_public_id(public_id)?;
                public_id.clone()
            }
        };
        let (width, height) = image_dimensions(bytes)?;

        let _guard = self.lock.lock().map_err(|_| AssetError::Poisoned)?;

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let version = match self.metadata(&public_id)? {
            Some(previous) => now.max(previous.version + 1),
            None => now,
        };

        let uploaded = UploadedAsset {
            public_id,
            version,
            signature: signature(bytes),
            width,
            height,
            resource_type: RESOURCE_TYPE_IMAGE.to_string(),
            kind: DELIVERY_TYPE_UPLOAD.to_string(),
        };

        let image_path = self.image_path(&uploaded.public_id);
        if let Some(parent) = image_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&image_path, bytes)?;
        fs::write(
            self.metadata_path(&uploaded.public_id),
            serde_json::to_string_pretty(&uploaded)?,
        )?;

        debug!(path:? = image_path, bytes = bytes.len(); "Wrote image file");
        info!(
            public_id = uploaded.public_id.as_str(),
            version = uploaded.version,
            overwrite = target.is_overwrite();
            "Stored image asset"
        );
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::assets::png;

    #[test]
    fn test_upload_into_folder() {
        let dir = TempDir::new().unwrap();
        let store = LocalAssetStore::new(dir.path());

        let uploaded = store
            .upload(&png(30, 20), &UploadTarget::Folder("app/public/staging/slug".to_string()))
            .unwrap();

        assert!(uploaded.public_id.starts_with("app/public/staging/slug/"));
        assert_eq!((uploaded.width, uploaded.height), (30, 20));
        assert_eq!(uploaded.resource_type, "image");
        assert_eq!(uploaded.kind, "upload");
        assert!(store.image_path(&uploaded.public_id).exists());
    }

    #[test]
    fn test_overwrite_keeps_public_id_and_bumps_version() {
        let dir = TempDir::new().unwrap();
        let store = LocalAssetStore::new(dir.path());

        let first = store
            .upload(&png(10, 10), &UploadTarget::Folder("f".to_string()))
            .unwrap();
        let second = store
            .upload(&png(40, 10), &UploadTarget::Overwrite(first.public_id.clone()))
            .unwrap();

        assert_eq!(second.public_id, first.public_id);
        assert!(second.version > first.version);
        assert_ne!(second.signature, first.signature);
        assert_eq!(second.width, 40);
        assert_eq!(store.metadata(&first.public_id).unwrap(), Some(second));
    }

    #[test]
    fn test_rejects_escaping_public_id() {
        let dir = TempDir::new().unwrap();
        let store = LocalAssetStore::new(dir.path());

        let result = store.upload(&png(1, 1), &UploadTarget::Overwrite("../outside".to_string()));
        assert!(matches!(result, Err(AssetError::InvalidPublicId(_))));
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let dir = TempDir::new().unwrap();
        let store = LocalAssetStore::new(dir.path());

        let result = store.upload(b"<html>", &UploadTarget::Folder("f".to_string()));
        assert!(matches!(result, Err(AssetError::Decode(_))));
    }
}
