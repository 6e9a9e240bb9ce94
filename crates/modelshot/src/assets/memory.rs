use std::{
    collections::HashMap,
    io,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use super::{
    AssetError, AssetStore, DELIVERY_TYPE_UPLOAD, RESOURCE_TYPE_IMAGE, UploadTarget,
    UploadedAsset, image_dimensions, new_public_id, signature, validate_public_id,
};

/// An [`AssetStore`] that keeps images in memory.
///
/// Revision stamps start at 1 and count overwrites per public id, which
/// makes it deterministic enough for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    images: Mutex<HashMap<String, (UploadedAsset, Vec<u8>)>>,
    uploads: Mutex<Vec<UploadTarget>>,
    failing: AtomicBool,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following upload fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Targets of all uploads so far, in order.
    pub fn uploads(&self) -> Vec<UploadTarget> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// The stored image and its metadata.
    pub fn get(&self, public_id: &str) -> Option<(UploadedAsset, Vec<u8>)> {
        self.images
            .lock()
            .ok()
            .and_then(|images| images.get(public_id).cloned())
    }
}

impl AssetStore for MemoryAssetStore {
    fn upload(&self, bytes: &[u8], target: &UploadTarget) -> Result<UploadedAsset, AssetError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AssetError::Io(io::Error::other("asset store unavailable")));
        }

        let public_id = match target {
            UploadTarget::Folder(folder) => new_public_id(folder)?,
            UploadTarget::Overwrite(public_id) => {
                validate_public_id(public_id)?;
                public_id.clone()
            }
        };
        let (width, height) = image_dimensions(bytes)?;

        let mut images = self.images.lock().map_err(|_| AssetError::Poisoned)?;
        let version = images.get(&public_id).map_or(1, |(prev, _)| prev.version + 1);
        let uploaded = UploadedAsset {
            public_id: public_id.clone(),
            version,
            signature: signature(bytes),
            width,
            height,
            resource_type: RESOURCE_TYPE_IMAGE.to_string(),
            kind: DELIVERY_TYPE_UPLOAD.to_string(),
        };
        images.insert(public_id, (uploaded.clone(), bytes.to_vec()));
        drop(images);

        self.uploads
            .lock()
            .map_err(|_| AssetError::Poisoned)?
            .push(target.clone());
        Ok(uploaded)
    }
}
