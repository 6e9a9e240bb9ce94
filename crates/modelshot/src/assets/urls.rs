//! Delivery URLs of stored images.

use serde::Serialize;
use url::Url;

use modelshot_core::asset::ImageAsset;

use super::AssetError;

/// An image reference as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageLink {
    /// Absolute delivery URL.
    pub src: String,
    /// The part of `src` after `image/upload/`.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// Builds delivery URLs of the form
/// `{base}/image/upload/v{version}/{public_id}.png`.
///
/// ```
/// # use modelshot::assets::AssetUrls;
/// let urls = AssetUrls::new("https://cdn.example.com/demo/").unwrap();
/// assert_eq!(
///     urls.src("app/public/staging/abc/123", 1700000000),
///     "https://cdn.example.com/demo/image/upload/v1700000000/app/public/staging/abc/123.png"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct AssetUrls {
    base: Url,
}

impl AssetUrls {
    pub fn new(base_url: &str) -> Result<Self, AssetError> {
        Ok(Self {
            base: Url::parse(base_url)?,
        })
    }

    pub fn path(&self, public_id: &str, version: u64) -> String {
        format!("v{version}/{public_id}.png")
    }

    pub fn src(&self, public_id: &str, version: u64) -> String {
        format!(
            "{}/image/upload/{}",
            self.base.as_str().trim_end_matches('/'),
            self.path(public_id, version)
        )
    }

    pub fn link(&self, asset: &ImageAsset) -> ImageLink {
        ImageLink {
            src: self.src(&asset.public_id, asset.version),
            path: self.path(&asset.public_id, asset.version),
            width: asset.width,
            height: asset.height,
        }
    }
}
