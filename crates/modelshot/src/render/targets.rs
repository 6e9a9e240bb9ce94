//! URLs of the pages the pipeline renders.

use url::Url;

use modelshot_core::{identifier::Slug, visibility::Visibility};

use super::BrowserError;

/// Query parameter carrying the private preview bypass secret.
pub const PREVIEW_SECRET_PARAM: &str = "previewSecret";

/// How the embed route is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// Plain route, used to read the computed dimensions.
    Measure,
    /// No appearance animation and no controls.
    WithConnections,
    /// Like [`EmbedMode::WithConnections`] without relation edges.
    WithoutConnections,
}

/// Builds render target URLs under the frontend base URL.
#[derive(Debug, Clone)]
pub struct RenderTargets {
    base: Url,
    preview_secret: Option<String>,
}

impl RenderTargets {
    pub fn new(frontend_url: &str, preview_secret: Option<String>) -> Result<Self, BrowserError> {
        let mut base = Url::parse(frontend_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            preview_secret: preview_secret.filter(|s| !s.is_empty()),
        })
    }

    /// `/content-models/{slug}/preview-image`
    pub fn preview_image(&self, slug: &Slug, visibility: Visibility) -> Result<String, BrowserError> {
        let url = self.base.join(&format!("content-models/{slug}/preview-image"))?;
        Ok(self.with_secret(url, visibility).into())
    }

    /// `/content-models/{slug}/embed` with the query flags of `mode`.
    pub fn embed(
        &self,
        slug: &Slug,
        visibility: Visibility,
        mode: EmbedMode,
    ) -> Result<String, BrowserError> {
        let mut url = self.base.join(&format!("content-models/{slug}/embed"))?;
        if mode != EmbedMode::Measure {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("animatedAppearance", "0")
                .append_pair("showControls", "0");
            if mode == EmbedMode::WithoutConnections {
                query.append_pair("drawConnections", "0");
            }
        }
        Ok(self.with_secret(url, visibility).into())
    }

    fn with_secret(&self, mut url: Url, visibility: Visibility) -> Url {
        if visibility == Visibility::Private {
            if let Some(secret) = &self.preview_secret {
                url.query_pairs_mut().append_pair(PREVIEW_SECRET_PARAM, secret);
            }
        }
        url
    }
}
