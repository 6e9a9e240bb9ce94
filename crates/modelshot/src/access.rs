//! Read access and listing scope by visibility.

use log::debug;

use modelshot_core::{identifier::UserId, record::ContentModel, visibility::Visibility};

use crate::error::ModelshotError;

/// Who is asking: an optional authenticated user and an optional preview
/// bypass secret presented with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    user: Option<UserId>,
    preview_secret: Option<String>,
}

impl Viewer {
    /// A caller without a session or secret.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user: UserId) -> Self {
        Self {
            user: Some(user),
            preview_secret: None,
        }
    }

    pub fn with_user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    pub fn with_preview_secret(mut self, secret: impl Into<String>) -> Self {
        self.preview_secret = Some(secret.into());
        self
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn preview_secret(&self) -> Option<&str> {
        self.preview_secret.as_deref()
    }
}

/// Listing filter after access rules were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListScope {
    pub visibility: Visibility,
    pub owner: Option<UserId>,
}

/// Gates reads of content models.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    preview_secret: Option<String>,
}

impl AccessPolicy {
    pub fn new(preview_secret: Option<String>) -> Self {
        Self {
            preview_secret: preview_secret.filter(|s| !s.is_empty()),
        }
    }

    /// PUBLIC and UNLISTED models are readable by anyone who knows the
    /// slug. PRIVATE models only by their owner or with the bypass secret.
    pub fn can_read(&self, model: &ContentModel, viewer: &Viewer) -> bool {
        match model.visibility {
            Visibility::Public | Visibility::Unlisted => true,
            Visibility::Private => {
                viewer.user_id() == Some(&model.owner) || self.presents_secret(viewer)
            }
        }
    }

    /// True if the viewer holds the configured bypass secret.
    fn presents_secret(&self, viewer: &Viewer) -> bool {
        match (&self.preview_secret, viewer.preview_secret()) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }

    /// Resolves the effective listing filter.
    ///
    /// Without a visibility filter only PUBLIC models are listed. Asking
    /// for UNLISTED or PRIVATE models requires authentication and restricts
    /// the listing to the caller's own models. Returns `Ok(None)` when the
    /// requested owner filter can never match.
    pub fn list_scope(
        &self,
        viewer: &Viewer,
        visibility: Option<Visibility>,
        owner: Option<UserId>,
    ) -> Result<Option<ListScope>, ModelshotError> {
        let visibility = visibility.unwrap_or(Visibility::Public);
        if visibility == Visibility::Public {
            return Ok(Some(ListScope { visibility, owner }));
        }

        let caller = viewer.user_id().ok_or(ModelshotError::Unauthenticated)?;
        if owner.as_ref().is_some_and(|owner| owner != caller) {
            debug!(visibility:% = visibility; "Listing other users' non-public models");
            return Ok(None);
        }

        Ok(Some(ListScope {
            visibility,
            owner: Some(caller.clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use modelshot_core::identifier::{ModelId, Slug};

    use super::*;

    fn model(visibility: Visibility) -> ContentModel {
        let now = Utc::now();
        ContentModel {
            id: ModelId::new(),
            slug: Slug::generate(),
            title: "Blog".to_string(),
            description: "A blog".to_string(),
            owner: UserId::new("owner"),
            visibility,
            meta_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_public_and_unlisted_are_readable_by_anyone() {
        let policy = AccessPolicy::new(Some("s3cret".to_string()));
        assert!(policy.can_read(&model(Visibility::Public), &Viewer::anonymous()));
        assert!(policy.can_read(&model(Visibility::Unlisted), &Viewer::anonymous()));
    }

    #[test]
    fn test_private_requires_owner_or_secret() {
        let policy = AccessPolicy::new(Some("s3cret".to_string()));
        let private = model(Visibility::Private);

        assert!(!policy.can_read(&private, &Viewer::anonymous()));
        assert!(!policy.can_read(&private, &Viewer::user(UserId::new("intruder"))));
        assert!(!policy.can_read(&private, &Viewer::anonymous().with_preview_secret("guess")));
        assert!(policy.can_read(&private, &Viewer::user(UserId::new("owner"))));
        assert!(policy.can_read(&private, &Viewer::anonymous().with_preview_secret("s3cret")));
    }

    #[test]
    fn test_secret_is_useless_when_not_configured() {
        let policy = AccessPolicy::new(Some(String::new()));
        let viewer = Viewer::anonymous().with_preview_secret("");
        assert!(!policy.can_read(&model(Visibility::Private), &viewer));
    }

    #[test]
    fn test_list_scope_defaults_to_public() {
        let policy = AccessPolicy::default();
        let scope = policy
            .list_scope(&Viewer::anonymous(), None, Some(UserId::new("u")))
            .unwrap()
            .unwrap();

        assert_eq!(scope.visibility, Visibility::Public);
        assert_eq!(scope.owner, Some(UserId::new("u")));
    }

    #[test]
    fn test_list_scope_non_public_requires_auth() {
        let policy = AccessPolicy::default();
        let err = policy
            .list_scope(&Viewer::anonymous(), Some(Visibility::Private), None)
            .unwrap_err();
        assert!(matches!(err, ModelshotError::Unauthenticated));
    }

    #[test]
    fn test_list_scope_non_public_is_restricted_to_caller() {
        let policy = AccessPolicy::default();
        let viewer = Viewer::user(UserId::new("me"));

        let scope = policy
            .list_scope(&viewer, Some(Visibility::Unlisted), None)
            .unwrap()
            .unwrap();
        assert_eq!(scope.owner, Some(UserId::new("me")));

        let none = policy
            .list_scope(&viewer, Some(Visibility::Unlisted), Some(UserId::new("you")))
            .unwrap();
        assert!(none.is_none());
    }
}
