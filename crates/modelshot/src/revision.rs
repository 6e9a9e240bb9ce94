//! The version diff engine.
//!
//! [`classify`] compares a proposed update against a content model and its
//! latest version and decides whether the update is a scalar-only change,
//! an in-place layout patch, or a new version. The result also says which
//! derived images have to be regenerated.
//!
//! Comparisons are structural over the typed graph and layout: layouts are
//! normalized first, so a diagram moved as a whole is unchanged.

use modelshot_core::{
    graph::ContentGraph,
    layout::Layout,
    record::{ContentModel, Version},
    visibility::Visibility,
};

/// A partial update as requested by a caller. `None` means "not provided".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposedChange {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub graph: Option<ContentGraph>,
    pub layout: Option<Layout>,
}

/// Scalar fields to write onto the content model row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarUpdate {
    /// Trimmed, non-empty title.
    pub title: Option<String>,
    /// Trimmed, non-empty description.
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

impl ScalarUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.visibility.is_none()
    }
}

/// What happens to the version history.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionAction {
    /// The latest version is left as is.
    Keep,
    /// The latest version's layout is replaced in place.
    PatchLayout(Layout),
    /// A new version is appended.
    Create {
        number: u32,
        name: String,
        graph: ContentGraph,
        layout: Layout,
    },
}

/// Which derived images an update makes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regeneration {
    /// Nothing visible changed.
    None,
    /// Only the title changed; re-render the meta image in place.
    MetaOnly,
    /// The layout changed; re-render all three images in place.
    RefreshInPlace,
    /// A new version exists; re-render the meta image in place and render
    /// fresh diagram images for the new version.
    NewVersion,
}

/// The classified outcome of a proposed update.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub scalars: ScalarUpdate,
    pub action: VersionAction,
    pub model_changed: bool,
    pub layout_changed: bool,
    pub title_changed: bool,
}

impl Revision {
    pub fn regeneration(&self) -> Regeneration {
        match &self.action {
            VersionAction::Create { .. } => Regeneration::NewVersion,
            VersionAction::PatchLayout(_) => Regeneration::RefreshInPlace,
            VersionAction::Keep if self.title_changed => Regeneration::MetaOnly,
            VersionAction::Keep => Regeneration::None,
        }
    }

    /// True when neither the row nor the history would change.
    pub fn is_noop(&self) -> bool {
        self.scalars.is_empty() && self.action == VersionAction::Keep
    }
}

/// Trims a scalar input; blank values count as not provided.
pub fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Classifies `change` against the stored `model` and its `latest` version.
///
/// Precedence: neither graph nor layout changed keeps the version; a layout
/// change alone patches it in place; a graph change appends version N+1,
/// carrying the new normalized layout if that changed too and the previous
/// layout otherwise.
pub fn classify(model: &ContentModel, latest: &Version, change: ProposedChange) -> Revision {
    let title = trimmed(change.title.as_deref());
    let description = trimmed(change.description.as_deref());

    let title_changed = title.as_ref().is_some_and(|t| *t != model.title);

    let graph = change.graph.filter(|graph| *graph != latest.graph);
    let layout = change
        .layout
        .map(|layout| layout.normalize())
        .filter(|layout| *layout != latest.layout);

    let model_changed = graph.is_some();
    let layout_changed = layout.is_some();

    let action = match (graph, layout) {
        (None, None) => VersionAction::Keep,
        (None, Some(layout)) => VersionAction::PatchLayout(layout),
        (Some(graph), layout) => VersionAction::Create {
            number: latest.number + 1,
            name: title.clone().unwrap_or_else(|| model.title.clone()),
            graph,
            layout: layout.unwrap_or_else(|| latest.layout.clone()),
        },
    };

    Revision {
        scalars: ScalarUpdate {
            title,
            description,
            visibility: change.visibility,
        },
        action,
        model_changed,
        layout_changed,
        title_changed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::json;

    use modelshot_core::{
        geometry::Point,
        identifier::{ModelId, Slug, UserId, VersionId},
    };

    use super::*;

    fn graph(ids: &[&str]) -> ContentGraph {
        let types: Vec<_> = ids
            .iter()
            .map(|id| json!({"sys": {"id": id}, "name": id, "fields": []}))
            .collect();
        serde_json::from_value(json!(types)).unwrap()
    }

    fn layout(entries: &[(&str, f64, f64)]) -> Layout {
        entries
            .iter()
            .map(|(id, x, y)| (*id, Point::new(*x, *y)))
            .collect()
    }

    fn stored() -> (ContentModel, Version) {
        let now = Utc::now();
        let model = ContentModel {
            id: ModelId::new(),
            slug: Slug::generate(),
            title: "Blog".to_string(),
            description: "A blog".to_string(),
            owner: UserId::new("owner"),
            visibility: Visibility::Public,
            meta_image: None,
            created_at: now,
            updated_at: now,
        };
        let version = Version {
            id: VersionId::new(),
            model_id: model.id,
            number: 1,
            name: "Blog".to_string(),
            graph: graph(&["A", "B"]),
            layout: layout(&[("A", 0.0, 0.0), ("B", 10.0, 0.0)]),
            author: UserId::new("owner"),
            image: None,
            image_no_connections: None,
            created_at: now,
            updated_at: now,
        };
        (model, version)
    }

    #[test]
    fn test_scalar_only_change_keeps_version() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                description: Some("  New description ".to_string()),
                graph: Some(graph(&["A", "B"])),
                layout: Some(layout(&[("A", 0.0, 0.0), ("B", 10.0, 0.0)])),
                ..Default::default()
            },
        );

        assert_eq!(revision.action, VersionAction::Keep);
        assert_eq!(revision.scalars.description.as_deref(), Some("New description"));
        assert_eq!(revision.regeneration(), Regeneration::None);
    }

    #[test]
    fn test_translated_layout_is_unchanged() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                layout: Some(layout(&[("A", 110.0, 55.0), ("B", 120.0, 55.0)])),
                ..Default::default()
            },
        );

        assert!(!revision.layout_changed);
        assert!(revision.is_noop());
    }

    #[test]
    fn test_layout_only_change_patches_in_place() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                layout: Some(layout(&[("A", 50.0, 50.0), ("B", 50.0, 90.0)])),
                ..Default::default()
            },
        );

        assert_eq!(
            revision.action,
            VersionAction::PatchLayout(layout(&[("A", 0.0, 0.0), ("B", 0.0, 40.0)]))
        );
        assert_eq!(revision.regeneration(), Regeneration::RefreshInPlace);
    }

    #[test]
    fn test_graph_change_creates_version_with_previous_layout() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                graph: Some(graph(&["A", "B", "C"])),
                ..Default::default()
            },
        );

        let VersionAction::Create {
            number,
            name,
            layout: carried,
            ..
        } = &revision.action
        else {
            panic!("expected a new version, got {:?}", revision.action);
        };
        assert_eq!(*number, 2);
        assert_eq!(name, "Blog");
        assert_eq!(*carried, latest.layout);
        assert_eq!(revision.regeneration(), Regeneration::NewVersion);
    }

    #[test]
    fn test_graph_and_layout_change_creates_version_with_new_layout() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                title: Some(" Blog v2 ".to_string()),
                graph: Some(graph(&["A"])),
                layout: Some(layout(&[("A", 7.0, 9.0)])),
                ..Default::default()
            },
        );

        let VersionAction::Create { name, layout: new_layout, .. } = &revision.action else {
            panic!("expected a new version");
        };
        assert_eq!(name, "Blog v2");
        assert_eq!(*new_layout, layout(&[("A", 0.0, 0.0)]));
        assert!(revision.title_changed);
    }

    #[test]
    fn test_title_only_change_regenerates_meta() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                title: Some("Shop".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(revision.action, VersionAction::Keep);
        assert_eq!(revision.regeneration(), Regeneration::MetaOnly);
    }

    #[test]
    fn test_same_title_after_trim_is_unchanged() {
        let (model, latest) = stored();
        let revision = classify(
            &model,
            &latest,
            ProposedChange {
                title: Some("  Blog\n".to_string()),
                ..Default::default()
            },
        );

        assert!(!revision.title_changed);
        assert_eq!(revision.regeneration(), Regeneration::None);
    }

    #[test]
    fn test_blank_scalars_are_not_provided() {
        assert_eq!(trimmed(Some("   ")), None);
        assert_eq!(trimmed(Some(" a ")), Some("a".to_string()));
        assert_eq!(trimmed(None), None);
    }

    proptest! {
        #[test]
        fn prop_scalar_edits_never_create_versions(
            title in "[ a-zA-Z]{0,12}",
            description in "[ a-zA-Z]{0,12}",
        ) {
            let (model, latest) = stored();
            let revision = classify(&model, &latest, ProposedChange {
                title: Some(title),
                description: Some(description),
                graph: Some(latest.graph.clone()),
                layout: Some(latest.layout.clone()),
                ..Default::default()
            });
            prop_assert_eq!(revision.action, VersionAction::Keep);
        }

        #[test]
        fn prop_layout_only_never_bumps_version(
            ax in -500i32..500, ay in -500i32..500,
            bx in -500i32..500, by in -500i32..500,
        ) {
            let (model, latest) = stored();
            let proposed = layout(&[
                ("A", f64::from(ax), f64::from(ay)),
                ("B", f64::from(bx), f64::from(by)),
            ]);
            let revision = classify(&model, &latest, ProposedChange {
                layout: Some(proposed),
                ..Default::default()
            });
            let is_create = matches!(revision.action, VersionAction::Create { .. });
            prop_assert!(!is_create);
        }
    }
}
