//! In-memory store with optional JSON snapshot persistence.

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use modelshot_core::{
    asset::ImageAsset,
    identifier::{ModelId, Slug, VersionId},
    record::{ContentModel, ModelWithLatest, Version},
};

use super::{ListQuery, ModelUpdate, Page, Store, StoreError, VersionWrite};

#[derive(Debug, Default)]
struct Tables {
    models: HashMap<ModelId, ContentModel>,
    /// Versions per model, ordered by number.
    versions: HashMap<ModelId, Vec<Version>>,
}

/// On-disk form of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    models: Vec<ContentModel>,
    versions: Vec<Version>,
}

impl From<Snapshot> for Tables {
    fn from(snapshot: Snapshot) -> Self {
        let mut versions: HashMap<ModelId, Vec<Version>> = HashMap::new();
        for version in snapshot.versions {
            versions.entry(version.model_id).or_default().push(version);
        }
        for history in versions.values_mut() {
            history.sort_by_key(|v| v.number);
        }

        Self {
            models: snapshot.models.into_iter().map(|m| (m.id, m)).collect(),
            versions,
        }
    }
}

impl From<&Tables> for Snapshot {
    fn from(tables: &Tables) -> Self {
        let mut models: Vec<_> = tables.models.values().cloned().collect();
        models.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let versions = models
            .iter()
            .filter_map(|m| tables.versions.get(&m.id))
            .flatten()
            .cloned()
            .collect();

        Self { models, versions }
    }
}

/// A [`Store`] kept in memory behind a read-write lock.
///
/// The CLI loads it from a JSON snapshot at start-up and saves it back when
/// a command finishes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path:? = path; "Store snapshot not found, starting empty");
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        info!(
            path:? = path,
            models = snapshot.models.len(),
            versions = snapshot.versions.len();
            "Loaded store snapshot"
        );

        Ok(Self {
            tables: RwLock::new(snapshot.into()),
        })
    }

    /// Writes the whole store to a snapshot file, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = Snapshot::from(&*self.read()?);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        debug!(path:? = path, models = snapshot.models.len(); "Saved store snapshot");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

fn missing(what: &'static str, id: impl ToString) -> StoreError {
    StoreError::Missing {
        what,
        id: id.to_string(),
    }
}

/// Newest first, ties broken by id so the order is stable.
fn newest_first(models: &mut [&ContentModel]) {
    models.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

impl Store for MemoryStore {
    fn create_model(&self, model: ContentModel, first: Version) -> Result<(), StoreError> {
        let mut tables = self.write()?;

        if tables.models.contains_key(&model.id) {
            return Err(StoreError::Conflict(format!("model {} already exists", model.id)));
        }
        if tables.models.values().any(|m| m.slug == model.slug) {
            return Err(StoreError::Conflict(format!("slug {} is taken", model.slug)));
        }
        if first.number != 1 || first.model_id != model.id {
            return Err(StoreError::Conflict(
                "the first version must be number 1 of the new model".to_string(),
            ));
        }

        tables.versions.insert(model.id, vec![first]);
        tables.models.insert(model.id, model);
        Ok(())
    }

    fn model_by_id(&self, id: ModelId) -> Result<Option<ContentModel>, StoreError> {
        Ok(self.read()?.models.get(&id).cloned())
    }

    fn model_by_slug(&self, slug: &Slug) -> Result<Option<ContentModel>, StoreError> {
        Ok(self
            .read()?
            .models
            .values()
            .find(|m| m.slug == *slug)
            .cloned())
    }

    fn latest_version(&self, id: ModelId) -> Result<Option<Version>, StoreError> {
        Ok(self
            .read()?
            .versions
            .get(&id)
            .and_then(|history| history.last())
            .cloned())
    }

    fn versions(&self, id: ModelId) -> Result<Vec<Version>, StoreError> {
        Ok(self.read()?.versions.get(&id).cloned().unwrap_or_default())
    }

    fn apply_update(&self, update: ModelUpdate) -> Result<ModelWithLatest, StoreError> {
        let mut tables = self.write()?;
        let Tables { models, versions } = &mut *tables;

        let model = models
            .get_mut(&update.model_id)
            .ok_or_else(|| missing("content model", update.model_id))?;
        let history = versions
            .get_mut(&update.model_id)
            .filter(|history| !history.is_empty())
            .ok_or_else(|| missing("version of content model", update.model_id))?;

        // Validate the version write before touching anything.
        let latest_number = history.last().map_or(0, |v| v.number);
        if let VersionWrite::Insert(version) = &update.version {
            if version.number != latest_number + 1 || version.model_id != update.model_id {
                return Err(StoreError::Conflict(format!(
                    "expected version {} of model {}, got version {}",
                    latest_number + 1,
                    update.model_id,
                    version.number
                )));
            }
        }

        match update.version {
            VersionWrite::Keep => {}
            VersionWrite::PatchLayout(layout) => {
                if let Some(latest) = history.last_mut() {
                    latest.layout = layout;
                    latest.updated_at = update.updated_at;
                }
            }
            VersionWrite::Insert(version) => history.push(version),
        }

        if let Some(title) = update.title {
            model.title = title;
        }
        if let Some(description) = update.description {
            model.description = description;
        }
        if let Some(visibility) = update.visibility {
            model.visibility = visibility;
        }
        model.updated_at = update.updated_at;

        let latest = history
            .last()
            .cloned()
            .ok_or_else(|| missing("version of content model", update.model_id))?;
        Ok(ModelWithLatest {
            model: model.clone(),
            latest,
        })
    }

    fn set_meta_image(&self, id: ModelId, asset: ImageAsset) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let model = tables
            .models
            .get_mut(&id)
            .ok_or_else(|| missing("content model", id))?;
        model.meta_image = Some(asset);
        Ok(())
    }

    fn set_version_images(
        &self,
        version: VersionId,
        image: ImageAsset,
        no_connections: ImageAsset,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let target = tables
            .versions
            .values_mut()
            .flatten()
            .find(|v| v.id == version)
            .ok_or_else(|| missing("version", version))?;

        target.image = Some(image);
        target.image_no_connections = Some(no_connections);
        Ok(())
    }

    fn delete_model(&self, id: ModelId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.models.contains_key(&id) {
            return Err(missing("content model", id));
        }

        let removed = tables.versions.remove(&id).map_or(0, |h| h.len());
        tables.models.remove(&id);
        debug!(model:% = id, versions = removed; "Deleted content model");
        Ok(())
    }

    fn list_models(&self, query: &ListQuery) -> Result<Page<ContentModel>, StoreError> {
        let tables = self.read()?;
        let mut matching: Vec<&ContentModel> =
            tables.models.values().filter(|m| query.matches(m)).collect();
        newest_first(&mut matching);

        let total = matching.len();
        let items: Vec<ContentModel> = matching
            .into_iter()
            .skip(query.offset())
            .take(query.count() as usize)
            .cloned()
            .collect();

        Ok(Page {
            has_next: query.offset() + items.len() < total,
            has_prev: query.page() > 1,
            total,
            items,
        })
    }

    fn recent_models(&self, limit: usize) -> Result<Vec<ContentModel>, StoreError> {
        let tables = self.read()?;
        let mut models: Vec<&ContentModel> = tables.models.values().collect();
        newest_first(&mut models);
        Ok(models.into_iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    use modelshot_core::{
        geometry::Point,
        graph::ContentGraph,
        identifier::UserId,
        layout::Layout,
        visibility::Visibility,
    };

    use super::*;

    fn record(title: &str, visibility: Visibility, age_minutes: i64) -> (ContentModel, Version) {
        let created = Utc::now() - Duration::minutes(age_minutes);
        let model = ContentModel {
            id: ModelId::new(),
            slug: Slug::generate(),
            title: title.to_string(),
            description: format!("About {title}"),
            owner: UserId::new("owner"),
            visibility,
            meta_image: None,
            created_at: created,
            updated_at: created,
        };
        let version = Version {
            id: VersionId::new(),
            model_id: model.id,
            number: 1,
            name: title.to_string(),
            graph: ContentGraph::default(),
            layout: Layout::new(),
            author: UserId::new("owner"),
            image: None,
            image_no_connections: None,
            created_at: created,
            updated_at: created,
        };
        (model, version)
    }

    fn insert(store: &MemoryStore, title: &str, visibility: Visibility, age: i64) -> ContentModel {
        let (model, version) = record(title, visibility, age);
        store.create_model(model.clone(), version).unwrap();
        model
    }

    #[test]
    fn test_create_rejects_duplicate_slug() {
        let store = MemoryStore::new();
        let first = insert(&store, "Blog", Visibility::Public, 0);

        let (mut model, mut version) = record("Shop", Visibility::Public, 0);
        model.slug = first.slug.clone();
        version.model_id = model.id;
        assert!(matches!(
            store.create_model(model, version),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_apply_update_rejects_version_gap() {
        let store = MemoryStore::new();
        let model = insert(&store, "Blog", Visibility::Public, 0);
        let mut next = store.latest_version(model.id).unwrap().unwrap();
        next.id = VersionId::new();
        next.number = 3;

        let result = store.apply_update(ModelUpdate {
            model_id: model.id,
            title: Some("Changed".to_string()),
            description: None,
            visibility: None,
            version: VersionWrite::Insert(next),
            updated_at: Utc::now(),
        });

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.model_by_id(model.id).unwrap().unwrap().title, "Blog");
    }

    #[test]
    fn test_patch_layout_touches_only_latest() {
        let store = MemoryStore::new();
        let model = insert(&store, "Blog", Visibility::Public, 0);
        let layout: Layout = [("A", Point::new(0.0, 0.0))].into_iter().collect();

        let updated = store
            .apply_update(ModelUpdate {
                model_id: model.id,
                title: None,
                description: None,
                visibility: Some(Visibility::Private),
                version: VersionWrite::PatchLayout(layout.clone()),
                updated_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(updated.latest.number, 1);
        assert_eq!(updated.latest.layout, layout);
        assert_eq!(updated.model.visibility, Visibility::Private);
        assert_eq!(store.versions(model.id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_cascades_versions() {
        let store = MemoryStore::new();
        let model = insert(&store, "Blog", Visibility::Public, 0);

        store.delete_model(model.id).unwrap();
        assert!(store.model_by_id(model.id).unwrap().is_none());
        assert!(store.versions(model.id).unwrap().is_empty());
        assert!(matches!(
            store.delete_model(model.id),
            Err(StoreError::Missing { .. })
        ));
    }

    #[test]
    fn test_list_pages_newest_first() {
        let store = MemoryStore::new();
        for (i, title) in ["Oldest", "Middle", "Newest"].iter().enumerate() {
            insert(&store, title, Visibility::Public, 30 - i as i64 * 10);
        }
        insert(&store, "Hidden", Visibility::Unlisted, 0);

        let first = store
            .list_models(&ListQuery::new(Visibility::Public).with_count(2))
            .unwrap();
        let titles: Vec<_> = first.items.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest", "Middle"]);
        assert_eq!(first.total, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let second = store
            .list_models(&ListQuery::new(Visibility::Public).with_count(2).with_page(2))
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_next);
        assert!(second.has_prev);
    }

    #[test]
    fn test_list_search_is_case_insensitive() {
        let store = MemoryStore::new();
        insert(&store, "Recipe Blog", Visibility::Public, 0);
        insert(&store, "Shop", Visibility::Public, 0);

        let page = store
            .list_models(
                &ListQuery::new(Visibility::Public).with_search(Some("BLOG".to_string())),
            )
            .unwrap();
        assert_eq!(page.total, 1);

        let page = store
            .list_models(
                &ListQuery::new(Visibility::Public).with_search(Some("about shop".to_string())),
            )
            .unwrap();
        assert_eq!(page.items[0].title, "Shop");
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = MemoryStore::new();
        let model = insert(&store, "Blog", Visibility::Unlisted, 0);
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.model_by_slug(&model.slug).unwrap(), Some(model.clone()));
        assert_eq!(loaded.latest_version(model.id).unwrap().unwrap().number, 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.recent_models(10).unwrap().is_empty());
    }
}
