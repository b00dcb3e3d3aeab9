use crate::application::notifications::NotificationScheduler;
use crate::domain::models::{normalize_offsets, FavoriteEntity};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::{KeyValueStore, KEY_FAVORITES};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// Observable view of the favorites list. `revision` changes on every
/// mutation, so observers can tell list identity apart from list content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesSnapshot {
    pub revision: u64,
    pub loaded: bool,
    pub favorites: Arc<Vec<FavoriteEntity>>,
}

/// In-memory favorites list with write-through persistence. The in-memory
/// list stays authoritative when a write fails.
pub struct FavoriteStore {
    store: Arc<dyn KeyValueStore>,
    scheduler: Arc<dyn NotificationScheduler>,
    changes: watch::Sender<FavoritesSnapshot>,
    persisted_revision: Mutex<u64>,
}

impl FavoriteStore {
    pub fn new(store: Arc<dyn KeyValueStore>, scheduler: Arc<dyn NotificationScheduler>) -> Self {
        let (changes, _) = watch::channel(FavoritesSnapshot::default());
        Self {
            store,
            scheduler,
            changes,
            persisted_revision: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FavoritesSnapshot> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> FavoritesSnapshot {
        self.changes.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.changes.borrow().loaded
    }

    /// Reads the persisted list. Unreadable storage leaves the list empty;
    /// the store counts as loaded either way.
    pub fn load(&self) {
        let favorites = match self.read_persisted() {
            Ok(favorites) => favorites,
            Err(error) => {
                error!(error = %error, "failed to load favorites");
                Vec::new()
            }
        };

        self.changes.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.loaded = true;
            snapshot.favorites = Arc::new(favorites);
        });
    }

    fn read_persisted(&self) -> Result<Vec<FavoriteEntity>, InfraError> {
        let Some(raw) = self.store.get(KEY_FAVORITES)? else {
            return Ok(Vec::new());
        };
        let parsed: Vec<FavoriteEntity> = serde_json::from_str(&raw)?;

        let mut seen = HashSet::new();
        Ok(parsed
            .into_iter()
            .filter(|favorite| match favorite.validate() {
                Ok(()) => seen.insert(favorite.name.clone()),
                Err(reason) => {
                    warn!(reason = %reason, "dropping invalid stored favorite");
                    false
                }
            })
            .map(|mut favorite| {
                favorite.notify_offsets = normalize_offsets(favorite.notify_offsets);
                favorite
            })
            .collect())
    }

    pub fn list(&self) -> Vec<FavoriteEntity> {
        self.changes.borrow().favorites.as_ref().clone()
    }

    pub fn get(&self, name: &str) -> Option<FavoriteEntity> {
        let name = name.trim();
        self.changes
            .borrow()
            .favorites
            .iter()
            .find(|favorite| favorite.name == name)
            .cloned()
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        let name = name.trim();
        self.changes
            .borrow()
            .favorites
            .iter()
            .any(|favorite| favorite.name == name)
    }

    /// Returns `false` when the trimmed name is blank or already present.
    pub fn add(&self, name: &str) -> bool {
        let favorite = FavoriteEntity::new(name);
        if favorite.validate().is_err() {
            return false;
        }
        self.mutate(|favorites| {
            if favorites.iter().any(|existing| existing.name == favorite.name) {
                return false;
            }
            favorites.push(favorite);
            true
        })
    }

    /// Cancels the favorite's scheduled reminders, then drops it.
    pub async fn remove(&self, name: &str) -> bool {
        let name = name.trim();
        let cancelled = self.scheduler.cancel_for_favorite(name).await;
        debug!(favorite = %name, cancelled, "removing favorite");
        self.mutate(|favorites| {
            let before = favorites.len();
            favorites.retain(|favorite| favorite.name != name);
            favorites.len() != before
        })
    }

    /// Returns the new enabled state, or `None` for an unknown name.
    pub fn toggle_notify(&self, name: &str) -> Option<bool> {
        let name = name.trim();
        let mut toggled = None;
        self.mutate(|favorites| {
            let Some(favorite) = favorites.iter_mut().find(|favorite| favorite.name == name) else {
                return false;
            };
            favorite.notify_enabled = !favorite.notify_enabled;
            toggled = Some(favorite.notify_enabled);
            true
        });
        toggled
    }

    pub fn set_offsets(&self, name: &str, offsets: &[u32]) -> bool {
        let name = name.trim();
        let offsets = normalize_offsets(offsets.iter().copied());
        self.mutate(|favorites| {
            let Some(favorite) = favorites.iter_mut().find(|favorite| favorite.name == name) else {
                return false;
            };
            favorite.notify_offsets = offsets;
            true
        })
    }

    /// Adds `offset` when absent, removes it when present. Removing the last
    /// offset leaves `[0]`.
    pub fn toggle_offset(&self, name: &str, offset: u32) -> Option<Vec<u32>> {
        let name = name.trim();
        let mut updated = None;
        self.mutate(|favorites| {
            let Some(favorite) = favorites.iter_mut().find(|favorite| favorite.name == name) else {
                return false;
            };
            let mut offsets = favorite.notify_offsets.clone();
            if offsets.contains(&offset) {
                offsets.retain(|existing| *existing != offset);
            } else {
                offsets.push(offset);
            }
            favorite.notify_offsets = normalize_offsets(offsets);
            updated = Some(favorite.notify_offsets.clone());
            true
        });
        updated
    }

    pub fn clear_all(&self) {
        self.mutate(|favorites| {
            favorites.clear();
            true
        });
    }

    fn mutate(&self, apply: impl FnOnce(&mut Vec<FavoriteEntity>) -> bool) -> bool {
        let mut committed = None;
        self.changes.send_if_modified(|snapshot| {
            let mut favorites = snapshot.favorites.as_ref().clone();
            if !apply(&mut favorites) {
                return false;
            }
            snapshot.revision += 1;
            snapshot.favorites = Arc::new(favorites);
            committed = Some((snapshot.revision, Arc::clone(&snapshot.favorites)));
            true
        });

        let Some((revision, favorites)) = committed else {
            return false;
        };
        self.persist(revision, &favorites);
        true
    }

    fn persist(&self, revision: u64, favorites: &[FavoriteEntity]) {
        let Ok(mut persisted) = self.persisted_revision.lock() else {
            error!("favorites persistence lock poisoned");
            return;
        };
        if *persisted > revision {
            return;
        }

        let result = serde_json::to_string(favorites)
            .map_err(InfraError::from)
            .and_then(|payload| self.store.set(KEY_FAVORITES, &payload));
        match result {
            Ok(()) => *persisted = revision,
            Err(error) => error!(revision, error = %error, "failed to save favorites"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notifications::ReconcileReport;
    use crate::domain::models::Language;
    use crate::infrastructure::key_value_store::InMemoryKeyValueStore;
    use async_trait::async_trait;

    #[derive(Default)]
    struct CancelRecorder {
        favorites: Mutex<Option<watch::Receiver<FavoritesSnapshot>>>,
        cancelled: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl NotificationScheduler for CancelRecorder {
        async fn schedule_all(
            &self,
            _favorites: &[FavoriteEntity],
            _notifications_enabled: bool,
            _language: Language,
        ) -> ReconcileReport {
            ReconcileReport::default()
        }

        async fn cancel_for_favorite(&self, name: &str) -> usize {
            let still_listed = self
                .favorites
                .lock()
                .expect("receiver lock")
                .as_ref()
                .map(|receiver| receiver.borrow().favorites.iter().any(|favorite| favorite.name == name))
                .unwrap_or(false);
            self.cancelled
                .lock()
                .expect("cancel lock")
                .push((name.to_string(), still_listed));
            1
        }
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, InfraError> {
            Err(InfraError::Persistence("disk unavailable".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), InfraError> {
            Err(InfraError::Persistence("disk unavailable".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), InfraError> {
            Err(InfraError::Persistence("disk unavailable".to_string()))
        }
    }

    fn store_with(kv: Arc<dyn KeyValueStore>) -> (FavoriteStore, Arc<CancelRecorder>) {
        let recorder = Arc::new(CancelRecorder::default());
        let store = FavoriteStore::new(kv, recorder.clone());
        *recorder.favorites.lock().expect("receiver lock") = Some(store.subscribe());
        store.load();
        (store, recorder)
    }

    #[test]
    fn add_trims_and_ignores_duplicates() {
        let (store, _) = store_with(Arc::new(InMemoryKeyValueStore::default()));

        assert!(store.add("  Maria "));
        assert!(!store.add("Maria"));
        assert!(!store.add("   "));
        assert!(store.add("maria"));

        assert!(store.is_favorite(" Maria"));
        assert_eq!(store.list().len(), 2);
        let maria = store.get("Maria").expect("maria exists");
        assert!(maria.notify_enabled);
        assert_eq!(maria.notify_offsets, vec![0]);
    }

    #[test]
    fn mutations_are_persisted_and_reloaded() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::default());
        let (store, _) = store_with(Arc::clone(&kv));
        store.add("Maria");
        store.add("Nikos");
        assert_eq!(store.toggle_notify("Nikos"), Some(false));
        assert!(store.set_offsets("Maria", &[7, 0, 7]));

        let (reloaded, _) = store_with(kv);
        let favorites = reloaded.list();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].notify_offsets, vec![0, 7]);
        assert!(!favorites[1].notify_enabled);
    }

    #[test]
    fn toggle_offset_never_leaves_an_empty_set() {
        let (store, _) = store_with(Arc::new(InMemoryKeyValueStore::default()));
        store.add("Maria");

        assert_eq!(store.toggle_offset("Maria", 7), Some(vec![0, 7]));
        assert_eq!(store.toggle_offset("Maria", 0), Some(vec![7]));
        assert_eq!(store.toggle_offset("Maria", 7), Some(vec![0]));
        assert_eq!(store.toggle_offset("Nobody", 1), None);
        assert!(store.set_offsets("Maria", &[]));
        assert_eq!(store.get("Maria").expect("maria").notify_offsets, vec![0]);
    }

    #[tokio::test]
    async fn remove_cancels_reminders_before_dropping_the_favorite() {
        let (store, recorder) = store_with(Arc::new(InMemoryKeyValueStore::default()));
        store.add("Maria");
        store.add("Nikos");

        assert!(store.remove("Maria").await);

        assert_eq!(
            recorder.cancelled.lock().expect("cancel lock").clone(),
            vec![("Maria".to_string(), true)]
        );
        assert!(!store.is_favorite("Maria"));
        assert!(store.is_favorite("Nikos"));
    }

    #[test]
    fn every_mutation_bumps_the_revision() {
        let (store, _) = store_with(Arc::new(InMemoryKeyValueStore::default()));
        let loaded = store.snapshot();
        assert!(loaded.loaded);

        store.add("Maria");
        let added = store.snapshot().revision;
        assert!(added > loaded.revision);

        assert!(!store.add("Maria"));
        assert_eq!(store.snapshot().revision, added);

        store.clear_all();
        assert!(store.snapshot().revision > added);
        assert!(store.list().is_empty());
    }

    #[test]
    fn storage_failures_keep_the_in_memory_list() {
        let (store, _) = store_with(Arc::new(FailingStore));
        assert!(store.is_loaded());

        assert!(store.add("Maria"));
        assert!(store.is_favorite("Maria"));
    }

    #[test]
    fn invalid_and_duplicate_stored_entries_are_dropped() {
        let kv = Arc::new(InMemoryKeyValueStore::default());
        kv.set(
            KEY_FAVORITES,
            r#"[{"name":"Maria","notifyEnabled":true,"notifyTimings":[0]},
                {"name":"Maria","notifyEnabled":false,"notifyTimings":[1]},
                {"name":"  ","notifyEnabled":true,"notifyTimings":[0]}]"#,
        )
        .expect("seed favorites");

        let (store, _) = store_with(kv);
        let favorites = store.list();
        assert_eq!(favorites.len(), 1);
        assert!(favorites[0].notify_enabled);
    }

    #[tokio::test]
    async fn padded_names_reach_the_same_favorite_everywhere() {
        let (store, recorder) = store_with(Arc::new(InMemoryKeyValueStore::default()));
        store.add("Maria");

        assert!(store.get(" Maria ").is_some());
        assert_eq!(store.toggle_notify("Maria "), Some(false));
        assert!(store.set_offsets(" Maria", &[3]));
        assert_eq!(store.toggle_offset("\tMaria", 7), Some(vec![3, 7]));
        assert!(store.remove(" Maria ").await);

        assert_eq!(
            recorder.cancelled.lock().expect("cancel lock").clone(),
            vec![("Maria".to_string(), true)]
        );
        assert!(store.list().is_empty());
    }

    #[test]
    fn stored_offsets_are_normalized_on_load() {
        let kv = Arc::new(InMemoryKeyValueStore::default());
        kv.set(
            KEY_FAVORITES,
            r#"[{"name":"Maria","notifyEnabled":true,"notifyTimings":[]},
                {"name":"Nikos","notifyEnabled":true,"notifyTimings":[7,1,7]}]"#,
        )
        .expect("seed favorites");

        let (store, _) = store_with(kv);
        assert_eq!(store.get("Maria").expect("maria").notify_offsets, vec![0]);
        assert_eq!(store.get("Nikos").expect("nikos").notify_offsets, vec![1, 7]);
    }
}
