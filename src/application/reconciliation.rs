use crate::application::favorites::FavoritesSnapshot;
use crate::application::notifications::{NotificationScheduler, ReconcileReport};
use crate::application::settings::SettingsSnapshot;
use crate::domain::models::{FavoriteEntity, Language};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Inputs that require a full reconciliation when they change. Theme is
/// deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReconcileKey {
    favorites_revision: u64,
    notifications_enabled: bool,
    language: Language,
}

/// Re-runs the scheduler whenever favorites, the master switch or the
/// language change, once both stores have finished loading.
#[derive(Clone)]
pub struct ReconciliationTrigger {
    scheduler: Arc<dyn NotificationScheduler>,
    debounce: Duration,
}

impl ReconciliationTrigger {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>) -> Self {
        Self {
            scheduler,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub async fn on_relevant_change(
        &self,
        favorites: &[FavoriteEntity],
        notifications_enabled: bool,
        language: Language,
    ) -> ReconcileReport {
        self.scheduler
            .schedule_all(favorites, notifications_enabled, language)
            .await
    }

    /// Watches both stores until either side is dropped. Bursts of changes
    /// collapse into one run over the latest state.
    pub fn spawn(
        self,
        mut favorites: watch::Receiver<FavoritesSnapshot>,
        mut settings: watch::Receiver<SettingsSnapshot>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last_key: Option<ReconcileKey> = None;
            loop {
                let favorites_snapshot = favorites.borrow_and_update().clone();
                let settings_snapshot = *settings.borrow_and_update();

                if favorites_snapshot.loaded && settings_snapshot.loaded {
                    let key = ReconcileKey {
                        favorites_revision: favorites_snapshot.revision,
                        notifications_enabled: settings_snapshot.settings.notifications_enabled,
                        language: settings_snapshot.settings.language,
                    };
                    if last_key != Some(key) {
                        let report = self
                            .on_relevant_change(
                                &favorites_snapshot.favorites,
                                key.notifications_enabled,
                                key.language,
                            )
                            .await;
                        debug!(?report, "reconciliation finished");
                        last_key = Some(key);
                    }
                }

                let changed = tokio::select! {
                    result = favorites.changed() => result,
                    result = settings.changed() => result,
                };
                if changed.is_err() {
                    info!("reconciliation trigger stopped");
                    break;
                }
                if !self.debounce.is_zero() {
                    tokio::time::sleep(self.debounce).await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::favorites::FavoriteStore;
    use crate::application::settings::SettingsStore;
    use crate::domain::models::Theme;
    use crate::infrastructure::key_value_store::InMemoryKeyValueStore;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Run {
        names: Vec<String>,
        enabled: bool,
        language: Language,
    }

    struct RecordingScheduler {
        runs: mpsc::UnboundedSender<Run>,
    }

    #[async_trait]
    impl NotificationScheduler for RecordingScheduler {
        async fn schedule_all(
            &self,
            favorites: &[FavoriteEntity],
            notifications_enabled: bool,
            language: Language,
        ) -> ReconcileReport {
            let _ = self.runs.send(Run {
                names: favorites.iter().map(|favorite| favorite.name.clone()).collect(),
                enabled: notifications_enabled,
                language,
            });
            ReconcileReport::default()
        }

        async fn cancel_for_favorite(&self, _name: &str) -> usize {
            0
        }
    }

    struct Fixture {
        favorites: FavoriteStore,
        settings: SettingsStore,
        runs: mpsc::UnboundedReceiver<Run>,
        handle: JoinHandle<()>,
    }

    fn fixture() -> Fixture {
        let (sender, runs) = mpsc::unbounded_channel();
        let scheduler: Arc<dyn NotificationScheduler> = Arc::new(RecordingScheduler { runs: sender });
        let favorites = FavoriteStore::new(
            Arc::new(InMemoryKeyValueStore::default()),
            Arc::clone(&scheduler),
        );
        let settings = SettingsStore::new(Arc::new(InMemoryKeyValueStore::default()));
        let handle = ReconciliationTrigger::new(scheduler)
            .with_debounce(Duration::ZERO)
            .spawn(favorites.subscribe(), settings.subscribe());
        Fixture {
            favorites,
            settings,
            runs,
            handle,
        }
    }

    async fn next_run(runs: &mut mpsc::UnboundedReceiver<Run>) -> Run {
        timeout(Duration::from_secs(2), runs.recv())
            .await
            .expect("reconciliation ran")
            .expect("scheduler alive")
    }

    async fn assert_idle(runs: &mut mpsc::UnboundedReceiver<Run>) {
        assert!(timeout(Duration::from_millis(50), runs.recv()).await.is_err());
    }

    #[tokio::test]
    async fn waits_for_both_stores_to_load() {
        let mut fx = fixture();
        fx.favorites.load();
        assert_idle(&mut fx.runs).await;

        fx.settings.load();
        let run = next_run(&mut fx.runs).await;
        assert!(run.names.is_empty());
        assert!(!run.enabled);
        assert_eq!(run.language, Language::El);
        fx.handle.abort();
    }

    #[tokio::test]
    async fn reacts_to_favorites_switch_and_language_but_not_theme() {
        let mut fx = fixture();
        fx.favorites.load();
        fx.settings.load();
        next_run(&mut fx.runs).await;

        fx.favorites.add("Maria");
        assert_eq!(next_run(&mut fx.runs).await.names, vec!["Maria".to_string()]);

        fx.settings.set_notifications_enabled(true);
        assert!(next_run(&mut fx.runs).await.enabled);

        fx.settings.set_theme(Theme::Dark);
        assert_idle(&mut fx.runs).await;

        fx.settings.set_language(Language::En);
        assert_eq!(next_run(&mut fx.runs).await.language, Language::En);
        fx.handle.abort();
    }

    #[tokio::test]
    async fn converges_on_latest_state_after_a_burst() {
        let mut fx = fixture();
        fx.favorites.load();
        fx.settings.load();
        next_run(&mut fx.runs).await;

        fx.favorites.add("Maria");
        fx.favorites.add("Nikos");
        fx.favorites.toggle_offset("Maria", 7);
        fx.settings.set_notifications_enabled(true);

        let mut last = next_run(&mut fx.runs).await;
        while let Ok(Some(run)) = timeout(Duration::from_millis(50), fx.runs.recv()).await {
            last = run;
        }
        assert_eq!(last.names, vec!["Maria".to_string(), "Nikos".to_string()]);
        assert!(last.enabled);
        fx.handle.abort();
    }

    #[tokio::test]
    async fn stops_when_stores_are_dropped() {
        let fx = fixture();
        drop(fx.favorites);
        drop(fx.settings);
        timeout(Duration::from_secs(2), fx.handle)
            .await
            .expect("trigger exits")
            .expect("trigger task completed");
    }
}
