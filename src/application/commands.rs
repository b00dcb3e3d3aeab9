use crate::application::bootstrap::bootstrap_workspace;
use crate::application::favorites::FavoriteStore;
use crate::application::notifications::{NotificationService, ReconcileReport};
use crate::application::reconciliation::ReconciliationTrigger;
use crate::application::settings::SettingsStore;
use crate::domain::models::{CelebrationDate, FavoriteEntity, NamedayEntry};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::{KeyValueStore, SqliteKeyValueStore};
use crate::infrastructure::ledger_repository::KeyValueLedgerRepository;
use crate::infrastructure::lookup_cache::CachedNamedayClient;
use crate::infrastructure::nameday_client::{NamedayClient, ReqwestNamedayClient};
use crate::infrastructure::notifier::LocalNotifier;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

type LookupClient = CachedNamedayClient<ReqwestNamedayClient>;
type Scheduler<N> = NotificationService<LookupClient, N, KeyValueLedgerRepository>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteOverview {
    #[serde(flatten)]
    pub favorite: FavoriteEntity,
    pub date_str: Option<String>,
}

/// Everything the presentation layer talks to, wired against one workspace
/// directory.
pub struct AppState<N: LocalNotifier + 'static> {
    config: AppConfig,
    database_path: PathBuf,
    lookup: Arc<LookupClient>,
    notifications: Arc<Scheduler<N>>,
    favorites: FavoriteStore,
    settings: SettingsStore,
}

impl<N: LocalNotifier + 'static> AppState<N> {
    pub fn new(workspace_root: &Path, notifier: Arc<N>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(workspace_root)?;
        let config = bootstrap.config;

        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path));
        let lookup = Arc::new(CachedNamedayClient::new(Arc::new(
            ReqwestNamedayClient::new(&config.api_base_url)?,
        )));
        let ledger = Arc::new(KeyValueLedgerRepository::new(Arc::clone(&store)));
        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&lookup),
            notifier,
            ledger,
            &config,
        ));

        let favorites = FavoriteStore::new(Arc::clone(&store), notifications.clone());
        let settings = SettingsStore::new(store);
        settings.load();
        favorites.load();

        info!(
            workspace = %workspace_root.display(),
            favorites = favorites.list().len(),
            "app state ready"
        );

        Ok(Self {
            config,
            database_path: bootstrap.database_path,
            lookup,
            notifications,
            favorites,
            settings,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn favorites(&self) -> &FavoriteStore {
        &self.favorites
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Keeps scheduled reminders in step with favorites and settings until
    /// the state is dropped.
    pub fn start_reconciliation(&self) -> JoinHandle<()> {
        ReconciliationTrigger::new(self.notifications.clone())
            .spawn(self.favorites.subscribe(), self.settings.subscribe())
    }
}

pub async fn today_namedays<N: LocalNotifier + 'static>(
    state: &AppState<N>,
) -> Result<NamedayEntry, InfraError> {
    state.lookup.fetch_today().await
}

pub async fn month_namedays<N: LocalNotifier + 'static>(
    state: &AppState<N>,
    month: Option<u32>,
) -> Result<Vec<NamedayEntry>, InfraError> {
    state.lookup.fetch_month(month).await
}

pub async fn search_namedays<N: LocalNotifier + 'static>(
    state: &AppState<N>,
    name: &str,
) -> Result<Vec<CelebrationDate>, InfraError> {
    state.lookup.search_by_name(name).await
}

/// Favorites paired with the display date of their main celebration, when
/// it can be looked up.
pub async fn list_favorite_overviews<N: LocalNotifier + 'static>(
    state: &AppState<N>,
) -> Vec<FavoriteOverview> {
    let mut overviews = Vec::new();
    for favorite in state.favorites.list() {
        let date_str = match state.lookup.search_by_name(&favorite.name).await {
            Ok(results) => results.into_iter().next().map(|main| main.date_str),
            Err(error) => {
                debug!(favorite = %favorite.name, error = %error, "no celebration date for overview");
                None
            }
        };
        overviews.push(FavoriteOverview { favorite, date_str });
    }
    overviews
}

pub async fn remove_favorite<N: LocalNotifier + 'static>(state: &AppState<N>, name: &str) -> bool {
    state.favorites.remove(name).await
}

/// Runs a full reconciliation against the current stores, outside the
/// change trigger.
pub async fn reschedule_notifications<N: LocalNotifier + 'static>(
    state: &AppState<N>,
) -> ReconcileReport {
    let favorites = state.favorites.list();
    let settings = state.settings.settings();
    state
        .notifications
        .schedule_all(&favorites, settings.notifications_enabled, settings.language)
        .await
}

pub async fn scheduled_notification_count<N: LocalNotifier + 'static>(
    state: &AppState<N>,
) -> Result<usize, InfraError> {
    state.notifications.scheduled_notification_count().await
}
