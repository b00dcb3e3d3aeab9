//! Reminder scheduling for favorite names.
//!
//! A full reconciliation cancels everything the app has registered with the
//! OS, recomputes the desired one-shot reminders from the favorites list and
//! rebuilds the ledger from scratch. Runs are serialized; a run that is
//! superseded by a newer request before it acquires the lock is skipped.

use crate::domain::messages::{notification_body, notification_title};
use crate::domain::models::{
    CelebrationOccurrence, FavoriteEntity, Language, NotificationContent, NotificationData,
    NotificationRequest, ScheduledNotificationRecord,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ledger_repository::LedgerRepository;
use crate::infrastructure::nameday_client::NamedayClient;
use crate::infrastructure::notifier::{LocalNotifier, NotificationChannel, PermissionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::infrastructure::lookup_cache::NowProvider;

/// How many years ahead to look for a month/day that exists (Feb 29).
const OCCURRENCE_SEARCH_YEARS: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderClock {
    pub timezone: Tz,
    pub notify_time: NaiveTime,
}

impl ReminderClock {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timezone: config.timezone,
            notify_time: config.notify_time,
        }
    }

    fn at(&self, date: NaiveDate) -> Option<DateTime<Tz>> {
        let naive = date.and_time(self.notify_time);
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                // Local time skipped by a DST transition: fire an hour later.
                let shifted = naive + chrono::Duration::hours(1);
                self.timezone.from_local_datetime(&shifted).earliest()
            })
    }

    /// The first reminder time-of-day on `occurrence`'s month/day that is
    /// strictly after `now`, starting with the current local year.
    pub fn next_occurrence(
        &self,
        occurrence: CelebrationOccurrence,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Tz>> {
        let current_year = now.with_timezone(&self.timezone).year();
        (current_year..=current_year + OCCURRENCE_SEARCH_YEARS)
            .filter_map(|year| NaiveDate::from_ymd_opt(year, occurrence.month, occurrence.day))
            .filter_map(|date| self.at(date))
            .find(|candidate| candidate.with_timezone(&Utc) > now)
    }

    /// Reminder time `days_before` calendar days ahead of `occurrence_at`.
    pub fn notify_at(&self, occurrence_at: DateTime<Tz>, days_before: u32) -> Option<DateTime<Tz>> {
        let date = occurrence_at
            .date_naive()
            .checked_sub_days(Days::new(u64::from(days_before)))?;
        self.at(date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scheduled: usize,
    pub skipped_past: usize,
    pub failed_schedules: usize,
    /// Favorites whose celebration could not be resolved (lookup failure,
    /// no search result, or an invalid date).
    pub unresolved_favorites: Vec<String>,
    pub permission_denied: bool,
    /// The existing schedule could not be cleared; nothing was changed.
    pub cancel_failed: bool,
    pub superseded: bool,
}

/// The operations the rest of the app needs from the reminder scheduler.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn schedule_all(
        &self,
        favorites: &[FavoriteEntity],
        notifications_enabled: bool,
        language: Language,
    ) -> ReconcileReport;

    /// Returns how many ledger entries were removed.
    async fn cancel_for_favorite(&self, name: &str) -> usize;
}

pub struct NotificationService<C, N, L>
where
    C: NamedayClient,
    N: LocalNotifier,
    L: LedgerRepository,
{
    lookup_client: Arc<C>,
    notifier: Arc<N>,
    ledger: Arc<L>,
    clock: ReminderClock,
    channel: NotificationChannel,
    now_provider: NowProvider,
    reconcile_lock: AsyncMutex<()>,
    latest_request: AtomicU64,
}

impl<C, N, L> NotificationService<C, N, L>
where
    C: NamedayClient,
    N: LocalNotifier,
    L: LedgerRepository,
{
    pub fn new(lookup_client: Arc<C>, notifier: Arc<N>, ledger: Arc<L>, config: &AppConfig) -> Self {
        Self {
            lookup_client,
            notifier,
            ledger,
            clock: ReminderClock::from_config(config),
            channel: NotificationChannel::reminders(&config.channel),
            now_provider: Arc::new(Utc::now),
            reconcile_lock: AsyncMutex::new(()),
            latest_request: AtomicU64::new(0),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Asks for permission only when it is not already granted, then
    /// registers the reminder channel.
    pub async fn ensure_notification_permission(&self) -> Result<(), InfraError> {
        let mut status = self.notifier.permission_status().await?;
        if status != PermissionStatus::Granted {
            status = self.notifier.request_permission().await?;
        }
        if status != PermissionStatus::Granted {
            return Err(InfraError::PermissionDenied);
        }

        if let Err(error) = self.notifier.ensure_channel(&self.channel).await {
            warn!(channel = %self.channel.id, error = %error, "failed to register notification channel");
        }
        Ok(())
    }

    pub async fn scheduled_notification_count(&self) -> Result<usize, InfraError> {
        Ok(self.notifier.list_scheduled().await?.len())
    }

    pub async fn schedule_all(
        &self,
        favorites: &[FavoriteEntity],
        notifications_enabled: bool,
        language: Language,
    ) -> ReconcileReport {
        let request = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.reconcile_lock.lock().await;
        if self.latest_request.load(Ordering::SeqCst) != request {
            debug!(request, "reconciliation superseded by a newer request");
            return ReconcileReport {
                superseded: true,
                ..ReconcileReport::default()
            };
        }

        self.reconcile(favorites, notifications_enabled, language).await
    }

    async fn reconcile(
        &self,
        favorites: &[FavoriteEntity],
        notifications_enabled: bool,
        language: Language,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        // The ledger must keep matching the OS schedule, so a failed bulk
        // cancel leaves both untouched.
        if let Err(error) = self.notifier.cancel_all().await {
            error!(error = %error, "bulk cancel of scheduled notifications failed");
            report.cancel_failed = true;
            return report;
        }
        self.persist_ledger(&[]);

        if !notifications_enabled || favorites.is_empty() {
            debug!(notifications_enabled, favorites = favorites.len(), "nothing to schedule");
            return report;
        }

        match self.ensure_notification_permission().await {
            Ok(()) => {}
            Err(InfraError::PermissionDenied) => {
                info!("notification permission not granted; skipping reminders");
                report.permission_denied = true;
                return report;
            }
            Err(error) => {
                warn!(error = %error, "could not determine notification permission");
                report.permission_denied = true;
                return report;
            }
        }

        let now = (self.now_provider)();
        let mut records = Vec::new();
        for favorite in favorites.iter().filter(|favorite| favorite.wants_notifications()) {
            self.schedule_favorite(favorite, language, now, &mut records, &mut report)
                .await;
        }

        report.scheduled = records.len();
        self.persist_ledger(&records);
        info!(
            scheduled = report.scheduled,
            skipped_past = report.skipped_past,
            unresolved = report.unresolved_favorites.len(),
            "scheduled name day reminders"
        );
        report
    }

    async fn schedule_favorite(
        &self,
        favorite: &FavoriteEntity,
        language: Language,
        now: DateTime<Utc>,
        records: &mut Vec<ScheduledNotificationRecord>,
        report: &mut ReconcileReport,
    ) {
        let occurrence_at = match self.resolve_next_occurrence(&favorite.name, now).await {
            Ok(Some(occurrence_at)) => occurrence_at,
            Ok(None) => {
                debug!(favorite = %favorite.name, "no celebration found");
                report.unresolved_favorites.push(favorite.name.clone());
                return;
            }
            Err(error) => {
                warn!(favorite = %favorite.name, error = %error, "celebration lookup failed");
                report.unresolved_favorites.push(favorite.name.clone());
                return;
            }
        };
        let celebration_date = occurrence_at.with_timezone(&Utc);

        let offsets: BTreeSet<u32> = favorite.notify_offsets.iter().copied().collect();
        for days_before in offsets {
            let Some(notify_at) = self
                .clock
                .notify_at(occurrence_at, days_before)
                .map(|value| value.with_timezone(&Utc))
                .filter(|value| *value > now)
            else {
                report.skipped_past += 1;
                continue;
            };

            let request = NotificationRequest {
                content: NotificationContent {
                    title: notification_title(language, &favorite.name),
                    body: notification_body(language, &favorite.name, days_before),
                    data: NotificationData {
                        favorite_name: favorite.name.clone(),
                        celebration_date,
                    },
                    sound: true,
                },
                trigger_at: notify_at,
                channel_id: Some(self.channel.id.clone()),
            };

            match self.notifier.schedule(request).await {
                Ok(id) => records.push(ScheduledNotificationRecord {
                    id,
                    favorite_name: favorite.name.clone(),
                    celebration_date,
                    days_before,
                }),
                Err(error) => {
                    warn!(
                        favorite = %favorite.name,
                        days_before,
                        error = %error,
                        "failed to schedule reminder"
                    );
                    report.failed_schedules += 1;
                }
            }
        }
    }

    async fn resolve_next_occurrence(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Tz>>, InfraError> {
        let results = self.lookup_client.search_by_name(name).await?;
        let Some(main) = results.first() else {
            return Ok(None);
        };
        let occurrence = main.occurrence();
        occurrence.validate().map_err(InfraError::Lookup)?;
        Ok(self.clock.next_occurrence(occurrence, now))
    }

    pub async fn cancel_for_favorite(&self, name: &str) -> usize {
        let _guard = self.reconcile_lock.lock().await;
        let ledger = match self.ledger.load() {
            Ok(ledger) => ledger,
            Err(error) => {
                error!(favorite = %name, error = %error, "failed to load notification ledger");
                return 0;
            }
        };

        let (matching, remaining): (Vec<_>, Vec<_>) = ledger
            .into_iter()
            .partition(|record| record.favorite_name == name);
        if matching.is_empty() {
            return 0;
        }

        for record in &matching {
            if let Err(error) = self.notifier.cancel(&record.id).await {
                warn!(favorite = %name, id = %record.id, error = %error, "failed to cancel reminder");
            }
        }

        self.persist_ledger(&remaining);
        debug!(favorite = %name, cancelled = matching.len(), "cancelled reminders for favorite");
        matching.len()
    }

    fn persist_ledger(&self, records: &[ScheduledNotificationRecord]) {
        if let Err(error) = self.ledger.save(records) {
            error!(entries = records.len(), error = %error, "failed to persist notification ledger");
        }
    }
}

#[async_trait]
impl<C, N, L> NotificationScheduler for NotificationService<C, N, L>
where
    C: NamedayClient,
    N: LocalNotifier,
    L: LedgerRepository,
{
    async fn schedule_all(
        &self,
        favorites: &[FavoriteEntity],
        notifications_enabled: bool,
        language: Language,
    ) -> ReconcileReport {
        NotificationService::schedule_all(self, favorites, notifications_enabled, language).await
    }

    async fn cancel_for_favorite(&self, name: &str) -> usize {
        NotificationService::cancel_for_favorite(self, name).await
    }
}
