use crate::domain::models::NotificationRequest;
use crate::infrastructure::config::ChannelConfig;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelImportance {
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: ChannelImportance,
    pub vibration_pattern: Vec<u64>,
    pub light_color: String,
}

impl NotificationChannel {
    pub fn reminders(config: &ChannelConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            importance: ChannelImportance::High,
            vibration_pattern: vec![0, 250, 250, 250],
            light_color: "#0D5EAF".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    pub id: String,
    pub request: NotificationRequest,
}

/// The platform's local notification facility.
#[async_trait]
pub trait LocalNotifier: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus, InfraError>;

    async fn request_permission(&self) -> Result<PermissionStatus, InfraError>;

    /// Platforms without notification channels accept this as a no-op.
    async fn ensure_channel(&self, channel: &NotificationChannel) -> Result<(), InfraError>;

    /// Registers a one-shot notification and returns its handle.
    async fn schedule(&self, request: NotificationRequest) -> Result<String, InfraError>;

    /// Cancelling an unknown or already delivered handle succeeds.
    async fn cancel(&self, id: &str) -> Result<(), InfraError>;

    async fn cancel_all(&self) -> Result<(), InfraError>;

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>, InfraError>;
}

#[derive(Debug)]
struct NotifierState {
    permission: PermissionStatus,
    grant_on_request: bool,
    pending: Vec<ScheduledNotification>,
    delivered: Vec<ScheduledNotification>,
    channels: HashMap<String, NotificationChannel>,
}

/// Process-local notifier for hosts without a delivery backend.
#[derive(Debug)]
pub struct InMemoryNotifier {
    state: Mutex<NotifierState>,
    next_id: AtomicU64,
}

impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self::new(PermissionStatus::Undetermined, true)
    }
}

impl InMemoryNotifier {
    pub fn new(permission: PermissionStatus, grant_on_request: bool) -> Self {
        Self {
            state: Mutex::new(NotifierState {
                permission,
                grant_on_request,
                pending: Vec::new(),
                delivered: Vec::new(),
                channels: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, true)
    }

    pub fn denied() -> Self {
        Self::new(PermissionStatus::Denied, false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, NotifierState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::Scheduling(format!("notifier lock poisoned: {error}")))
    }

    /// Moves every pending notification due at or before `now` to the
    /// delivered list and returns them.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledNotification>, InfraError> {
        let mut state = self.lock()?;
        let (due, pending): (Vec<_>, Vec<_>) = state
            .pending
            .drain(..)
            .partition(|notification| notification.request.trigger_at <= now);
        state.pending = pending;
        state.delivered.extend(due.iter().cloned());
        Ok(due)
    }

    pub fn delivered(&self) -> Result<Vec<ScheduledNotification>, InfraError> {
        Ok(self.lock()?.delivered.clone())
    }

    pub fn channel(&self, id: &str) -> Result<Option<NotificationChannel>, InfraError> {
        Ok(self.lock()?.channels.get(id).cloned())
    }
}

#[async_trait]
impl LocalNotifier for InMemoryNotifier {
    async fn permission_status(&self) -> Result<PermissionStatus, InfraError> {
        Ok(self.lock()?.permission)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
        let mut state = self.lock()?;
        if state.permission != PermissionStatus::Granted {
            state.permission = if state.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        Ok(state.permission)
    }

    async fn ensure_channel(&self, channel: &NotificationChannel) -> Result<(), InfraError> {
        self.lock()?
            .channels
            .insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<String, InfraError> {
        let mut state = self.lock()?;
        if state.permission != PermissionStatus::Granted {
            return Err(InfraError::PermissionDenied);
        }
        if request.content.title.trim().is_empty() {
            return Err(InfraError::Scheduling(
                "notification title must not be empty".to_string(),
            ));
        }
        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("notification-{sequence}");
        state.pending.push(ScheduledNotification {
            id: id.clone(),
            request,
        });
        Ok(id)
    }

    async fn cancel(&self, id: &str) -> Result<(), InfraError> {
        self.lock()?.pending.retain(|notification| notification.id != id);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), InfraError> {
        self.lock()?.pending.clear();
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>, InfraError> {
        Ok(self.lock()?.pending.clone())
    }
}
