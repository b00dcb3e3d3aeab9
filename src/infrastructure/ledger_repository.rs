use crate::domain::models::ScheduledNotificationRecord;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::{KeyValueStore, KEY_SCHEDULED_NOTIFICATIONS};
use std::sync::Arc;

/// Persisted record of every notification currently registered with the OS.
pub trait LedgerRepository: Send + Sync {
    /// A ledger that was never written loads as empty.
    fn load(&self) -> Result<Vec<ScheduledNotificationRecord>, InfraError>;
    fn save(&self, records: &[ScheduledNotificationRecord]) -> Result<(), InfraError>;
}

#[derive(Clone)]
pub struct KeyValueLedgerRepository {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueLedgerRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl LedgerRepository for KeyValueLedgerRepository {
    fn load(&self) -> Result<Vec<ScheduledNotificationRecord>, InfraError> {
        let Some(raw) = self.store.get(KEY_SCHEDULED_NOTIFICATIONS)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|error| {
            InfraError::Persistence(format!("invalid scheduled notification ledger: {error}"))
        })
    }

    fn save(&self, records: &[ScheduledNotificationRecord]) -> Result<(), InfraError> {
        let payload = serde_json::to_string(records)?;
        self.store
            .set(KEY_SCHEDULED_NOTIFICATIONS, &payload)
            .map_err(|error| InfraError::Persistence(error.to_string()))
    }
}
