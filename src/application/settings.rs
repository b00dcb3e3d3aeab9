use crate::domain::models::{Language, Settings, Theme};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::{
    KeyValueStore, KEY_LANGUAGE, KEY_NOTIFICATIONS_ENABLED, KEY_THEME,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub revision: u64,
    pub loaded: bool,
    pub settings: Settings,
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    changes: watch::Sender<SettingsSnapshot>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = watch::channel(SettingsSnapshot::default());
        Self { store, changes }
    }

    pub fn subscribe(&self) -> watch::Receiver<SettingsSnapshot> {
        self.changes.subscribe()
    }

    pub fn settings(&self) -> Settings {
        self.changes.borrow().settings
    }

    pub fn language(&self) -> Language {
        self.settings().language
    }

    pub fn theme(&self) -> Theme {
        self.settings().theme
    }

    pub fn notifications_enabled(&self) -> bool {
        self.settings().notifications_enabled
    }

    pub fn is_loaded(&self) -> bool {
        self.changes.borrow().loaded
    }

    /// Missing or unrecognized stored values keep their defaults.
    pub fn load(&self) {
        let mut settings = Settings::default();
        if let Some(language) = self.read(KEY_LANGUAGE, Language::parse) {
            settings.language = language;
        }
        if let Some(theme) = self.read(KEY_THEME, Theme::parse) {
            settings.theme = theme;
        }
        if let Some(enabled) = self.read(KEY_NOTIFICATIONS_ENABLED, parse_bool) {
            settings.notifications_enabled = enabled;
        }

        self.changes.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.loaded = true;
            snapshot.settings = settings;
        });
    }

    fn read<T>(&self, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(error) => {
                error!(key, error = %error, "failed to read setting");
                return None;
            }
        };
        let parsed = parse(raw.trim());
        if parsed.is_none() {
            debug!(key, value = %raw, "discarding unrecognized setting");
        }
        parsed
    }

    pub fn set_language(&self, language: Language) {
        self.update(KEY_LANGUAGE, language.as_str(), |settings| {
            settings.language = language
        });
    }

    pub fn set_theme(&self, theme: Theme) {
        self.update(KEY_THEME, theme.as_str(), |settings| settings.theme = theme);
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        let value = if enabled { "true" } else { "false" };
        self.update(KEY_NOTIFICATIONS_ENABLED, value, |settings| {
            settings.notifications_enabled = enabled
        });
    }

    fn update(&self, key: &str, value: &str, apply: impl FnOnce(&mut Settings)) {
        self.changes.send_if_modified(|snapshot| {
            let mut next = snapshot.settings;
            apply(&mut next);
            if next == snapshot.settings {
                return false;
            }
            snapshot.settings = next;
            snapshot.revision += 1;
            true
        });

        if let Err(error) = self.persist(key, value) {
            error!(key, error = %error, "failed to save setting");
        }
    }

    fn persist(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.store.set(key, value)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
