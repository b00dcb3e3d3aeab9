use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Day offsets offered when picking how early to be reminded.
pub const OFFSET_PRESETS: [u32; 7] = [0, 1, 2, 3, 5, 7, 14];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    El,
    En,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::El => "el",
            Self::En => "en",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "el" => Some(Self::El),
            "en" => Some(Self::En),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Settings {
    pub language: Language,
    pub theme: Theme,
    pub notifications_enabled: bool,
}

/// A name the user follows. `name` is the primary key and is compared
/// exactly (case-sensitive) after trimming at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntity {
    pub name: String,
    pub notify_enabled: bool,
    #[serde(rename = "notifyTimings")]
    pub notify_offsets: Vec<u32>,
}

impl FavoriteEntity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            notify_enabled: true,
            notify_offsets: vec![0],
        }
    }

    pub fn wants_notifications(&self) -> bool {
        self.notify_enabled && !self.notify_offsets.is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "favorite.name")?;
        if self.name.trim() != self.name {
            return Err("favorite.name must be trimmed".to_string());
        }
        Ok(())
    }
}

/// Sorts and deduplicates offsets; an empty selection falls back to `[0]`.
pub fn normalize_offsets(offsets: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let unique: BTreeSet<u32> = offsets.into_iter().collect();
    if unique.is_empty() {
        return vec![0];
    }
    unique.into_iter().collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedayEntry {
    pub day: u32,
    pub month: u32,
    #[serde(default)]
    pub celebrating_names: Vec<String>,
    #[serde(default)]
    pub saints: Vec<String>,
    #[serde(default)]
    pub other_info: Vec<String>,
    #[serde(default)]
    pub names_with_other_dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CelebrationDate {
    pub day: u32,
    pub month: u32,
    #[serde(default)]
    pub date_str: String,
    #[serde(default)]
    pub saint_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saint_url: Option<String>,
    #[serde(default)]
    pub related_names: Vec<String>,
}

impl CelebrationDate {
    pub fn occurrence(&self) -> CelebrationOccurrence {
        CelebrationOccurrence {
            month: self.month,
            day: self.day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CelebrationOccurrence {
    pub month: u32,
    pub day: u32,
}

impl CelebrationOccurrence {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=12).contains(&self.month) {
            return Err(format!("occurrence.month out of range: {}", self.month));
        }
        if !(1..=31).contains(&self.day) {
            return Err(format!("occurrence.day out of range: {}", self.day));
        }
        Ok(())
    }
}

/// Ledger entry tying an OS notification handle back to the favorite and
/// offset that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotificationRecord {
    pub id: String,
    pub favorite_name: String,
    pub celebration_date: DateTime<Utc>,
    pub days_before: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub favorite_name: String,
    pub celebration_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub sound: bool,
}

/// A one-shot notification handed to the OS capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRequest {
    pub content: NotificationContent,
    pub trigger_at: DateTime<Utc>,
    pub channel_id: Option<String>,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_favorite_is_trimmed_and_notifies_same_day() {
        let favorite = FavoriteEntity::new("  Maria ");
        assert_eq!(favorite.name, "Maria");
        assert!(favorite.notify_enabled);
        assert_eq!(favorite.notify_offsets, vec![0]);
        assert!(favorite.validate().is_ok());
    }

    #[test]
    fn favorite_validate_rejects_blank_name() {
        let favorite = FavoriteEntity::new("   ");
        assert!(favorite.validate().is_err());
    }

    #[test]
    fn favorite_uses_notify_timings_on_the_wire() {
        let raw = r#"[{"name":"Nikos","notifyEnabled":false,"notifyTimings":[1,7]}]"#;
        let parsed: Vec<FavoriteEntity> = serde_json::from_str(raw).expect("parse favorites");
        assert_eq!(parsed[0].name, "Nikos");
        assert!(!parsed[0].notify_enabled);
        assert_eq!(parsed[0].notify_offsets, vec![1, 7]);

        let encoded = serde_json::to_value(&parsed[0]).expect("encode favorite");
        assert_eq!(encoded["notifyTimings"], serde_json::json!([1, 7]));
        assert_eq!(encoded["notifyEnabled"], serde_json::json!(false));
    }

    #[test]
    fn ledger_record_reads_millisecond_timestamps() {
        let raw = r#"{"id":"n-1","favoriteName":"Maria","celebrationDate":"2026-08-15T06:00:00.000Z","daysBefore":7}"#;
        let record: ScheduledNotificationRecord = serde_json::from_str(raw).expect("parse record");
        assert_eq!(record.favorite_name, "Maria");
        assert_eq!(record.days_before, 7);
        assert_eq!(record.celebration_date.to_rfc3339(), "2026-08-15T06:00:00+00:00");
    }

    #[test]
    fn search_result_tolerates_missing_optional_fields() {
        let raw = r#"{"day":15,"month":8,"date_str":"15 Αυγούστου","saint_description":"Κοίμηση της Θεοτόκου"}"#;
        let parsed: CelebrationDate = serde_json::from_str(raw).expect("parse celebration");
        assert!(parsed.saint_url.is_none());
        assert!(parsed.related_names.is_empty());
        assert_eq!(parsed.occurrence(), CelebrationOccurrence { month: 8, day: 15 });
    }

    #[test]
    fn occurrence_validate_checks_ranges() {
        assert!(CelebrationOccurrence { month: 2, day: 29 }.validate().is_ok());
        assert!(CelebrationOccurrence { month: 0, day: 1 }.validate().is_err());
        assert!(CelebrationOccurrence { month: 12, day: 32 }.validate().is_err());
    }

    #[test]
    fn language_and_theme_parse_only_known_values() {
        assert_eq!(Language::parse("en"), Some(Language::En));
        assert_eq!(Language::parse("EN"), None);
        assert_eq!(Theme::parse("dark"), Some(Theme::Dark));
        assert_eq!(Theme::parse("sepia"), None);
        assert_eq!(Settings::default().language, Language::El);
        assert!(!Settings::default().notifications_enabled);
    }

    proptest! {
        #[test]
        fn normalized_offsets_are_sorted_unique_and_never_empty(
            offsets in proptest::collection::vec(0u32..30, 0..12)
        ) {
            let normalized = normalize_offsets(offsets.clone());

            prop_assert!(!normalized.is_empty());
            prop_assert!(normalized.windows(2).all(|pair| pair[0] < pair[1]));
            if offsets.is_empty() {
                prop_assert_eq!(normalized, vec![0]);
            } else {
                for offset in &offsets {
                    prop_assert!(normalized.contains(offset));
                }
            }
        }
    }
}
