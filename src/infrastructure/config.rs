use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

const APP_JSON: &str = "app.json";

pub const DEFAULT_API_BASE_URL: &str = "https://eortologio.iliasdev.com";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Athens;
pub const DEFAULT_CHANNEL_ID: &str = "namedays";
pub const DEFAULT_CHANNEL_NAME: &str = "Name Day Reminders";

fn default_notify_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub timezone: Tz,
    pub notify_time: NaiveTime,
    pub channel: ChannelConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timezone: DEFAULT_TIMEZONE,
            notify_time: default_notify_time(),
            channel: ChannelConfig {
                id: DEFAULT_CHANNEL_ID.to_string(),
                name: DEFAULT_CHANNEL_NAME.to_string(),
            },
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([(
        APP_JSON,
        serde_json::json!({
            "schema": 1,
            "apiBaseUrl": DEFAULT_API_BASE_URL,
            "timezone": DEFAULT_TIMEZONE.name(),
            "notifyTime": "09:00",
            "channel": {
                "id": DEFAULT_CHANNEL_ID,
                "name": DEFAULT_CHANNEL_NAME
            }
        }),
    )])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn non_empty_str<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let defaults = AppConfig::default();

    let api_base_url = match non_empty_str(&app, "/apiBaseUrl") {
        Some(raw) if url::Url::parse(raw).is_ok() => raw.to_string(),
        Some(raw) => {
            warn!(value = raw, "ignoring invalid apiBaseUrl");
            defaults.api_base_url
        }
        None => defaults.api_base_url,
    };

    let timezone = match non_empty_str(&app, "/timezone") {
        Some(raw) => raw.parse::<Tz>().unwrap_or_else(|_| {
            warn!(value = raw, "ignoring unknown timezone");
            defaults.timezone
        }),
        None => defaults.timezone,
    };

    let notify_time = match non_empty_str(&app, "/notifyTime") {
        Some(raw) => NaiveTime::parse_from_str(raw, "%H:%M").unwrap_or_else(|_| {
            warn!(value = raw, "ignoring notifyTime that is not HH:MM");
            defaults.notify_time
        }),
        None => defaults.notify_time,
    };

    let channel = ChannelConfig {
        id: non_empty_str(&app, "/channel/id")
            .map(ToOwned::to_owned)
            .unwrap_or(defaults.channel.id),
        name: non_empty_str(&app, "/channel/name")
            .map(ToOwned::to_owned)
            .unwrap_or(defaults.channel.name),
    };

    Ok(AppConfig {
        api_base_url,
        timezone,
        notify_time,
        channel,
    })
}
