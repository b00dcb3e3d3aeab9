use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Lookup failed: {0}")]
    Lookup(String),
    #[error("Persistence failed: {0}")]
    Persistence(String),
    #[error("Notification permission denied")]
    PermissionDenied,
    #[error("Scheduling failed: {0}")]
    Scheduling(String),
}
