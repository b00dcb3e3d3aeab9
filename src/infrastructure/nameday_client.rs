use crate::domain::models::{CelebrationDate, NamedayEntry};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

/// Read-only access to the name-day data source. Implementations never retry;
/// callers decide what a failed lookup means.
#[async_trait]
pub trait NamedayClient: Send + Sync {
    async fn fetch_today(&self) -> Result<NamedayEntry, InfraError>;

    /// `None` asks for the current month.
    async fn fetch_month(&self, month: Option<u32>) -> Result<Vec<NamedayEntry>, InfraError>;

    /// Results are ordered; the first one is the main celebration.
    async fn search_by_name(&self, name: &str) -> Result<Vec<CelebrationDate>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestNamedayClient {
    client: Client,
    base_url: Url,
}

impl ReqwestNamedayClient {
    pub fn new(base_url: &str) -> Result<Self, InfraError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid nameday api url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(
                "nameday api url cannot be a base".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| InfraError::Lookup("nameday api url cannot be a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("nameday api error: http {}", status.as_u16())
        } else {
            format!("nameday api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Lookup(message)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, InfraError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| InfraError::Lookup(format!("network error while fetching {what}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Lookup(format!("failed reading {what} response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|error| InfraError::Lookup(format!("invalid {what} payload: {error}; body={body}")))
    }
}

#[async_trait]
impl NamedayClient for ReqwestNamedayClient {
    async fn fetch_today(&self) -> Result<NamedayEntry, InfraError> {
        let url = self.endpoint(&["today"])?;
        self.get_json(url, "today").await
    }

    async fn fetch_month(&self, month: Option<u32>) -> Result<Vec<NamedayEntry>, InfraError> {
        let url = match month {
            Some(month) if (1..=12).contains(&month) => {
                self.endpoint(&["month", &month.to_string()])?
            }
            Some(month) => {
                return Err(InfraError::Lookup(format!("month out of range: {month}")));
            }
            None => self.endpoint(&["month"])?,
        };
        self.get_json(url, "month").await
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<CelebrationDate>, InfraError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&["search", name])?;
        self.get_json(url, "search").await
    }
}
