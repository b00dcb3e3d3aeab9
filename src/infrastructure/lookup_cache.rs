use crate::domain::models::{CelebrationDate, NamedayEntry};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::nameday_client::NamedayClient;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    pub today: Duration,
    pub month: Duration,
    pub search: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            today: Duration::hours(1),
            month: Duration::hours(24),
            search: Duration::days(7),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedValue<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
struct TtlMap<K, V> {
    entries: Mutex<HashMap<K, CachedValue<V>>>,
}

impl<K, V> Default for TtlMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    fn get_fresh(&self, key: &K, now: DateTime<Utc>, ttl: Duration) -> Result<Option<V>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::Lookup(format!("lookup cache lock poisoned: {error}")))?;
        Ok(entries
            .get(key)
            .filter(|cached| now - cached.fetched_at < ttl)
            .map(|cached| cached.value.clone()))
    }

    /// Stores `value` and evicts every entry that is no longer fresh.
    fn insert(&self, key: K, value: V, now: DateTime<Utc>, ttl: Duration) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::Lookup(format!("lookup cache lock poisoned: {error}")))?;
        entries.retain(|_, cached| now - cached.fetched_at < ttl);
        entries.insert(
            key,
            CachedValue {
                value,
                fetched_at: now,
            },
        );
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

/// Wraps a lookup client with per-endpoint time-to-live caching.
/// Failed lookups are never cached.
pub struct CachedNamedayClient<C: NamedayClient> {
    inner: Arc<C>,
    policy: FreshnessPolicy,
    now_provider: NowProvider,
    today: TtlMap<(), NamedayEntry>,
    months: TtlMap<Option<u32>, Vec<NamedayEntry>>,
    searches: TtlMap<String, Vec<CelebrationDate>>,
}

impl<C: NamedayClient> CachedNamedayClient<C> {
    pub fn new(inner: Arc<C>) -> Self {
        Self {
            inner,
            policy: FreshnessPolicy::default(),
            now_provider: Arc::new(Utc::now),
            today: TtlMap::default(),
            months: TtlMap::default(),
            searches: TtlMap::default(),
        }
    }

    pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }
}

#[async_trait]
impl<C: NamedayClient> NamedayClient for CachedNamedayClient<C> {
    async fn fetch_today(&self) -> Result<NamedayEntry, InfraError> {
        let now = (self.now_provider)();
        if let Some(cached) = self.today.get_fresh(&(), now, self.policy.today)? {
            return Ok(cached);
        }
        let fresh = self.inner.fetch_today().await?;
        self.today.insert((), fresh.clone(), now, self.policy.today)?;
        Ok(fresh)
    }

    async fn fetch_month(&self, month: Option<u32>) -> Result<Vec<NamedayEntry>, InfraError> {
        let now = (self.now_provider)();
        if let Some(cached) = self.months.get_fresh(&month, now, self.policy.month)? {
            return Ok(cached);
        }
        let fresh = self.inner.fetch_month(month).await?;
        self.months.insert(month, fresh.clone(), now, self.policy.month)?;
        Ok(fresh)
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<CelebrationDate>, InfraError> {
        let now = (self.now_provider)();
        let key = name.trim().to_string();
        if let Some(cached) = self.searches.get_fresh(&key, now, self.policy.search)? {
            return Ok(cached);
        }
        let fresh = self.inner.search_by_name(&key).await?;
        self.searches.insert(key, fresh.clone(), now, self.policy.search)?;
        Ok(fresh)
    }
}
