use crate::models::{CandidateScope, EntityType, StartupPosting, TalentProfile};
use crate::services::store::{ProfileRepository, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Multi-tier cache manager
///
/// Implements L1 (in-memory) and optional L2 (Redis) caching strategy.
/// L1 is fastest but limited in size, L2 is shared across instances.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a cache manager backed by Redis
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Some(Arc::new(tokio::sync::Mutex::new(redis))),
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        })
    }

    /// Create a process-local cache without an L2 tier
    pub fn local(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        }
    }

    fn build_l1(l1_size: u64, ttl_secs: u64) -> moka::future::Cache<String, Vec<u8>> {
        moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build()
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        // Try L1 cache first
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let Some(redis) = &self.redis else {
            tracing::trace!("Cache miss: {}", key);
            return Err(CacheError::CacheMiss(key.to_string()));
        };

        // Try L2 cache (Redis)
        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        if let Some(json) = value {
            tracing::trace!("L2 cache hit: {}", key);

            // Populate L1 cache
            let bytes = json.as_bytes().to_vec();
            self.l1_cache.insert(key.to_string(), bytes).await;

            return Ok(serde_json::from_str(&json)?);
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in cache (both tiers)
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        // Set in L1 cache (uses configured TTL)
        let bytes = json.as_bytes().to_vec();
        self.l1_cache.insert(key.to_string(), bytes).await;

        if let Some(redis) = &self.redis {
            // Set in L2 cache with explicit TTL
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Delete a value from both cache tiers
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            l2_enabled: self.redis.is_some(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub l2_enabled: bool,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a talent profile
    pub fn talent(talent_id: &str) -> String {
        format!("talent:{}", talent_id)
    }

    /// Build a cache key for a startup posting
    pub fn startup(startup_id: &str) -> String {
        format!("startup:{}", startup_id)
    }

    pub fn entity(entity_type: EntityType, id: &str) -> String {
        match entity_type {
            EntityType::Talent => Self::talent(id),
            EntityType::Startup => Self::startup(id),
        }
    }
}

/// Read-through cache in front of a profile repository
///
/// Only single-entity reads are cached. Bulk and candidate queries go
/// straight to the inner repository. Cache failures never fail a read.
pub struct CachedProfiles<R> {
    inner: R,
    cache: Arc<CacheManager>,
}

impl<R: ProfileRepository> CachedProfiles<R> {
    pub fn new(inner: R, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }

    /// Uncached repository underneath
    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn remember<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
    }
}

#[async_trait]
impl<R: ProfileRepository> ProfileRepository for CachedProfiles<R> {
    async fn get_talent(&self, talent_id: &str) -> Result<TalentProfile, StoreError> {
        let key = CacheKey::talent(talent_id);
        if let Ok(talent) = self.cache.get::<TalentProfile>(&key).await {
            return Ok(talent);
        }
        let talent = self.inner.get_talent(talent_id).await?;
        self.remember(&key, &talent).await;
        Ok(talent)
    }

    async fn get_startup(&self, startup_id: &str) -> Result<StartupPosting, StoreError> {
        let key = CacheKey::startup(startup_id);
        if let Ok(startup) = self.cache.get::<StartupPosting>(&key).await {
            return Ok(startup);
        }
        let startup = self.inner.get_startup(startup_id).await?;
        self.remember(&key, &startup).await;
        Ok(startup)
    }

    async fn get_talents(&self, talent_ids: &[String]) -> Result<Vec<TalentProfile>, StoreError> {
        self.inner.get_talents(talent_ids).await
    }

    async fn get_startups(&self, startup_ids: &[String]) -> Result<Vec<StartupPosting>, StoreError> {
        self.inner.get_startups(startup_ids).await
    }

    async fn startups_for_founder(&self, founder_id: &str) -> Result<Vec<StartupPosting>, StoreError> {
        self.inner.startups_for_founder(founder_id).await
    }

    async fn talent_candidates(&self, scope: &CandidateScope) -> Result<Vec<TalentProfile>, StoreError> {
        self.inner.talent_candidates(scope).await
    }

    async fn startup_candidates(&self, scope: &CandidateScope) -> Result<Vec<StartupPosting>, StoreError> {
        self.inner.startup_candidates(scope).await
    }

    async fn invalidate(&self, entity_type: EntityType, id: &str) {
        let key = CacheKey::entity(entity_type, id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!("Failed to invalidate {}: {}", key, e);
        }
        self.inner.invalidate(entity_type, id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, Commitment};
    use crate::services::memory::InMemoryProfiles;

    fn talent(id: &str, bio: &str) -> TalentProfile {
        TalentProfile {
            talent_id: id.to_string(),
            name: None,
            skills: vec!["rust".to_string()],
            availability: Availability::Consulting,
            commitment: Commitment::Advisor,
            bio: bio.to_string(),
            updated_at: None,
        }
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 60)
            .await
            .expect("Failed to create cache");

        let key = "test_key";
        let value = "test_value";

        cache.set(key, &value).await.unwrap();
        let result: String = cache.get(key).await.unwrap();
        assert_eq!(result, value);

        cache.delete(key).await.unwrap();
        assert!(cache.get::<String>(key).await.is_err());
    }

    #[tokio::test]
    async fn test_local_cache_set_get_delete() {
        let cache = CacheManager::local(100, 60);

        cache.set("k", &42u32).await.unwrap();
        assert_eq!(cache.get::<u32>("k").await.unwrap(), 42);
        assert!(!cache.stats().l2_enabled);

        cache.delete("k").await.unwrap();
        assert!(matches!(cache.get::<u32>("k").await, Err(CacheError::CacheMiss(_))));
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::talent("t1"), "talent:t1");
        assert_eq!(CacheKey::startup("s1"), "startup:s1");
        assert_eq!(CacheKey::entity(EntityType::Startup, "s1"), "startup:s1");
    }

    #[tokio::test]
    async fn test_cached_profiles_serve_stale_until_invalidated() {
        let inner = InMemoryProfiles::new();
        inner.put_talent(talent("t1", "first")).await;
        let cached = CachedProfiles::new(inner, Arc::new(CacheManager::local(100, 60)));

        assert_eq!(cached.get_talent("t1").await.unwrap().bio, "first");

        cached.inner.put_talent(talent("t1", "second")).await;
        assert_eq!(cached.get_talent("t1").await.unwrap().bio, "first");

        cached.invalidate(EntityType::Talent, "t1").await;
        assert_eq!(cached.get_talent("t1").await.unwrap().bio, "second");
    }
}
