//! Cache for collaborator lookups with Redis primary and local fallback
//!
//! The cache must never fail a caller: every internal error is logged and
//! mapped to miss behavior (`None` for get, no-op success for set/delete).
//! The Redis backend is initialized lazily on first use with a short connect
//! timeout; if it cannot be reached, the cache falls back permanently to a
//! bounded in-process store so later calls do not pay the connection attempt
//! again.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{OnceCell, RwLock};

use crate::model::SourceMatch;

// Environment variable names
const ENV_REDIS_HOST: &str = "ORIGINALITY_REDIS_HOST";
const ENV_REDIS_PORT: &str = "ORIGINALITY_REDIS_PORT";
const ENV_REDIS_PASSWORD: &str = "ORIGINALITY_REDIS_PASSWORD";
const ENV_REDIS_DB: &str = "ORIGINALITY_REDIS_DB";
const ENV_CACHE_TTL: &str = "ORIGINALITY_CACHE_TTL";

// Default values
const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
const DEFAULT_REDIS_PORT: &str = "6379";
const DEFAULT_REDIS_DB: &str = "0";
const DEFAULT_TTL_SECONDS: u64 = 3600; // 1 hour

/// TTL for model-judgment entries (similarity scores, authorship verdicts).
/// Model outputs for identical inputs are stable enough to keep for a week.
const JUDGMENT_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Connect timeout for the initial Redis reachability probe
const CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Entry cap for the in-process fallback store
const LOCAL_CAPACITY: usize = 1024;

// Cache key prefixes
const PREFIX_SOURCES: &str = "sources:";
const PREFIX_SCORE: &str = "score:";
const PREFIX_AUTHORSHIP: &str = "authorship:";

#[derive(Debug, Clone)]
struct CacheSettings {
    redis_url: String,
    ttl_seconds: u64,
}

impl CacheSettings {
    /// Configuration via environment variables:
    /// - `ORIGINALITY_REDIS_HOST` - Redis host (default: 127.0.0.1)
    /// - `ORIGINALITY_REDIS_PORT` - Redis port (default: 6379)
    /// - `ORIGINALITY_REDIS_PASSWORD` - Redis password (default: none)
    /// - `ORIGINALITY_REDIS_DB` - Redis database number (default: 0)
    /// - `ORIGINALITY_CACHE_TTL` - default cache TTL in seconds (default: 3600)
    fn from_env() -> Self {
        let host = env::var(ENV_REDIS_HOST).unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string());
        let port = env::var(ENV_REDIS_PORT).unwrap_or_else(|_| DEFAULT_REDIS_PORT.to_string());
        let password = env::var(ENV_REDIS_PASSWORD).ok();
        let db = env::var(ENV_REDIS_DB).unwrap_or_else(|_| DEFAULT_REDIS_DB.to_string());

        let ttl_seconds = env::var(ENV_CACHE_TTL)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECONDS);

        // Build Redis URL: redis://[password@]host:port/db
        let redis_url = match password {
            Some(pwd) if !pwd.is_empty() => format!("redis://:{}@{}:{}/{}", pwd, host, port, db),
            _ => format!("redis://{}:{}/{}", host, port, db),
        };

        Self {
            redis_url,
            ttl_seconds,
        }
    }
}

enum Backend {
    Redis(redis::Client),
    Local(LocalStore),
}

impl Backend {
    fn kind(&self) -> &'static str {
        match self {
            Backend::Redis(_) => "redis",
            Backend::Local(_) => "local",
        }
    }
}

/// Bounded in-process store used when Redis is unreachable
struct LocalStore {
    entries: RwLock<HashMap<String, LocalEntry>>,
    capacity: usize,
}

struct LocalEntry {
    value: String,
    expires_at: Instant,
    inserted_at: Instant,
}

impl LocalStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if entries.len() >= self.capacity && !entries.contains_key(key) {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.capacity {
                // Still full after dropping expired entries: evict the oldest
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            LocalEntry {
                value,
                expires_at: now + ttl,
                inserted_at: now,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Cache shared across pipeline runs and across chunks within one run
///
/// Cheap to clone; clones share the backend decision and the local store.
#[derive(Clone)]
pub struct AnalysisCache {
    settings: CacheSettings,
    backend: Arc<OnceCell<Backend>>,
}

impl AnalysisCache {
    /// Create a cache configured from the environment. No connection is
    /// attempted until the first get/set.
    pub fn from_env() -> Self {
        Self {
            settings: CacheSettings::from_env(),
            backend: Arc::new(OnceCell::new()),
        }
    }

    /// Create a cache that uses only the in-process store. Used in tests and
    /// when a deployment runs without Redis on purpose.
    pub fn local_only() -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Backend::Local(LocalStore::new(LOCAL_CAPACITY)));
        Self {
            settings: CacheSettings {
                redis_url: String::new(),
                ttl_seconds: DEFAULT_TTL_SECONDS,
            },
            backend: Arc::new(cell),
        }
    }

    /// Which backend the cache is using: "redis", "local", or "uninitialized"
    pub fn backend_kind(&self) -> &'static str {
        self.backend
            .get()
            .map(Backend::kind)
            .unwrap_or("uninitialized")
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.ttl_seconds)
    }

    pub fn judgment_ttl(&self) -> Duration {
        Duration::from_secs(JUDGMENT_TTL_SECONDS)
    }

    // Typed helpers used by the chunk analyzer and the pipeline

    pub async fn get_sources(&self, key: &str) -> Option<Vec<SourceMatch>> {
        self.get(&format!("{}{}", PREFIX_SOURCES, key)).await
    }

    pub async fn set_sources(&self, key: &str, sources: &[SourceMatch]) {
        self.set(
            &format!("{}{}", PREFIX_SOURCES, key),
            &sources.to_vec(),
            self.default_ttl(),
        )
        .await;
    }

    pub async fn get_score(&self, key: &str) -> Option<f64> {
        self.get(&format!("{}{}", PREFIX_SCORE, key)).await
    }

    pub async fn set_score(&self, key: &str, score: f64) {
        self.set(&format!("{}{}", PREFIX_SCORE, key), &score, self.judgment_ttl())
            .await;
    }

    pub async fn get_authorship<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(&format!("{}{}", PREFIX_AUTHORSHIP, key)).await
    }

    pub async fn set_authorship<T: Serialize>(&self, key: &str, value: &T) {
        self.set(
            &format!("{}{}", PREFIX_AUTHORSHIP, key),
            value,
            self.judgment_ttl(),
        )
        .await;
    }

    /// Get a cached value; any backend failure is logged and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = match self.resolve_backend().await {
            Backend::Redis(client) => match Self::redis_get(client, key).await {
                Ok(value) => value?,
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Cache get failed, treating as miss");
                    return None;
                }
            },
            Backend::Local(store) => store.get(key).await?,
        };

        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Cached value failed to deserialize, treating as miss");
                None
            }
        }
    }

    /// Store a value with the given TTL; failures are logged and swallowed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Failed to serialize cache value, skipping");
                return;
            }
        };

        match self.resolve_backend().await {
            Backend::Redis(client) => {
                if let Err(e) = Self::redis_set(client, key, &json, ttl).await {
                    tracing::debug!(key = %key, error = %e, "Cache set failed, skipping");
                }
            }
            Backend::Local(store) => store.set(key, json, ttl).await,
        }
    }

    /// Remove a key; failures are logged and swallowed.
    pub async fn delete(&self, key: &str) {
        match self.resolve_backend().await {
            Backend::Redis(client) => {
                if let Err(e) = Self::redis_delete(client, key).await {
                    tracing::debug!(key = %key, error = %e, "Cache delete failed, skipping");
                }
            }
            Backend::Local(store) => store.delete(key).await,
        }
    }

    /// Decide the backend once for the process lifetime: probe Redis within
    /// the connect timeout, otherwise fall back to the local store.
    async fn resolve_backend(&self) -> &Backend {
        self.backend
            .get_or_init(|| async {
                match Self::probe_redis(&self.settings.redis_url).await {
                    Ok(client) => {
                        tracing::info!("Redis cache backend established");
                        Backend::Redis(client)
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Redis unavailable, falling back to in-process cache for the process lifetime"
                        );
                        Backend::Local(LocalStore::new(LOCAL_CAPACITY))
                    }
                }
            })
            .await
    }

    async fn probe_redis(redis_url: &str) -> Result<redis::Client, String> {
        let client = redis::Client::open(redis_url).map_err(|e| e.to_string())?;

        let ping = async {
            let mut conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| e.to_string())?;
            let pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<String, String>(pong)
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, ping).await {
            Ok(Ok(_)) => Ok(client),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(format!(
                "connect timed out after {}ms",
                CONNECT_TIMEOUT.as_millis()
            )),
        }
    }

    async fn redis_get(client: &redis::Client, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    async fn redis_set(
        client: &redis::Client,
        key: &str,
        json: &str,
        ttl: Duration,
    ) -> Result<(), redis::RedisError> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, json, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn redis_delete(client: &redis::Client, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
