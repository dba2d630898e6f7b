// In-process model cache
//
// Owned by the server state and shared read-only between handlers. The only
// mutation is replacing the cached entry, done through `get`/`invalidate`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{ModelResolver, ResolvedModel};
use crate::errors::{Result, ServiceError};

/// How long a loaded model is served before resolving again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Load once, keep until manually invalidated
    Startup,
    /// Re-resolve after the given age
    Ttl(Duration),
    /// Resolve and load on every call
    PerRequest,
}

impl CachePolicy {
    /// Parse `startup`, `ttl` or `per_request`; `ttl` uses `ttl_seconds`
    pub fn parse(name: &str, ttl_seconds: u64) -> Result<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "startup" => Ok(CachePolicy::Startup),
            "ttl" => Ok(CachePolicy::Ttl(Duration::from_secs(ttl_seconds))),
            "per_request" => Ok(CachePolicy::PerRequest),
            other => Err(ServiceError::Validation(format!(
                "unknown cache policy '{}' (expected startup, ttl or per_request)",
                other
            ))),
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::Startup => write!(f, "startup"),
            CachePolicy::Ttl(ttl) => write!(f, "ttl({}s)", ttl.as_secs()),
            CachePolicy::PerRequest => write!(f, "per_request"),
        }
    }
}

impl FromStr for CachePolicy {
    type Err = ServiceError;

    /// Accepts `startup`, `per_request`, `ttl` (300s) or `ttl:<seconds>`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((name, secs)) => {
                let secs: u64 = secs.trim().parse().map_err(|_| {
                    ServiceError::Validation(format!("invalid ttl seconds in '{}'", s))
                })?;
                Self::parse(name, secs)
            }
            None => Self::parse(s, 300),
        }
    }
}

struct CachedEntry {
    model: Arc<ResolvedModel>,
    loaded_at: Instant,
}

/// Cached view of the resolver
pub struct ModelCache {
    resolver: Arc<ModelResolver>,
    policy: CachePolicy,
    slot: RwLock<Option<CachedEntry>>,
}

impl ModelCache {
    pub fn new(resolver: Arc<ModelResolver>, policy: CachePolicy) -> Self {
        Self {
            resolver,
            policy,
            slot: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn resolver(&self) -> &Arc<ModelResolver> {
        &self.resolver
    }

    /// Current model according to the cache policy
    pub async fn get(&self) -> Result<Arc<ResolvedModel>> {
        if self.policy == CachePolicy::PerRequest {
            let model = Arc::new(self.load().await?);
            self.store(model.clone()).await;
            return Ok(model);
        }

        {
            let slot = self.slot.read().await;
            if let Some(entry) = slot.as_ref().filter(|e| self.is_fresh(e)) {
                return Ok(entry.model.clone());
            }
        }

        let mut slot = self.slot.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(entry) = slot.as_ref().filter(|e| self.is_fresh(e)) {
            return Ok(entry.model.clone());
        }

        match self.load().await {
            Ok(model) => {
                let model = Arc::new(model);
                *slot = Some(CachedEntry {
                    model: model.clone(),
                    loaded_at: Instant::now(),
                });
                Ok(model)
            }
            Err(e) => match slot.as_ref() {
                Some(stale) => {
                    tracing::warn!(
                        error = %e,
                        run_id = %stale.model.run_id(),
                        age_secs = stale.loaded_at.elapsed().as_secs(),
                        "Model refresh failed, serving stale model"
                    );
                    Ok(stale.model.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Resolve at startup so the first request does not pay for loading.
    /// Failure is logged, not fatal: the server reports 503 until a model appears.
    pub async fn warm(&self) {
        match self.get().await {
            Ok(model) => tracing::info!(
                run_id = %model.run_id(),
                policy = %self.policy,
                "Model cache warmed"
            ),
            Err(e) => tracing::warn!(error = %e, "No model available at startup"),
        }
    }

    /// Drop the cached entry; the next `get` resolves again
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        if let Some(entry) = slot.take() {
            tracing::info!(run_id = %entry.model.run_id(), "Invalidated cached model");
        }
    }

    /// Invalidate then resolve immediately
    pub async fn reload(&self) -> Result<Arc<ResolvedModel>> {
        self.invalidate().await;
        self.get().await
    }

    fn is_fresh(&self, entry: &CachedEntry) -> bool {
        match self.policy {
            CachePolicy::Startup => true,
            CachePolicy::Ttl(ttl) => entry.loaded_at.elapsed() < ttl,
            CachePolicy::PerRequest => false,
        }
    }

    async fn store(&self, model: Arc<ResolvedModel>) {
        *self.slot.write().await = Some(CachedEntry {
            model,
            loaded_at: Instant::now(),
        });
    }

    /// Resolution touches the filesystem, so it runs on the blocking pool
    async fn load(&self) -> Result<ResolvedModel> {
        let resolver = self.resolver.clone();
        tokio::task::spawn_blocking(move || resolver.resolve())
            .await
            .map_err(|e| ServiceError::Load(format!("resolution task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("startup".parse::<CachePolicy>().unwrap(), CachePolicy::Startup);
        assert_eq!(
            "per-request".parse::<CachePolicy>().unwrap(),
            CachePolicy::PerRequest
        );
        assert_eq!(
            "ttl:60".parse::<CachePolicy>().unwrap(),
            CachePolicy::Ttl(Duration::from_secs(60))
        );
        assert_eq!(
            CachePolicy::parse("ttl", 5).unwrap(),
            CachePolicy::Ttl(Duration::from_secs(5))
        );
        assert!("forever".parse::<CachePolicy>().is_err());
        assert!("ttl:soon".parse::<CachePolicy>().is_err());
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(CachePolicy::Ttl(Duration::from_secs(30)).to_string(), "ttl(30s)");
        assert_eq!(CachePolicy::PerRequest.to_string(), "per_request");
    }
}
