use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rolodex_db::StoreError;
use rolodex_db::models::NewUser;
use rolodex_types::models::User;
use tracing::{debug, error, warn};

use crate::cache::UserCache;
use crate::store::UserStore;

pub const DEFAULT_USER_TTL: Duration = Duration::from_secs(900);

/// Second invalidation after a write, for fills still in flight on other nodes.
const REINVALIDATE_DELAY: Duration = Duration::from_secs(1);

pub fn cache_key(email: &str) -> String {
    format!("user:{}", email)
}

/// Resolves users by email through the cache, and funnels every user
/// mutation through the store followed by a cache invalidation, so a cached
/// record never outlives a write.
///
/// Every write bumps `epoch` before it invalidates. A lookup only caches what
/// it read if no write landed while it was reading.
///
/// The store is the source of truth: cache failures are logged and the
/// lookup falls through to the store.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn UserCache>,
    ttl: Duration,
    epoch: Arc<AtomicU64>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn UserCache>, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ttl,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Misses are not cached.
    pub async fn resolve(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = cache_key(email);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => {
                    debug!("User cache hit for {}", email);
                    return Ok(Some(user));
                }
                Err(e) => warn!("Discarding corrupt cache entry {}: {}", key, e),
            },
            Ok(None) => debug!("User cache miss for {}", email),
            Err(e) => warn!("User cache read failed for {}: {}", key, e),
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let lookup = email.to_string();
        let Some(user) = self.blocking(move |store| store.find_by_email(&lookup)).await? else {
            return Ok(None);
        };

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("User write during lookup of {}, not caching", email);
            return Ok(Some(user));
        }

        match serde_json::to_string(&user) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, &raw, self.ttl).await {
                    warn!("User cache write failed for {}: {}", key, e);
                }
                // A write may have slipped in between the check and the set.
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    drop_entry(self.cache.as_ref(), &key).await;
                }
            }
            Err(e) => error!("Failed to serialize user {}: {}", user.id, e),
        }

        Ok(Some(user))
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let email = user.email.clone();
        let created = self.blocking(move |store| store.insert(&user)).await?;
        self.written(&email).await;
        Ok(created)
    }

    pub async fn confirm_email(&self, email: &str) -> Result<bool, StoreError> {
        let target = email.to_string();
        let changed = self.blocking(move |store| store.confirm(&target)).await?;
        self.written(email).await;
        Ok(changed)
    }

    pub async fn update_avatar(&self, email: &str, url: &str) -> Result<Option<User>, StoreError> {
        let (target, url) = (email.to_string(), url.to_string());
        let user = self.blocking(move |store| store.set_avatar(&target, &url)).await?;
        self.written(email).await;
        Ok(user)
    }

    pub async fn update_refresh_token(
        &self,
        email: &str,
        token: Option<String>,
    ) -> Result<bool, StoreError> {
        let target = email.to_string();
        let changed = self
            .blocking(move |store| store.set_refresh_token(&target, token.as_deref()))
            .await?;
        self.written(email).await;
        Ok(changed)
    }

    pub async fn delete_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let target = email.to_string();
        let user = self.blocking(move |store| store.delete(&target)).await?;
        self.written(email).await;
        Ok(user)
    }

    async fn written(&self, email: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let key = cache_key(email);
        drop_entry(self.cache.as_ref(), &key).await;

        // Another node may have read the old row before the write and not
        // yet filled its cache entry.
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            tokio::time::sleep(REINVALIDATE_DELAY).await;
            drop_entry(cache.as_ref(), &key).await;
        });
    }

    /// Run a blocking store call off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn UserStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| StoreError::Database(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
    }
}

async fn drop_entry(cache: &dyn UserCache, key: &str) {
    if let Err(e) = cache.invalidate(key).await {
        // The entry will still age out after its TTL.
        error!("User cache invalidation failed for {}: {}", key, e);
    }
}
