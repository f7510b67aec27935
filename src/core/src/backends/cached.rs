//! Read-through cache over any directory backend
//!
//! Bounded LRU map with TTL expiry. Values are computed outside the lock, so
//! two concurrent misses for the same key may both reach the backend; the
//! later insert wins.

use crate::error::Result;
use crate::traits::DirectoryBackend;
use crate::types::{EntityId, Group, User};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,

    /// Time-to-live for cached lookups
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Group(EntityId),
    User(EntityId),
    Groups,
    Users,
    MemberGroups(EntityId),
    MemberUsers(EntityId),
    ParentsOfGroup(EntityId),
    ParentsOfUser(EntityId),
}

#[derive(Debug, Clone)]
enum CachedValue {
    Group(Option<Group>),
    User(Option<User>),
    Groups(Vec<Group>),
    Users(Vec<User>),
    Ids(Vec<EntityId>),
}

struct CacheEntry {
    value: CachedValue,
    cached_at: Instant,
}

/// Read-through caching wrapper implementing `DirectoryBackend`
pub struct CachedDirectory<B> {
    inner: B,
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl<B: DirectoryBackend> CachedDirectory<B> {
    pub fn new(inner: B) -> Self {
        Self::with_config(inner, CacheConfig::default())
    }

    pub fn with_config(inner: B, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Drop every cached lookup
    pub fn invalidate(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.entries.lock();
        let state = entries
            .get(key)
            .map(|entry| (entry.cached_at.elapsed() <= self.ttl, entry.value.clone()));
        match state {
            Some((true, value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some((false, _)) => {
                entries.pop(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn get_or_compute<T, Fut>(
        &self,
        key: CacheKey,
        compute: Fut,
        wrap: fn(T) -> CachedValue,
        unwrap: fn(CachedValue) -> Option<T>,
    ) -> Result<T>
    where
        T: Clone,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.lookup(&key).and_then(unwrap) {
            return Ok(value);
        }

        trace!(?key, "directory cache miss");
        let value = compute.await?;
        self.entries.lock().put(
            key,
            CacheEntry {
                value: wrap(value.clone()),
                cached_at: Instant::now(),
            },
        );
        Ok(value)
    }
}

fn unwrap_ids(value: CachedValue) -> Option<Vec<EntityId>> {
    match value {
        CachedValue::Ids(ids) => Some(ids),
        _ => None,
    }
}

#[async_trait]
impl<B: DirectoryBackend> DirectoryBackend for CachedDirectory<B> {
    async fn group(&self, id: &EntityId) -> Result<Option<Group>> {
        self.get_or_compute(
            CacheKey::Group(id.clone()),
            self.inner.group(id),
            CachedValue::Group,
            |v| match v {
                CachedValue::Group(g) => Some(g),
                _ => None,
            },
        )
        .await
    }

    async fn user(&self, id: &EntityId) -> Result<Option<User>> {
        self.get_or_compute(
            CacheKey::User(id.clone()),
            self.inner.user(id),
            CachedValue::User,
            |v| match v {
                CachedValue::User(u) => Some(u),
                _ => None,
            },
        )
        .await
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        self.get_or_compute(
            CacheKey::Groups,
            self.inner.groups(),
            CachedValue::Groups,
            |v| match v {
                CachedValue::Groups(g) => Some(g),
                _ => None,
            },
        )
        .await
    }

    async fn users(&self) -> Result<Vec<User>> {
        self.get_or_compute(
            CacheKey::Users,
            self.inner.users(),
            CachedValue::Users,
            |v| match v {
                CachedValue::Users(u) => Some(u),
                _ => None,
            },
        )
        .await
    }

    async fn member_groups_of(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.get_or_compute(
            CacheKey::MemberGroups(group.clone()),
            self.inner.member_groups_of(group),
            CachedValue::Ids,
            unwrap_ids,
        )
        .await
    }

    async fn member_users_of(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.get_or_compute(
            CacheKey::MemberUsers(group.clone()),
            self.inner.member_users_of(group),
            CachedValue::Ids,
            unwrap_ids,
        )
        .await
    }

    async fn parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.get_or_compute(
            CacheKey::ParentsOfGroup(group.clone()),
            self.inner.parent_groups_of_group(group),
            CachedValue::Ids,
            unwrap_ids,
        )
        .await
    }

    async fn parent_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>> {
        self.get_or_compute(
            CacheKey::ParentsOfUser(user.clone()),
            self.inner.parent_groups_of_user(user),
            CachedValue::Ids,
            unwrap_ids,
        )
        .await
    }
}
