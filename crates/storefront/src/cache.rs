//! Keyed query cache for backend reads.
//!
//! # Architecture
//!
//! - Values live in a `moka` future cache (TTL + capacity bound)
//! - Concurrent reads of one key share a single in-flight fetch
//!   (`try_get_with`)
//! - Every key carries a generation; invalidation bumps it under a lock, so a
//!   fetch that started before the invalidation lands under a stale key and is
//!   never served again
//! - `invalidate_all` bumps a global epoch (identity changes) and resets
//!   the per-key generations
//!
//! Loading and failure are tracked per key so dependents can tell "no data
//! yet" from "confirmed empty".

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytebazaar_core::{
    Category, DigitalPurchase, HomepageContent, Product, ProductId, UserProfile, UserRole,
};
use moka::future::Cache;
use tracing::debug;

use crate::backend::BackendError;
use crate::config::CacheConfig;
use crate::error::StoreError;

// =============================================================================
// Keys & Values
// =============================================================================

/// Stable identifier of one cached read.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    CurrentUserProfile,
    IsAdmin,
    CallerRole,
    HomepageContent,
    Products,
    Product(ProductId),
    Categories,
    UserDigitalPurchases,
    IsStripeConfigured,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentUserProfile => write!(f, "currentUserProfile"),
            Self::IsAdmin => write!(f, "isAdmin"),
            Self::CallerRole => write!(f, "callerRole"),
            Self::HomepageContent => write!(f, "homepageContent"),
            Self::Products => write!(f, "products"),
            Self::Product(id) => write!(f, "product:{id}"),
            Self::Categories => write!(f, "categories"),
            Self::UserDigitalPurchases => write!(f, "userDigitalPurchases"),
            Self::IsStripeConfigured => write!(f, "isStripeConfigured"),
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Profile(Option<UserProfile>),
    Flag(bool),
    Role(UserRole),
    Homepage(Box<HomepageContent>),
    Products(Vec<Product>),
    Product(Box<Product>),
    Categories(Vec<Category>),
    Purchases(Vec<DigitalPurchase>),
}

/// Conversion between a read's result type and its cache slot.
pub trait Cached: Sized {
    fn into_value(self) -> CacheValue;
    fn from_value(value: CacheValue) -> Option<Self>;
}

macro_rules! impl_cached {
    ($ty:ty, $variant:ident) => {
        impl Cached for $ty {
            fn into_value(self) -> CacheValue {
                CacheValue::$variant(self)
            }

            fn from_value(value: CacheValue) -> Option<Self> {
                match value {
                    CacheValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
    ($ty:ty, $variant:ident, boxed) => {
        impl Cached for $ty {
            fn into_value(self) -> CacheValue {
                CacheValue::$variant(Box::new(self))
            }

            fn from_value(value: CacheValue) -> Option<Self> {
                match value {
                    CacheValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

impl_cached!(Option<UserProfile>, Profile);
impl_cached!(bool, Flag);
impl_cached!(UserRole, Role);
impl_cached!(Vec<Product>, Products);
impl_cached!(Vec<Category>, Categories);
impl_cached!(Vec<DigitalPurchase>, Purchases);
impl_cached!(HomepageContent, Homepage, boxed);
impl_cached!(Product, Product, boxed);

// =============================================================================
// Query State
// =============================================================================

/// Observable state of one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The backend is not connected yet; nothing was fetched.
    Disabled,
    /// Never fetched, or invalidated since the last fetch.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// Data reflects a completed fetch (possibly confirmed empty).
    Fetched,
    /// The last fetch failed; data is the default value.
    Failed,
}

/// Result of a read accessor: the data plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<T> {
    pub data: T,
    pub status: QueryStatus,
}

impl<T> Query<T> {
    #[must_use]
    pub const fn fetched(data: T) -> Self {
        Self {
            data,
            status: QueryStatus::Fetched,
        }
    }

    /// Whether the data reflects a completed fetch.
    #[must_use]
    pub fn is_fetched(&self) -> bool {
        self.status == QueryStatus::Fetched
    }

    #[must_use]
    pub fn into_data(self) -> T {
        self.data
    }

    /// Transform the data, keeping the status.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Query<U> {
        Query {
            data: f(self.data),
            status: self.status,
        }
    }
}

impl<T: Default> Query<T> {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            data: T::default(),
            status: QueryStatus::Disabled,
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            data: T::default(),
            status: QueryStatus::Failed,
        }
    }
}

// =============================================================================
// QueryCache
// =============================================================================

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct VersionedKey {
    key: CacheKey,
    generation: u64,
    epoch: u64,
}

#[derive(Default)]
struct Versions {
    epoch: u64,
    generations: HashMap<CacheKey, u64>,
    in_flight: HashMap<CacheKey, usize>,
    failed: HashSet<CacheKey>,
}

impl Versions {
    fn current(&self, key: &CacheKey) -> VersionedKey {
        VersionedKey {
            key: key.clone(),
            generation: self.generations.get(key).copied().unwrap_or_default(),
            epoch: self.epoch,
        }
    }
}

/// Shared cache of backend reads.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

struct QueryCacheInner {
    entries: Cache<VersionedKey, CacheValue>,
    versions: Mutex<Versions>,
}

impl QueryCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();

        Self {
            inner: Arc::new(QueryCacheInner {
                entries,
                versions: Mutex::new(Versions::default()),
            }),
        }
    }

    fn versions(&self) -> MutexGuard<'_, Versions> {
        self.inner
            .versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `key`, fetching it on a miss.
    ///
    /// Concurrent callers for the same key await one shared fetch. Failures
    /// are not cached.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the fetch fails.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, StoreError>
    where
        T: Cached,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let versioned = self.versions().current(&key);

        if let Some(value) = self.inner.entries.get(&versioned).await {
            debug!(key = %key, "Cache hit");
            return decode(&key, value);
        }

        let result = {
            let _loading = InFlight::enter(self, &key);
            self.inner
                .entries
                .try_get_with(versioned, async move { fetch().await.map(T::into_value) })
                .await
        };

        match result {
            Ok(value) => {
                self.versions().failed.remove(&key);
                decode(&key, value)
            }
            Err(err) => {
                self.versions().failed.insert(key);
                Err(StoreError::Backend(err))
            }
        }
    }

    /// Current cached value for `key`, without fetching.
    pub async fn peek<T: Cached>(&self, key: &CacheKey) -> Option<T> {
        let versioned = self.versions().current(key);
        self.inner
            .entries
            .get(&versioned)
            .await
            .and_then(T::from_value)
    }

    /// Observable state of `key`.
    pub async fn status(&self, key: &CacheKey) -> QueryStatus {
        let (versioned, loading, failed) = {
            let versions = self.versions();
            (
                versions.current(key),
                versions.in_flight.get(key).is_some_and(|n| *n > 0),
                versions.failed.contains(key),
            )
        };

        if loading {
            QueryStatus::Loading
        } else if self.inner.entries.contains_key(&versioned) {
            QueryStatus::Fetched
        } else if failed {
            QueryStatus::Failed
        } else {
            QueryStatus::Idle
        }
    }

    /// Invalidate one key. Reads issued afterwards fetch fresh data.
    pub async fn invalidate(&self, key: &CacheKey) {
        let stale = {
            let mut versions = self.versions();
            let stale = versions.current(key);
            *versions.generations.entry(key.clone()).or_default() += 1;
            versions.failed.remove(key);
            stale
        };
        debug!(key = %key, "Cache invalidated");
        self.inner.entries.invalidate(&stale).await;
    }

    /// Invalidate every key.
    pub async fn invalidate_all(&self) {
        {
            let mut versions = self.versions();
            versions.epoch += 1;
            versions.generations.clear();
            versions.failed.clear();
        }
        debug!("Cache cleared");
        self.inner.entries.invalidate_all();
        self.inner.entries.run_pending_tasks().await;
    }
}

fn decode<T: Cached>(key: &CacheKey, value: CacheValue) -> Result<T, StoreError> {
    T::from_value(value)
        .ok_or_else(|| StoreError::Internal(format!("cache entry for {key} has unexpected type")))
}

/// Marks a key as loading for as long as it lives.
struct InFlight<'a> {
    cache: &'a QueryCache,
    key: CacheKey,
}

impl<'a> InFlight<'a> {
    fn enter(cache: &'a QueryCache, key: &CacheKey) -> Self {
        *cache.versions().in_flight.entry(key.clone()).or_default() += 1;
        Self {
            cache,
            key: key.clone(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut versions = self.cache.versions();
        if let Some(count) = versions.in_flight.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                versions.in_flight.remove(&self.key);
            }
        }
    }
}
