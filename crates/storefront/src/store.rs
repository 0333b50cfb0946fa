//! Read and write accessors over the backend.
//!
//! # Architecture
//!
//! - Reads go through the [`QueryCache`]; while no backend is connected they
//!   resolve to [`Query::disabled`] without fetching
//! - Opportunistic reads (lists, homepage, flags) log failures and degrade to
//!   the empty default; strict reads (`try_*`, [`Storefront::product`])
//!   propagate them
//! - Writes are described by a [`Mutation`]; on success exactly the keys in
//!   [`Mutation::invalidates`] are invalidated, on failure nothing is

use std::future::Future;
use std::sync::Arc;

use bytebazaar_core::{
    BrandStory, Category, CategoryId, CheckoutSession, DigitalDownload, DigitalPurchase,
    ExternalBlob, HeroBanner, HomepageContent, Product, ProductId, ShoppingItem,
    StripeConfiguration, StripeSessionStatus, UserProfile, UserRole,
};
use tracing::{debug, instrument, warn};

use crate::backend::{Backend, BackendError, HttpBackend};
use crate::cache::{CacheKey, Cached, Query, QueryCache, QueryStatus};
use crate::config::{BackendConfig, StoreOptions};
use crate::error::{StoreError, clear_sentry_user, set_sentry_user};
use crate::service::{Identity, ServiceHandle, Session};

// =============================================================================
// Mutations
// =============================================================================

/// A backend write, named by what it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SaveProfile,
    SetHeroBanner,
    SetBrandStory,
    AddProduct,
    UpdateProduct(ProductId),
    DeleteProduct(ProductId),
    SetProductImages(ProductId),
    SetDigitalDownload(ProductId),
    RemoveDigitalDownload(ProductId),
    RecordDigitalPurchase(ProductId),
    AddCategory(CategoryId),
    UpdateCategory(CategoryId),
    SetStripeConfiguration,
}

impl Mutation {
    /// Cache keys whose data this write can change.
    #[must_use]
    pub fn invalidates(&self) -> Vec<CacheKey> {
        match self {
            Self::SaveProfile => vec![CacheKey::CurrentUserProfile],
            Self::SetHeroBanner | Self::SetBrandStory => vec![CacheKey::HomepageContent],
            // Homepage content embeds the featured products
            Self::AddProduct => vec![CacheKey::Products, CacheKey::HomepageContent],
            Self::UpdateProduct(id)
            | Self::DeleteProduct(id)
            | Self::SetProductImages(id)
            | Self::SetDigitalDownload(id)
            | Self::RemoveDigitalDownload(id) => vec![
                CacheKey::Products,
                CacheKey::HomepageContent,
                CacheKey::Product(id.clone()),
            ],
            Self::RecordDigitalPurchase(_) => vec![CacheKey::UserDigitalPurchases],
            Self::AddCategory(_) | Self::UpdateCategory(_) => vec![CacheKey::Categories],
            Self::SetStripeConfiguration => vec![CacheKey::IsStripeConfigured],
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::SaveProfile => "save_profile",
            Self::SetHeroBanner => "set_hero_banner",
            Self::SetBrandStory => "set_brand_story",
            Self::AddProduct => "add_product",
            Self::UpdateProduct(_) => "update_product",
            Self::DeleteProduct(_) => "delete_product",
            Self::SetProductImages(_) => "set_product_images",
            Self::SetDigitalDownload(_) => "set_digital_download",
            Self::RemoveDigitalDownload(_) => "remove_digital_download",
            Self::RecordDigitalPurchase(_) => "record_digital_purchase",
            Self::AddCategory(_) => "add_category",
            Self::UpdateCategory(_) => "update_category",
            Self::SetStripeConfiguration => "set_stripe_configuration",
        }
    }
}

// =============================================================================
// Storefront
// =============================================================================

/// Cached, readiness-aware access to the storefront backend.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    service: ServiceHandle,
    cache: QueryCache,
    options: StoreOptions,
}

impl Storefront {
    /// Create a disconnected storefront.
    #[must_use]
    pub fn new(options: StoreOptions) -> Self {
        let cache = QueryCache::new(&options.cache);
        Self {
            inner: Arc::new(StorefrontInner {
                service: ServiceHandle::new(),
                cache,
                options,
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn service(&self) -> &ServiceHandle {
        &self.inner.service
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    /// The signed-in caller, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.service.identity()
    }

    /// Connect a backend acting for `identity`. Cached data is dropped.
    pub async fn connect(&self, backend: Arc<dyn Backend>, identity: Option<Identity>) {
        update_sentry_user(identity.as_ref());
        self.inner.service.connect(backend, identity);
        self.inner.cache.invalidate_all().await;
    }

    /// Connect the HTTP backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub async fn connect_http(
        &self,
        config: &BackendConfig,
        identity: Option<Identity>,
    ) -> Result<(), StoreError> {
        let backend = HttpBackend::new(config)?;
        self.connect(Arc::new(backend), identity).await;
        Ok(())
    }

    /// Disconnect the backend. Reads are disabled until reconnected.
    pub async fn disconnect(&self) {
        clear_sentry_user();
        self.inner.service.disconnect();
        self.inner.cache.invalidate_all().await;
    }

    /// Switch the caller (login/logout). Cached data is dropped.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        update_sentry_user(identity.as_ref());
        self.inner.service.set_identity(identity);
        self.inner.cache.invalidate_all().await;
    }

    // =========================================================================
    // Read plumbing
    // =========================================================================

    fn session(&self) -> Result<Session, StoreError> {
        self.inner
            .service
            .current()
            .ok_or(StoreError::ServiceUnavailable)
    }

    /// Cached read that propagates every failure.
    async fn cached<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, StoreError>
    where
        T: Cached,
        F: FnOnce(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let backend = Arc::clone(self.session()?.backend());
        self.inner.cache.get_or_fetch(key, move || fetch(backend)).await
    }

    /// Cached read that degrades to the default value.
    async fn query<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Query<T>
    where
        T: Cached + Default,
        F: FnOnce(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        match self.cached(key.clone(), fetch).await {
            Ok(data) => Query::fetched(data),
            Err(StoreError::ServiceUnavailable) => Query::disabled(),
            Err(err) => {
                warn!(key = %key, error = %err, "Read failed, using empty default");
                Query::failed()
            }
        }
    }

    /// Observable state of a cached read.
    pub async fn status(&self, key: &CacheKey) -> QueryStatus {
        if self.inner.service.is_ready() {
            self.inner.cache.status(key).await
        } else {
            QueryStatus::Disabled
        }
    }

    // =========================================================================
    // Opportunistic reads
    // =========================================================================

    pub async fn current_user_profile(&self) -> Query<Option<UserProfile>> {
        self.query(CacheKey::CurrentUserProfile, |b| async move {
            b.get_caller_user_profile().await
        })
        .await
    }

    pub async fn is_caller_admin(&self) -> Query<bool> {
        self.query(CacheKey::IsAdmin, |b| async move { b.is_caller_admin().await })
            .await
    }

    pub async fn caller_role(&self) -> Query<UserRole> {
        self.query(CacheKey::CallerRole, |b| async move {
            b.get_caller_user_role().await
        })
        .await
    }

    pub async fn homepage_content(&self) -> Query<HomepageContent> {
        self.query(CacheKey::HomepageContent, |b| async move {
            b.get_homepage_content().await
        })
        .await
    }

    pub async fn products(&self) -> Query<Vec<Product>> {
        self.query(CacheKey::Products, |b| async move { b.get_products().await })
            .await
    }

    pub async fn categories(&self) -> Query<Vec<Category>> {
        self.query(CacheKey::Categories, |b| async move { b.get_categories().await })
            .await
    }

    pub async fn user_digital_purchases(&self) -> Query<Vec<DigitalPurchase>> {
        self.query(CacheKey::UserDigitalPurchases, |b| async move {
            b.get_user_digital_purchases().await
        })
        .await
    }

    pub async fn is_stripe_configured(&self) -> Query<bool> {
        self.query(CacheKey::IsStripeConfigured, |b| async move {
            b.is_stripe_configured().await
        })
        .await
    }

    // =========================================================================
    // Strict reads
    // =========================================================================

    /// Product list, propagating failures.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn try_products(&self) -> Result<Vec<Product>, StoreError> {
        self.cached(CacheKey::Products, |b| async move { b.get_products().await })
            .await
    }

    /// The caller's purchases, propagating failures.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn try_user_digital_purchases(&self) -> Result<Vec<DigitalPurchase>, StoreError> {
        self.cached(CacheKey::UserDigitalPurchases, |b| async move {
            b.get_user_digital_purchases().await
        })
        .await
    }

    /// One product, for its detail page.
    ///
    /// An empty id is a disabled read. A product the backend does not know
    /// resolves to `None`.
    ///
    /// # Errors
    ///
    /// Returns any other backend failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<Query<Option<Product>>, StoreError> {
        if product_id.is_empty() || !self.inner.service.is_ready() {
            return Ok(Query::disabled());
        }

        let id = product_id.clone();
        let result = self
            .cached(CacheKey::Product(id.clone()), |b| async move {
                b.get_product(&id).await
            })
            .await;

        match result {
            Ok(product) => Ok(Query::fetched(Some(product))),
            Err(err) if err.is_not_found() => {
                debug!("Product not found");
                Ok(Query::fetched(None))
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Run a mutation and invalidate its keys on success.
    async fn write<F, Fut>(&self, mutation: Mutation, op: F) -> Result<(), StoreError>
    where
        F: FnOnce(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Result<(), BackendError>>,
    {
        let backend = Arc::clone(self.session()?.backend());

        if let Err(err) = op(backend).await {
            warn!(mutation = mutation.name(), error = %err, "Write failed");
            return Err(err.into());
        }

        for key in mutation.invalidates() {
            self.inner.cache.invalidate(&key).await;
        }
        debug!(mutation = mutation.name(), "Write applied");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.write(Mutation::SaveProfile, |b| async move {
            b.save_caller_user_profile(profile).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn set_hero_banner(&self, banner: HeroBanner) -> Result<(), StoreError> {
        self.write(Mutation::SetHeroBanner, |b| async move {
            b.set_hero_banner(banner).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn set_brand_story(&self, story: BrandStory) -> Result<(), StoreError> {
        self.write(Mutation::SetBrandStory, |b| async move {
            b.set_brand_story(story).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_product(&self, product: Product) -> Result<(), StoreError> {
        self.write(Mutation::AddProduct, |b| async move {
            b.add_product(product).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn update_product(&self, product: Product) -> Result<(), StoreError> {
        self.write(Mutation::UpdateProduct(product.id.clone()), |b| async move {
            b.update_product(product).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), StoreError> {
        let id = product_id.clone();
        self.write(Mutation::DeleteProduct(product_id.clone()), |b| async move {
            b.delete_product(&id).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self, images), fields(product_id = %product_id))]
    pub async fn set_product_images(
        &self,
        product_id: &ProductId,
        images: Vec<ExternalBlob>,
    ) -> Result<(), StoreError> {
        let id = product_id.clone();
        self.write(
            Mutation::SetProductImages(product_id.clone()),
            |b| async move { b.set_product_images(&id, images).await },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self, download), fields(product_id = %product_id))]
    pub async fn set_digital_download(
        &self,
        product_id: &ProductId,
        download: DigitalDownload,
    ) -> Result<(), StoreError> {
        let id = product_id.clone();
        self.write(
            Mutation::SetDigitalDownload(product_id.clone()),
            |b| async move { b.set_digital_download(&id, download).await },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_digital_download(&self, product_id: &ProductId) -> Result<(), StoreError> {
        let id = product_id.clone();
        self.write(
            Mutation::RemoveDigitalDownload(product_id.clone()),
            |b| async move { b.remove_digital_download(&id).await },
        )
        .await
    }

    /// Record the caller's entitlement to a digital product.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn record_digital_purchase(
        &self,
        product_id: &ProductId,
        allowed_downloads: u64,
    ) -> Result<(), StoreError> {
        let id = product_id.clone();
        self.write(
            Mutation::RecordDigitalPurchase(product_id.clone()),
            |b| async move { b.record_digital_purchase(&id, allowed_downloads).await },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn add_category(&self, category: Category) -> Result<(), StoreError> {
        self.write(Mutation::AddCategory(category.id.clone()), |b| async move {
            b.add_category(category).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn update_category(&self, category: Category) -> Result<(), StoreError> {
        self.write(
            Mutation::UpdateCategory(category.id.clone()),
            |b| async move { b.update_category(category).await },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    pub async fn set_stripe_configuration(
        &self,
        config: StripeConfiguration,
    ) -> Result<(), StoreError> {
        self.write(Mutation::SetStripeConfiguration, |b| async move {
            b.set_stripe_configuration(config).await
        })
        .await
    }

    // =========================================================================
    // Uncached calls
    // =========================================================================

    /// Request a payment-processor checkout session.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, the backend error, or
    /// `MalformedResponse` if the session carries no redirect URL.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StoreError> {
        let session = self.session()?;
        let raw = session
            .backend()
            .create_checkout_session(items, success_url, cancel_url)
            .await?;
        Ok(CheckoutSession::parse(&raw)?)
    }

    /// Look up a payment session's outcome.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` when disconnected, or the backend error.
    #[instrument(skip(self))]
    pub async fn stripe_session_status(
        &self,
        session_id: &str,
    ) -> Result<StripeSessionStatus, StoreError> {
        let session = self.session()?;
        Ok(session
            .backend()
            .get_stripe_session_status(session_id)
            .await?)
    }
}

fn update_sentry_user(identity: Option<&Identity>) {
    match identity {
        Some(identity) => set_sentry_user(&identity.principal),
        None => clear_sentry_user(),
    }
}
