//! In-memory backend for tests.
//!
//! Keeps the whole store in process, records every call in order, and can
//! be told to fail specific calls.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytebazaar_core::{
    BrandStory, Category, DigitalDownload, DigitalPurchase, ExternalBlob, HeroBanner,
    HomepageContent, Principal, Product, ProductId, ShoppingItem, StripeConfiguration,
    StripeSessionStatus, UserProfile, UserRole,
};
use chrono::Utc;

use super::{Backend, BackendError};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Backend method name (snake_case).
    pub method: &'static str,
    /// Primary argument, if the method takes one (usually a product id).
    pub arg: Option<String>,
}

#[derive(Default)]
struct State {
    products: Vec<Product>,
    categories: Vec<Category>,
    homepage: HomepageContent,
    profile: Option<UserProfile>,
    purchases: Vec<DigitalPurchase>,
    stripe: Option<StripeConfiguration>,
    checkout_response: Option<String>,
    session_statuses: Vec<(String, StripeSessionStatus)>,
    failures: HashSet<(&'static str, Option<String>)>,
    calls: Vec<Call>,
}

/// In-process fake of the storefront backend.
pub struct MemoryBackend {
    caller: Principal,
    role: UserRole,
    latency: Option<Duration>,
    state: Mutex<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty backend whose caller is a signed-in customer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            caller: Principal::new("customer-principal"),
            role: UserRole::User,
            latency: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Set the caller's role.
    #[must_use]
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    /// Set the caller's principal.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<Principal>) -> Self {
        self.caller = caller.into();
        self
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed products.
    #[must_use]
    pub fn with_products(self, products: impl IntoIterator<Item = Product>) -> Self {
        self.lock().products.extend(products);
        self
    }

    /// Seed categories.
    #[must_use]
    pub fn with_categories(self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.lock().categories.extend(categories);
        self
    }

    /// Seed existing purchases.
    #[must_use]
    pub fn with_purchases(self, purchases: impl IntoIterator<Item = DigitalPurchase>) -> Self {
        self.lock().purchases.extend(purchases);
        self
    }

    /// Mark the payment processor as configured.
    #[must_use]
    pub fn with_stripe(self, config: StripeConfiguration) -> Self {
        self.lock().stripe = Some(config);
        self
    }

    /// Raw string returned by `create_checkout_session`.
    ///
    /// Defaults to a well-formed session object.
    #[must_use]
    pub fn with_checkout_response(self, raw: impl Into<String>) -> Self {
        self.lock().checkout_response = Some(raw.into());
        self
    }

    /// Status returned for a payment session.
    #[must_use]
    pub fn with_session_status(self, session_id: &str, status: StripeSessionStatus) -> Self {
        self.lock()
            .session_statuses
            .push((session_id.to_string(), status));
        self
    }

    /// Make every call to `method` with `arg` fail.
    ///
    /// `arg: None` matches calls without an argument.
    pub fn fail_on(&self, method: &'static str, arg: Option<&str>) {
        self.lock()
            .failures
            .insert((method, arg.map(str::to_string)));
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls to `method`.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Arguments of every call to `method`, in order.
    #[must_use]
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .filter_map(|c| c.arg.clone())
            .collect()
    }

    /// Current purchases, bypassing the call log.
    #[must_use]
    pub fn purchases(&self) -> Vec<DigitalPurchase> {
        self.lock().purchases.clone()
    }

    /// Current products, bypassing the call log.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    /// Current Stripe configuration, bypassing the call log.
    #[must_use]
    pub fn stripe_configuration(&self) -> Option<StripeConfiguration> {
        self.lock().stripe.clone()
    }

    /// Current homepage content, bypassing the call log.
    #[must_use]
    pub fn homepage(&self) -> HomepageContent {
        self.lock().homepage.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call, apply latency, and honour injected failures.
    async fn enter(&self, method: &'static str, arg: Option<&str>) -> Result<(), BackendError> {
        let fail = {
            let mut state = self.lock();
            state.calls.push(Call {
                method,
                arg: arg.map(str::to_string),
            });
            state.failures.contains(&(method, arg.map(str::to_string)))
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if fail {
            return Err(BackendError::Api {
                status: 500,
                message: format!("injected failure: {method}"),
            });
        }
        Ok(())
    }

    fn require_admin(&self) -> Result<(), BackendError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(BackendError::Unauthorized(
                "Only admins can perform this action".to_string(),
            ))
        }
    }

    fn require_user(&self) -> Result<(), BackendError> {
        if self.role == UserRole::Guest {
            Err(BackendError::Unauthorized(
                "Only users can perform this action".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Featured products are derived from the catalog on every read.
fn homepage_view(state: &State) -> HomepageContent {
    HomepageContent {
        featured_products: state
            .products
            .iter()
            .filter(|p| p.featured)
            .cloned()
            .collect(),
        ..state.homepage.clone()
    }
}

fn not_found(product_id: &ProductId) -> BackendError {
    BackendError::NotFound(format!("product {product_id}"))
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, BackendError> {
        self.enter("get_caller_user_profile", None).await?;
        Ok(self.lock().profile.clone())
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), BackendError> {
        self.enter("save_caller_user_profile", None).await?;
        self.require_user()?;
        self.lock().profile = Some(profile);
        Ok(())
    }

    async fn is_caller_admin(&self) -> Result<bool, BackendError> {
        self.enter("is_caller_admin", None).await?;
        Ok(self.role.is_admin())
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, BackendError> {
        self.enter("get_caller_user_role", None).await?;
        Ok(self.role)
    }

    async fn get_products(&self) -> Result<Vec<Product>, BackendError> {
        self.enter("get_products", None).await?;
        Ok(self.lock().products.clone())
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Product, BackendError> {
        self.enter("get_product", Some(product_id.as_str())).await?;
        self.lock()
            .products
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| not_found(product_id))
    }

    async fn add_product(&self, product: Product) -> Result<(), BackendError> {
        self.enter("add_product", Some(product.id.as_str())).await?;
        self.require_admin()?;
        let mut state = self.lock();
        if state.products.iter().any(|p| p.id == product.id) {
            return Err(BackendError::Rejected(format!(
                "Product already exists: {}",
                product.id
            )));
        }
        state.products.push(product);
        Ok(())
    }

    async fn update_product(&self, product: Product) -> Result<(), BackendError> {
        self.enter("update_product", Some(product.id.as_str())).await?;
        self.require_admin()?;
        let mut state = self.lock();
        let slot = state
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| not_found(&product.id))?;
        *slot = product;
        Ok(())
    }

    async fn delete_product(&self, product_id: &ProductId) -> Result<(), BackendError> {
        self.enter("delete_product", Some(product_id.as_str())).await?;
        self.require_admin()?;
        let mut state = self.lock();
        let before = state.products.len();
        state.products.retain(|p| &p.id != product_id);
        if state.products.len() == before {
            return Err(not_found(product_id));
        }
        Ok(())
    }

    async fn set_product_images(
        &self,
        product_id: &ProductId,
        images: Vec<ExternalBlob>,
    ) -> Result<(), BackendError> {
        self.enter("set_product_images", Some(product_id.as_str()))
            .await?;
        self.require_admin()?;
        let mut state = self.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| &p.id == product_id)
            .ok_or_else(|| not_found(product_id))?;
        product.images = images;
        Ok(())
    }

    async fn get_categories(&self) -> Result<Vec<Category>, BackendError> {
        self.enter("get_categories", None).await?;
        Ok(self.lock().categories.clone())
    }

    async fn add_category(&self, category: Category) -> Result<(), BackendError> {
        self.enter("add_category", Some(category.id.as_str())).await?;
        self.require_admin()?;
        let mut state = self.lock();
        if state.categories.iter().any(|c| c.id == category.id) {
            return Err(BackendError::Rejected(format!(
                "Category already exists: {}",
                category.id
            )));
        }
        state.categories.push(category);
        Ok(())
    }

    async fn update_category(&self, category: Category) -> Result<(), BackendError> {
        self.enter("update_category", Some(category.id.as_str()))
            .await?;
        self.require_admin()?;
        let mut state = self.lock();
        let slot = state
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| BackendError::Rejected(format!("Category not found: {}", category.id)))?;
        *slot = category;
        Ok(())
    }

    async fn get_homepage_content(&self) -> Result<HomepageContent, BackendError> {
        self.enter("get_homepage_content", None).await?;
        Ok(homepage_view(&self.lock()))
    }

    async fn set_hero_banner(&self, banner: HeroBanner) -> Result<(), BackendError> {
        self.enter("set_hero_banner", None).await?;
        self.require_admin()?;
        self.lock().homepage.hero_banner = banner;
        Ok(())
    }

    async fn set_brand_story(&self, story: BrandStory) -> Result<(), BackendError> {
        self.enter("set_brand_story", None).await?;
        self.require_admin()?;
        self.lock().homepage.brand_story = story;
        Ok(())
    }

    async fn set_digital_download(
        &self,
        product_id: &ProductId,
        download: DigitalDownload,
    ) -> Result<(), BackendError> {
        self.enter("set_digital_download", Some(product_id.as_str()))
            .await?;
        self.require_admin()?;
        let mut state = self.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| &p.id == product_id)
            .ok_or_else(|| not_found(product_id))?;
        product.digital_download = Some(download);
        Ok(())
    }

    async fn remove_digital_download(&self, product_id: &ProductId) -> Result<(), BackendError> {
        self.enter("remove_digital_download", Some(product_id.as_str()))
            .await?;
        self.require_admin()?;
        let mut state = self.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| &p.id == product_id)
            .ok_or_else(|| not_found(product_id))?;
        product.digital_download = None;
        Ok(())
    }

    async fn record_digital_purchase(
        &self,
        product_id: &ProductId,
        allowed_downloads: u64,
    ) -> Result<(), BackendError> {
        self.enter("record_digital_purchase", Some(product_id.as_str()))
            .await?;
        self.require_user()?;
        let mut state = self.lock();
        if !state.products.iter().any(|p| &p.id == product_id) {
            return Err(not_found(product_id));
        }
        // One entitlement per user and product
        let exists = state
            .purchases
            .iter()
            .any(|p| p.user == self.caller && &p.product_id == product_id);
        if !exists {
            state.purchases.push(DigitalPurchase {
                user: self.caller.clone(),
                product_id: product_id.clone(),
                purchase_timestamp: Utc::now(),
                download_count: 0,
                allowed_downloads,
            });
        }
        Ok(())
    }

    async fn get_user_digital_purchases(&self) -> Result<Vec<DigitalPurchase>, BackendError> {
        self.enter("get_user_digital_purchases", None).await?;
        self.require_user()?;
        Ok(self
            .lock()
            .purchases
            .iter()
            .filter(|p| p.user == self.caller)
            .cloned()
            .collect())
    }

    async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
        success_url: &str,
        _cancel_url: &str,
    ) -> Result<String, BackendError> {
        self.enter("create_checkout_session", Some(success_url))
            .await?;
        if items.is_empty() {
            return Err(BackendError::Rejected("No items to check out".to_string()));
        }
        let state = self.lock();
        if state.stripe.is_none() {
            return Err(BackendError::Rejected(
                "Stripe needs to be first configured".to_string(),
            ));
        }
        Ok(state.checkout_response.clone().unwrap_or_else(|| {
            r#"{"id":"cs_test_memory","url":"https://checkout.example.com/c/cs_test_memory"}"#
                .to_string()
        }))
    }

    async fn get_stripe_session_status(
        &self,
        session_id: &str,
    ) -> Result<StripeSessionStatus, BackendError> {
        self.enter("get_stripe_session_status", Some(session_id))
            .await?;
        Ok(self
            .lock()
            .session_statuses
            .iter()
            .find(|(id, _)| id == session_id)
            .map_or_else(
                || StripeSessionStatus::Failed {
                    error: format!("Unknown session: {session_id}"),
                },
                |(_, status)| status.clone(),
            ))
    }

    async fn is_stripe_configured(&self) -> Result<bool, BackendError> {
        self.enter("is_stripe_configured", None).await?;
        Ok(self.lock().stripe.is_some())
    }

    async fn set_stripe_configuration(
        &self,
        config: StripeConfiguration,
    ) -> Result<(), BackendError> {
        self.enter("set_stripe_configuration", None).await?;
        self.require_admin()?;
        self.lock().stripe = Some(config);
        Ok(())
    }
}
