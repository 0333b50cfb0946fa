//! Remote service client for the storefront backend.
//!
//! # Architecture
//!
//! - The backend is the source of truth: authentication, persistence,
//!   payment sessions and download-count enforcement all live there
//! - [`Backend`] is the typed contract; every call is async and may fail
//! - No automatic retries; failures surface to the caller
//!
//! # Implementations
//!
//! - [`HttpBackend`] - JSON over HTTP via `reqwest`
//! - `MemoryBackend` - in-process fake for tests (feature `testing`)

mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use http::HttpBackend;

use async_trait::async_trait;
use bytebazaar_core::{
    BrandStory, Category, DigitalDownload, DigitalPurchase, ExternalBlob, HeroBanner,
    HomepageContent, Product, ProductId, ShoppingItem, StripeConfiguration, StripeSessionStatus,
    UserProfile, UserRole,
};
use thiserror::Error;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Backend rejected the operation (e.g., unknown product id).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks permission for the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// Operations exposed by the storefront backend.
///
/// Identity is implicit: the implementation carries the caller's
/// credentials.
#[async_trait]
pub trait Backend: Send + Sync {
    // Profile & roles
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, BackendError>;
    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), BackendError>;
    async fn is_caller_admin(&self) -> Result<bool, BackendError>;
    async fn get_caller_user_role(&self) -> Result<UserRole, BackendError>;

    // Products
    async fn get_products(&self) -> Result<Vec<Product>, BackendError>;
    /// Fails if the product does not exist.
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, BackendError>;
    async fn add_product(&self, product: Product) -> Result<(), BackendError>;
    async fn update_product(&self, product: Product) -> Result<(), BackendError>;
    async fn delete_product(&self, product_id: &ProductId) -> Result<(), BackendError>;
    async fn set_product_images(
        &self,
        product_id: &ProductId,
        images: Vec<ExternalBlob>,
    ) -> Result<(), BackendError>;

    // Categories
    async fn get_categories(&self) -> Result<Vec<Category>, BackendError>;
    async fn add_category(&self, category: Category) -> Result<(), BackendError>;
    async fn update_category(&self, category: Category) -> Result<(), BackendError>;

    // Homepage
    async fn get_homepage_content(&self) -> Result<HomepageContent, BackendError>;
    async fn set_hero_banner(&self, banner: HeroBanner) -> Result<(), BackendError>;
    async fn set_brand_story(&self, story: BrandStory) -> Result<(), BackendError>;

    // Digital downloads
    async fn set_digital_download(
        &self,
        product_id: &ProductId,
        download: DigitalDownload,
    ) -> Result<(), BackendError>;
    async fn remove_digital_download(&self, product_id: &ProductId) -> Result<(), BackendError>;
    async fn record_digital_purchase(
        &self,
        product_id: &ProductId,
        allowed_downloads: u64,
    ) -> Result<(), BackendError>;
    async fn get_user_digital_purchases(&self) -> Result<Vec<DigitalPurchase>, BackendError>;

    // Payments
    /// Returns the serialized session (a JSON object carrying `id` and `url`).
    async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, BackendError>;
    async fn get_stripe_session_status(
        &self,
        session_id: &str,
    ) -> Result<StripeSessionStatus, BackendError>;
    async fn is_stripe_configured(&self) -> Result<bool, BackendError>;
    async fn set_stripe_configuration(
        &self,
        config: StripeConfiguration,
    ) -> Result<(), BackendError>;
}
