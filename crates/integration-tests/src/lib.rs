//! Integration tests for Byte Bazaar.
//!
//! Every test runs against the in-memory backend from
//! `bytebazaar_storefront::backend::memory`, so no network or running
//! backend is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bytebazaar-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `reconciliation` - Purchase confirmation after the payment redirect
//! - `cache` - Query cache readiness, deduplication and invalidation
//! - `checkout` - Checkout initiation and redirect URLs
//! - `downloads` - The caller's download library
//! - `admin` - Admin gate, payment setup, catalog and seeding

use std::sync::{Arc, Mutex, PoisonError};

use bytebazaar_core::{
    CategoryId, DigitalDownload, DigitalPurchase, ExternalBlob, Principal, Product, ProductId,
    StripeConfiguration, UserRole,
};
use bytebazaar_storefront::backend::memory::MemoryBackend;
use bytebazaar_storefront::config::StoreOptions;
use bytebazaar_storefront::{Identity, Navigator, Storefront};
use chrono::{DateTime, Utc};
use url::Url;

/// Principal of the default signed-in caller.
pub const CALLER: &str = "customer-principal";

/// Origin the test storefront is served from.
pub const ORIGIN: &str = "https://shop.example.com";

// =============================================================================
// Fixtures
// =============================================================================

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A product without a digital download.
#[must_use]
pub fn physical_product(id: &str) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: format!("Description of {id}"),
        price_cents: 239_900,
        category: CategoryId::new("e-books"),
        featured: false,
        created_at: epoch(),
        images: vec![],
        digital_download: None,
    }
}

/// A product carrying a 2 MB PDF download.
#[must_use]
pub fn digital_product(id: &str) -> Product {
    Product {
        digital_download: Some(DigitalDownload {
            content_type: "application/pdf".to_string(),
            download_file: ExternalBlob::from_url(format!("https://files.example.com/{id}.pdf")),
            file_size_bytes: 2 * 1024 * 1024,
            download_limit: None,
        }),
        ..physical_product(id)
    }
}

/// An existing purchase of `product_id` by the default caller.
#[must_use]
pub fn purchase(product_id: &str, download_count: u64) -> DigitalPurchase {
    DigitalPurchase {
        user: Principal::new(CALLER),
        product_id: ProductId::new(product_id),
        purchase_timestamp: epoch(),
        download_count,
        allowed_downloads: 10,
    }
}

/// A valid payment processor configuration.
#[must_use]
pub fn stripe_config() -> StripeConfiguration {
    StripeConfiguration {
        secret_key: "sk_test_integration".to_string(),
        allowed_countries: vec!["IN".to_string()],
    }
}

/// An admin backend with payment setup done.
#[must_use]
pub fn admin_backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_role(UserRole::Admin)
        .with_stripe(stripe_config())
}

// =============================================================================
// Storefront helpers
// =============================================================================

/// A disconnected storefront served from [`ORIGIN`].
#[must_use]
pub fn storefront() -> Storefront {
    Storefront::new(StoreOptions::new(
        Url::parse(ORIGIN).unwrap_or_else(|err| panic!("invalid test origin: {err}")),
    ))
}

/// A storefront connected to `backend`, signed in as [`CALLER`].
pub async fn signed_in(backend: &Arc<MemoryBackend>) -> Storefront {
    let store = storefront();
    store
        .connect(backend.clone(), Some(Identity::new(CALLER)))
        .await;
    store
}

/// A storefront connected to `backend` without a signed-in caller.
pub async fn anonymous(backend: &Arc<MemoryBackend>) -> Storefront {
    let store = storefront();
    store.connect(backend.clone(), None).await;
    store
}

/// Navigator that records every URL instead of leaving the page.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}
