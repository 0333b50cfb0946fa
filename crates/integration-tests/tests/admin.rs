//! Integration tests for admin workflows.
//!
//! These tests run the admin session against the in-memory backend,
//! covering the access gate, payment setup, catalog edits and seeding.

use std::sync::Arc;

use bytebazaar_admin::catalog::parse_price_cents;
use bytebazaar_admin::homepage::{brand_story, hero_banner};
use bytebazaar_admin::seed::SeedResult;
use bytebazaar_admin::{
    AdminError, AdminSession, CategoryDraft, DigitalDownloadDraft, ProductDraft, StripeSetup,
};
use bytebazaar_core::{ProductId, UserRole};
use bytebazaar_integration_tests::{admin_backend, digital_product, physical_product, signed_in};
use bytebazaar_storefront::backend::memory::MemoryBackend;
use bytebazaar_storefront::{CacheKey, QueryStatus, StoreError};

async fn admin_session(backend: &Arc<MemoryBackend>) -> AdminSession {
    let store = signed_in(backend).await;
    AdminSession::require(&store).await.expect("admin session")
}

// =============================================================================
// Access Gate
// =============================================================================

#[tokio::test]
async fn test_customers_are_forbidden() {
    let backend = Arc::new(MemoryBackend::new().with_role(UserRole::User));
    let store = signed_in(&backend).await;

    let err = AdminSession::require(&store).await.expect_err("forbidden");
    assert!(matches!(err, AdminError::Forbidden));
    assert_eq!(
        err.user_message(),
        "You do not have permission to access this page"
    );
}

#[tokio::test]
async fn test_admin_check_failure_is_forbidden() {
    let backend = Arc::new(admin_backend());
    backend.fail_on("is_caller_admin", None);
    let store = signed_in(&backend).await;

    assert!(matches!(
        AdminSession::require(&store).await,
        Err(AdminError::Forbidden)
    ));
}

// =============================================================================
// Payment Setup
// =============================================================================

#[tokio::test]
async fn test_setup_blocks_writes_until_configured() {
    let backend = Arc::new(MemoryBackend::new().with_role(UserRole::Admin));
    let session = admin_session(&backend).await;
    assert!(session.setup_required().await);

    let draft = CategoryDraft {
        name: "Templates".to_string(),
        description: String::new(),
    };
    let err = session
        .add_category(draft.clone())
        .await
        .expect_err("setup required");
    assert!(matches!(err, AdminError::SetupRequired));
    assert_eq!(backend.count("add_category"), 0);

    session
        .configure_stripe(&StripeSetup::new("sk_test_123").with_countries("in, us"))
        .await
        .expect("stripe configured");

    let saved = backend.stripe_configuration().expect("saved configuration");
    assert_eq!(saved.allowed_countries, vec!["IN", "US"]);
    assert!(!session.setup_required().await);

    session.add_category(draft).await.expect("category added");
    assert_eq!(backend.count("add_category"), 1);
}

#[tokio::test]
async fn test_invalid_stripe_setup_is_not_sent() {
    let backend = Arc::new(MemoryBackend::new().with_role(UserRole::Admin));
    let session = admin_session(&backend).await;

    let err = session
        .configure_stripe(&StripeSetup::new("pk_test_123"))
        .await
        .expect_err("publishable key rejected");
    assert!(matches!(err, AdminError::Validation(_)));
    assert_eq!(backend.count("set_stripe_configuration"), 0);
    assert!(session.setup_required().await);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_add_product_from_form() {
    let backend = Arc::new(admin_backend());
    let session = admin_session(&backend).await;
    assert!(session.store().products().await.data.is_empty());

    let product = session
        .add_product(ProductDraft {
            name: "Wedding Planner".to_string(),
            description: "Printable planner".to_string(),
            price: "49.50".to_string(),
            category: "templates".to_string(),
            featured: true,
            image: None,
        })
        .await
        .expect("product added");

    assert_eq!(product.price_cents, parse_price_cents("49.50").expect("price"));
    let products = session.store().products().await;
    assert_eq!(products.data, vec![product.clone()]);

    let featured = session.store().homepage_content().await.data.featured_products;
    assert_eq!(featured, vec![product]);
}

#[tokio::test]
async fn test_invalid_product_form_is_not_sent() {
    let backend = Arc::new(admin_backend());
    let session = admin_session(&backend).await;

    let err = session
        .add_product(ProductDraft {
            name: "No price".to_string(),
            description: "Missing price".to_string(),
            category: "templates".to_string(),
            ..ProductDraft::default()
        })
        .await
        .expect_err("validation");

    assert_eq!(err.user_message(), "Please fill in all required fields");
    assert_eq!(backend.count("add_product"), 0);
}

#[tokio::test]
async fn test_delete_product_refreshes_detail() {
    let backend = Arc::new(admin_backend().with_products([digital_product("p1")]));
    let session = admin_session(&backend).await;
    let store = session.store();
    let id = ProductId::new("p1");

    assert!(store.product(&id).await.expect("detail").data.is_some());
    session.delete_product(&id).await.expect("deleted");

    assert_eq!(
        store.status(&CacheKey::Product(id.clone())).await,
        QueryStatus::Idle
    );
    assert!(store.product(&id).await.expect("detail").data.is_none());
}

#[tokio::test]
async fn test_backend_rejection_surfaces_as_store_error() {
    let backend = Arc::new(admin_backend());
    let session = admin_session(&backend).await;

    let err = session
        .delete_product(&ProductId::new("missing"))
        .await
        .expect_err("not found");
    assert!(matches!(err, AdminError::Store(StoreError::Backend(_))));
    assert_eq!(err.user_message(), "Something went wrong. Please try again.");
}

// =============================================================================
// Digital Downloads
// =============================================================================

#[tokio::test]
async fn test_attach_and_remove_digital_download() {
    let backend = Arc::new(admin_backend().with_products([physical_product("p1")]));
    let session = admin_session(&backend).await;
    let product = physical_product("p1");

    let mut draft = DigitalDownloadDraft::for_product(&product).with_file(vec![7u8; 2048]);
    draft.download_limit = "5".to_string();
    session
        .save_digital_download(&product, draft)
        .await
        .expect("download saved");

    let stored = backend
        .products()
        .into_iter()
        .find(|p| p.id == "p1")
        .expect("product");
    let download = stored.digital_download.clone().expect("download attached");
    assert_eq!(download.content_type, "application/pdf");
    assert_eq!(download.file_size_bytes, 2048);
    assert_eq!(download.download_limit, Some(5));
    assert!(session.store().products().await.data[0].is_digital());

    session
        .remove_digital_download(&stored)
        .await
        .expect("download removed");
    assert!(!session.store().products().await.data[0].is_digital());
}

// =============================================================================
// Homepage
// =============================================================================

#[tokio::test]
async fn test_homepage_edits() {
    let backend = Arc::new(admin_backend());
    let session = admin_session(&backend).await;

    let banner = hero_banner("Hello", "Digital goods for everyone", None).expect("banner");
    session.set_hero_banner(banner).await.expect("banner saved");
    let story = brand_story("Our Story", "We sell files.", None).expect("story");
    session.set_brand_story(story).await.expect("story saved");

    let homepage = session.store().homepage_content().await.data;
    assert_eq!(homepage.hero_banner.title, "Hello");
    assert_eq!(homepage.brand_story.content, "We sell files.");
    assert_eq!(backend.homepage().hero_banner.subtitle, "Digital goods for everyone");
}

// =============================================================================
// Seeding
// =============================================================================

#[tokio::test]
async fn test_seed_demo_catalog_is_idempotent() {
    let backend = Arc::new(admin_backend());
    let session = admin_session(&backend).await;
    assert!(!session.demo_seeded().await);

    let first = session.seed_demo_catalog().await.expect("seeded");
    assert_eq!(
        first,
        SeedResult {
            categories_added: 4,
            products_added: 7,
            skipped: 0,
        }
    );
    assert!(session.demo_seeded().await);

    let featured = session.store().homepage_content().await.data;
    assert_eq!(featured.featured_products.len(), 4);
    assert_eq!(featured.hero_banner.title, "Welcome to Byte Bazaar");

    let second = session.seed_demo_catalog().await.expect("seeded again");
    assert_eq!(
        second,
        SeedResult {
            categories_added: 0,
            products_added: 0,
            skipped: 11,
        }
    );
    assert_eq!(backend.products().len(), 7);
    assert_eq!(backend.count("add_product"), 7);
}

#[tokio::test]
async fn test_seed_keeps_existing_products() {
    let mut existing = physical_product("product-ebook-business-guide");
    existing.name = "Custom name".to_string();
    let backend = Arc::new(admin_backend().with_products([existing]));
    let session = admin_session(&backend).await;

    let result = session.seed_demo_catalog().await.expect("seeded");

    assert_eq!(result.products_added, 6);
    assert_eq!(result.skipped, 1);
    let kept = backend
        .products()
        .into_iter()
        .find(|p| p.id == "product-ebook-business-guide")
        .expect("kept");
    assert_eq!(kept.name, "Custom name");
    assert_eq!(backend.products().len(), 7);
}
