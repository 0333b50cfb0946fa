//! Integration tests for purchase confirmation after the payment redirect.
//!
//! These tests drive [`PurchaseConfirmation`] against the in-memory backend
//! and assert on the backend calls it makes.

use std::sync::Arc;

use bytebazaar_integration_tests::{
    CALLER, anonymous, digital_product, physical_product, purchase, signed_in,
};
use bytebazaar_storefront::backend::memory::MemoryBackend;
use bytebazaar_storefront::notify::{Level, NotificationQueue};
use bytebazaar_storefront::reconcile::{
    ConfirmationState, FAILURE_MESSAGE, SUCCESS_MESSAGE, SkipReason,
};
use bytebazaar_storefront::{
    CacheKey, Identity, PurchaseConfirmation, RedirectParams, StoreError, Storefront,
};

const RECORD: &str = "record_digital_purchase";

fn confirmation(store: Storefront) -> (PurchaseConfirmation, Arc<NotificationQueue>) {
    let queue = Arc::new(NotificationQueue::new());
    (PurchaseConfirmation::new(store, queue.clone()), queue)
}

fn successes(queue: &NotificationQueue) -> usize {
    queue
        .snapshot()
        .iter()
        .filter(|n| n.level == Level::Success)
        .count()
}

// =============================================================================
// Skipped passes
// =============================================================================

#[tokio::test]
async fn test_anonymous_caller_makes_no_calls() {
    let backend = Arc::new(MemoryBackend::new().with_products([digital_product("p1")]));
    let (mut flow, queue) = confirmation(anonymous(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1")).await;

    assert!(outcome.purchased.is_empty());
    assert_eq!(outcome.skipped, Some(SkipReason::Anonymous));
    assert!(backend.calls().is_empty(), "no backend calls expected");
    assert!(queue.snapshot().is_empty());
    assert!(matches!(flow.state(), ConfirmationState::Done(_)));
}

#[tokio::test]
async fn test_missing_redirect_params_make_no_recording_calls() {
    let backend = Arc::new(MemoryBackend::new().with_products([digital_product("p1")]));
    let (mut flow, _queue) = confirmation(signed_in(&backend).await);

    for params in [
        RedirectParams::from_query("products=p1"),
        RedirectParams::from_query("session_id=cs_1"),
        RedirectParams::from_query("session_id=cs_1&products="),
        RedirectParams::from_query(""),
    ] {
        let outcome = flow.drive(&params).await;
        assert_eq!(outcome.skipped, Some(SkipReason::MissingParams));
        assert!(outcome.purchased.is_empty());
    }

    assert_eq!(backend.count(RECORD), 0);
}

// =============================================================================
// Recording
// =============================================================================

#[tokio::test]
async fn test_only_digital_known_products_are_recorded() {
    let backend = Arc::new(
        MemoryBackend::new().with_products([digital_product("p1"), physical_product("p2")]),
    );
    let (mut flow, _queue) = confirmation(signed_in(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1,p2,p3")).await;

    assert_eq!(backend.calls_to(RECORD), vec!["p1"]);
    assert_eq!(outcome.recorded, ["p1"]);
    assert!(outcome.failed.is_empty());
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_recording_is_ordered_and_survives_failures() {
    let backend = Arc::new(MemoryBackend::new().with_products([
        digital_product("p3"),
        digital_product("p1"),
        digital_product("p2"),
    ]));
    backend.fail_on(RECORD, Some("p2"));
    let (mut flow, queue) = confirmation(signed_in(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p2,p3,p1")).await;

    assert_eq!(backend.calls_to(RECORD), vec!["p2", "p3", "p1"]);
    assert_eq!(outcome.recorded, ["p3", "p1"]);
    assert_eq!(outcome.failed, ["p2"]);
    assert!(outcome.error.is_none());

    // Entitlements for the other products are still presented
    let purchased: Vec<_> = outcome.purchased.iter().map(|d| d.product_id.clone()).collect();
    assert_eq!(purchased, ["p3", "p1"]);
    assert_eq!(successes(&queue), 1);
}

#[tokio::test]
async fn test_recording_is_sequential_with_latency() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_latency(std::time::Duration::from_millis(5))
            .with_products([digital_product("a"), digital_product("b"), digital_product("c")]),
    );
    let (mut flow, _queue) = confirmation(signed_in(&backend).await);

    flow.drive(&RedirectParams::new("cs_1", "c,a,b")).await;

    let methods: Vec<_> = backend.calls().into_iter().map(|c| c.method).collect();
    assert_eq!(
        methods,
        [
            "get_products",
            RECORD,
            RECORD,
            RECORD,
            "get_user_digital_purchases",
        ]
    );
    assert_eq!(backend.calls_to(RECORD), vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_duplicate_ids_are_recorded_per_occurrence() {
    let backend = Arc::new(MemoryBackend::new().with_products([digital_product("p1")]));
    let (mut flow, queue) = confirmation(signed_in(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1,p1")).await;

    assert_eq!(backend.calls_to(RECORD), vec!["p1", "p1"]);
    // The backend keeps one entitlement; the view shows it once
    assert_eq!(backend.purchases().len(), 1);
    assert_eq!(outcome.purchased.len(), 1);
    assert_eq!(successes(&queue), 1);
}

// =============================================================================
// Result and notifications
// =============================================================================

#[tokio::test]
async fn test_purchases_are_refreshed_and_intersected() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_products([
                digital_product("p1"),
                digital_product("p2"),
                digital_product("owned-earlier"),
                physical_product("p4"),
            ])
            .with_purchases([purchase("owned-earlier", 3)]),
    );
    let store = signed_in(&backend).await;

    // Warm the purchases cache so a stale entry exists
    let before = store.user_digital_purchases().await;
    assert_eq!(before.data.len(), 1);

    let (mut flow, queue) = confirmation(store.clone());
    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1,p2,p4")).await;

    assert_eq!(backend.count("get_user_digital_purchases"), 2);

    let purchased: Vec<_> = outcome.purchased.iter().map(|d| d.product_id.clone()).collect();
    assert_eq!(purchased, ["p1", "p2"]);
    let first = outcome.purchased.first().expect("first download");
    assert_eq!(first.url, "https://files.example.com/p1.pdf");
    assert_eq!(first.size_display(), "2.00 MB");

    let notifications = queue.snapshot();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, Level::Success);
    assert_eq!(notifications[0].message, SUCCESS_MESSAGE);

    // The store now serves the refreshed purchases
    let refreshed = store.user_digital_purchases().await.data;
    assert_eq!(refreshed.len(), 3);
    let recorded = refreshed.iter().filter(|p| p.product_id != "owned-earlier");
    assert!(recorded.clone().all(|p| p.user == CALLER));
    assert!(recorded.clone().all(|p| p.allowed_downloads == 10));
}

#[tokio::test]
async fn test_no_eligible_products_is_silent() {
    let backend = Arc::new(MemoryBackend::new().with_products([physical_product("p1")]));
    let (mut flow, queue) = confirmation(signed_in(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1,missing")).await;

    assert!(outcome.purchased.is_empty());
    assert!(outcome.error.is_none());
    assert_eq!(backend.count(RECORD), 0);
    assert!(queue.snapshot().is_empty());
}

#[tokio::test]
async fn test_product_fetch_failure_ends_with_error() {
    let backend = Arc::new(MemoryBackend::new().with_products([digital_product("p1")]));
    backend.fail_on("get_products", None);
    let (mut flow, queue) = confirmation(signed_in(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1")).await;

    assert!(outcome.error.is_some());
    assert_eq!(backend.count(RECORD), 0);
    let notifications = queue.drain();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, Level::Error);
    assert_eq!(notifications[0].message, FAILURE_MESSAGE);
    assert!(matches!(flow.state(), ConfirmationState::Done(_)));
}

#[tokio::test]
async fn test_purchases_fetch_failure_keeps_recordings() {
    let backend = Arc::new(MemoryBackend::new().with_products([digital_product("p1")]));
    backend.fail_on("get_user_digital_purchases", None);
    let (mut flow, queue) = confirmation(signed_in(&backend).await);

    let outcome = flow.drive(&RedirectParams::new("cs_1", "p1")).await;

    assert_eq!(outcome.recorded, ["p1"]);
    assert!(outcome.purchased.is_empty());
    assert!(outcome.error.is_some());
    assert_eq!(successes(&queue), 0);
    assert_eq!(queue.snapshot().len(), 1);
}

// =============================================================================
// Re-driving
// =============================================================================

#[tokio::test]
async fn test_same_trigger_does_not_record_again() {
    let backend = Arc::new(MemoryBackend::new().with_products([digital_product("p1")]));
    let store = signed_in(&backend).await;
    let (mut flow, queue) = confirmation(store.clone());
    let params = RedirectParams::new("cs_1", "p1");

    let first = flow.drive(&params).await;
    // An unrelated refresh must not re-run the pass
    store.cache().invalidate(&CacheKey::Products).await;
    let second = flow.drive(&params).await;

    assert_eq!(backend.count(RECORD), 1);
    assert_eq!(first.purchased, second.purchased);
    assert_eq!(successes(&queue), 1);
}

#[tokio::test]
async fn test_changed_trigger_runs_a_new_pass() {
    let backend = Arc::new(MemoryBackend::new().with_products([
        digital_product("p1"),
        digital_product("p2"),
    ]));
    let store = anonymous(&backend).await;
    let (mut flow, _queue) = confirmation(store.clone());

    let params = RedirectParams::new("cs_1", "p1");
    let outcome = flow.drive(&params).await;
    assert_eq!(outcome.skipped, Some(SkipReason::Anonymous));

    // Identity resolves after the first render
    store.set_identity(Some(Identity::new(CALLER))).await;
    flow.drive(&params).await;
    assert_eq!(backend.calls_to(RECORD), vec!["p1"]);

    flow.drive(&RedirectParams::new("cs_2", "p2")).await;
    assert_eq!(backend.calls_to(RECORD), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_dropped_pass_is_not_resumed() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_products([digital_product("p1")])
            .with_latency(std::time::Duration::from_millis(200)),
    );
    let (mut flow, queue) = confirmation(signed_in(&backend).await);
    let params = RedirectParams::new("cs_1", "p1");

    // The view goes away while the product list is still loading
    let abandoned =
        tokio::time::timeout(std::time::Duration::from_millis(20), flow.drive(&params)).await;
    assert!(abandoned.is_err());
    assert!(flow.is_processing());

    let calls_before = backend.calls().len();
    let outcome = flow.drive(&params).await;

    assert!(matches!(outcome.error, Some(StoreError::Internal(_))));
    assert!(outcome.purchased.is_empty());
    assert!(!flow.is_processing());
    assert_eq!(backend.calls().len(), calls_before);
    assert_eq!(backend.count(RECORD), 0);
    assert_eq!(successes(&queue), 0);
}
