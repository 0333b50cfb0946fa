//! Purchase confirmation after the payment-processor redirect.
//!
//! # Architecture
//!
//! - [`RedirectParams`] carries the two success-URL query parameters
//!   (`session_id`, `products`)
//! - [`plan_recordings`] decides, without side effects, which candidates get
//!   an entitlement recorded
//! - [`PurchaseConfirmation`] is the `Idle -> Processing -> Done` machine; it
//!   runs one pass per distinct trigger (identity, session id, product list)
//!   and replays the stored outcome when driven again with the same trigger
//!
//! Recording is sequential in list order. A failed recording is logged and
//! the pass moves on to the next candidate.

use std::collections::HashSet;
use std::sync::Arc;

use bytebazaar_core::{DigitalPurchase, Principal, Product, ProductId};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::cache::CacheKey;
use crate::error::{StoreError, add_breadcrumb};
use crate::notify::{Notification, Notifier};
use crate::service::Identity;
use crate::store::Storefront;

/// Download ceiling granted to every recorded purchase.
pub const DEFAULT_ALLOWED_DOWNLOADS: u64 = 10;

/// Shown once a pass yields at least one downloadable product.
pub const SUCCESS_MESSAGE: &str = "Your digital products are ready for download!";

/// Shown when a pass could not complete.
pub const FAILURE_MESSAGE: &str =
    "There was an issue processing your purchase. Please contact support.";

// =============================================================================
// Redirect parameters
// =============================================================================

/// Query parameters of the payment-success redirect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RedirectParams {
    pub session_id: Option<String>,
    /// Comma-separated product ids.
    pub products: Option<String>,
}

impl RedirectParams {
    #[must_use]
    pub fn new(session_id: impl Into<String>, products: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            products: Some(products.into()),
        }
    }

    /// Parse a query string (with or without the leading `?`).
    ///
    /// Unknown parameters are ignored; the last occurrence of a repeated
    /// parameter wins.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "session_id" => params.session_id = Some(value.into_owned()),
                "products" => params.products = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Parse the query of a full redirect URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        url.query().map(Self::from_query).unwrap_or_default()
    }

    /// Whether both parameters are present and non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.session_id) && present(&self.products)
    }

    /// Candidate ids in list order. Duplicates and unknown ids are kept.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.products
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| p.split(',').map(ProductId::from).collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Why a pass had nothing to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No signed-in caller to attribute purchases to.
    Anonymous,
    /// The page was reached without the redirect parameters.
    MissingParams,
}

/// What happens to one candidate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateAction {
    Record,
    /// Not in the product list.
    SkipUnknown,
    /// The product has no digital download.
    SkipNotDigital,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub product_id: ProductId,
    pub action: CandidateAction,
}

/// Side effects a pass will perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    Skip(SkipReason),
    Process(Vec<Candidate>),
}

impl ReconcilePlan {
    /// Product ids to record, in call order.
    pub fn recordings(&self) -> impl Iterator<Item = &ProductId> {
        let candidates = match self {
            Self::Skip(_) => &[][..],
            Self::Process(candidates) => candidates.as_slice(),
        };
        candidates
            .iter()
            .filter(|c| c.action == CandidateAction::Record)
            .map(|c| &c.product_id)
    }
}

/// Why a pass would not run at all, if it would not.
#[must_use]
pub fn skip_reason(identity: Option<&Identity>, params: &RedirectParams) -> Option<SkipReason> {
    if identity.is_none() {
        Some(SkipReason::Anonymous)
    } else if !params.is_complete() {
        Some(SkipReason::MissingParams)
    } else {
        None
    }
}

/// Decide which candidates get an entitlement recorded.
#[must_use]
pub fn plan_recordings(
    identity: Option<&Identity>,
    params: &RedirectParams,
    products: &[Product],
) -> ReconcilePlan {
    if let Some(reason) = skip_reason(identity, params) {
        return ReconcilePlan::Skip(reason);
    }

    let candidates = params
        .product_ids()
        .into_iter()
        .map(|product_id| {
            let action = match products.iter().find(|p| p.id == product_id) {
                None => CandidateAction::SkipUnknown,
                Some(product) if !product.is_digital() => CandidateAction::SkipNotDigital,
                Some(_) => CandidateAction::Record,
            };
            Candidate { product_id, action }
        })
        .collect();

    ReconcilePlan::Process(candidates)
}

/// Downloads the caller now owns among `candidates`, in purchase-record order.
fn purchased_downloads(
    purchases: &[DigitalPurchase],
    products: &[Product],
    candidates: &[ProductId],
) -> Vec<PurchasedDownload> {
    let mut seen = HashSet::new();
    purchases
        .iter()
        .filter(|purchase| candidates.contains(&purchase.product_id))
        .filter_map(|purchase| products.iter().find(|p| p.id == purchase.product_id))
        .filter(|product| seen.insert(product.id.clone()))
        .filter_map(PurchasedDownload::from_product)
        .collect()
}

// =============================================================================
// Outcome
// =============================================================================

/// One download ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasedDownload {
    pub product_id: ProductId,
    pub name: String,
    pub content_type: String,
    pub file_size_bytes: u64,
    /// Direct download URL.
    pub url: String,
}

impl PurchasedDownload {
    fn from_product(product: &Product) -> Option<Self> {
        let download = product.digital_download.as_ref()?;
        Some(Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            content_type: download.content_type.clone(),
            file_size_bytes: download.file_size_bytes,
            url: download.download_file.direct_url().into_owned(),
        })
    }

    /// File size as megabytes (e.g. "2.50 MB").
    #[must_use]
    pub fn size_display(&self) -> String {
        bytebazaar_core::format_megabytes(self.file_size_bytes)
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Downloads to present, possibly empty.
    pub purchased: Vec<PurchasedDownload>,
    /// Ids whose recording call succeeded, in call order.
    pub recorded: Vec<ProductId>,
    /// Ids whose recording call failed, in call order.
    pub failed: Vec<ProductId>,
    /// Set when the pass had nothing to do.
    pub skipped: Option<SkipReason>,
    /// Set when the pass could not complete.
    pub error: Option<StoreError>,
}

impl ReconcileOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

// =============================================================================
// State machine
// =============================================================================

/// Where a confirmation is in its lifecycle.
#[derive(Debug, Clone, Default)]
pub enum ConfirmationState {
    #[default]
    Idle,
    Processing,
    Done(ReconcileOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Trigger {
    caller: Option<Principal>,
    params: RedirectParams,
}

/// Purchase confirmation for one view of the payment-success page.
pub struct PurchaseConfirmation {
    store: Storefront,
    notifier: Arc<dyn Notifier>,
    trigger: Option<Trigger>,
    state: ConfirmationState,
}

impl PurchaseConfirmation {
    #[must_use]
    pub fn new(store: Storefront, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            trigger: None,
            state: ConfirmationState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ConfirmationState {
        &self.state
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self.state, ConfirmationState::Processing)
    }

    /// Run the flow for the current caller and `params`.
    ///
    /// Driving again with an unchanged caller and parameters returns the
    /// stored outcome without touching the backend. A pass whose future was
    /// dropped mid-way is not resumed.
    pub async fn drive(&mut self, params: &RedirectParams) -> ReconcileOutcome {
        let trigger = Trigger {
            caller: self.store.identity().map(|i| i.principal),
            params: params.clone(),
        };

        if self.trigger.as_ref() == Some(&trigger) {
            match &self.state {
                ConfirmationState::Done(outcome) => return outcome.clone(),
                ConfirmationState::Processing => {
                    warn!("Previous confirmation pass was interrupted");
                    let outcome = ReconcileOutcome {
                        error: Some(StoreError::Internal(
                            "purchase confirmation interrupted".to_string(),
                        )),
                        ..ReconcileOutcome::default()
                    };
                    self.state = ConfirmationState::Done(outcome.clone());
                    return outcome;
                }
                ConfirmationState::Idle => {}
            }
        }

        self.trigger = Some(trigger);
        self.state = ConfirmationState::Processing;
        let outcome = run_pass(&self.store, self.notifier.as_ref(), params).await;
        self.state = ConfirmationState::Done(outcome.clone());
        outcome
    }
}

#[instrument(skip_all, fields(session_id = params.session_id.as_deref().unwrap_or_default()))]
async fn run_pass(
    store: &Storefront,
    notifier: &dyn Notifier,
    params: &RedirectParams,
) -> ReconcileOutcome {
    let identity = store.identity();
    if let Some(reason) = skip_reason(identity.as_ref(), params) {
        debug!(?reason, "Nothing to reconcile");
        return ReconcileOutcome::skipped(reason);
    }

    let fail = |outcome: ReconcileOutcome, err: StoreError| {
        err.capture();
        notifier.notify(Notification::error(FAILURE_MESSAGE));
        ReconcileOutcome {
            error: Some(err),
            ..outcome
        }
    };

    let products = match store.try_products().await {
        Ok(products) => products,
        Err(err) => return fail(ReconcileOutcome::default(), err),
    };

    let plan = plan_recordings(identity.as_ref(), params, &products);
    let mut outcome = ReconcileOutcome::default();

    if let ReconcilePlan::Process(candidates) = &plan {
        for candidate in candidates {
            let id = &candidate.product_id;
            match candidate.action {
                CandidateAction::SkipUnknown => debug!(product_id = %id, "Unknown product, skipping"),
                CandidateAction::SkipNotDigital => {
                    debug!(product_id = %id, "Product has no digital download, skipping");
                }
                CandidateAction::Record => {
                    add_breadcrumb(
                        "purchase",
                        "Recording digital purchase",
                        Some(&[("product_id", id.as_str())]),
                    );
                    match store
                        .record_digital_purchase(id, DEFAULT_ALLOWED_DOWNLOADS)
                        .await
                    {
                        Ok(()) => outcome.recorded.push(id.clone()),
                        Err(err) => {
                            error!(product_id = %id, error = %err, "Failed to record digital purchase");
                            outcome.failed.push(id.clone());
                        }
                    }
                }
            }
        }
    }

    // Recording already invalidated this key unless every call failed
    store.cache().invalidate(&CacheKey::UserDigitalPurchases).await;
    let purchases = match store.try_user_digital_purchases().await {
        Ok(purchases) => purchases,
        Err(err) => return fail(outcome, err),
    };

    outcome.purchased = purchased_downloads(&purchases, &products, &params.product_ids());
    info!(
        recorded = outcome.recorded.len(),
        failed = outcome.failed.len(),
        purchased = outcome.purchased.len(),
        "Purchase reconciled"
    );

    if !outcome.purchased.is_empty() {
        notifier.notify(Notification::success(SUCCESS_MESSAGE));
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytebazaar_core::{CategoryId, DigitalDownload, ExternalBlob};
    use chrono::DateTime;

    use super::*;

    fn product(id: &str, digital: bool) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_uppercase(),
            description: String::new(),
            price_cents: 500,
            category: CategoryId::new("e-books"),
            featured: false,
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            images: vec![],
            digital_download: digital.then(|| DigitalDownload {
                content_type: "application/pdf".to_string(),
                download_file: ExternalBlob::from_url(format!("https://files.example.com/{id}")),
                file_size_bytes: 1_048_576,
                download_limit: None,
            }),
        }
    }

    fn purchase(id: &str) -> DigitalPurchase {
        DigitalPurchase {
            user: Principal::new("me"),
            product_id: ProductId::new(id),
            purchase_timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            download_count: 0,
            allowed_downloads: DEFAULT_ALLOWED_DOWNLOADS,
        }
    }

    #[test]
    fn test_params_from_query() {
        let params = RedirectParams::from_query("?session_id=cs_1&products=p1%2Cp2,p3&x=1");
        assert_eq!(params.session_id.as_deref(), Some("cs_1"));
        assert_eq!(
            params.product_ids(),
            vec![ProductId::new("p1"), ProductId::new("p2"), ProductId::new("p3")]
        );

        let url = Url::parse("https://shop.example.com/payment-success?products=p1").unwrap();
        let params = RedirectParams::from_url(&url);
        assert!(!params.is_complete());
        assert_eq!(RedirectParams::from_query(""), RedirectParams::default());
    }

    #[test]
    fn test_plan_skips_anonymous_and_incomplete() {
        let params = RedirectParams::new("cs_1", "p1");
        assert_eq!(
            plan_recordings(None, &params, &[product("p1", true)]),
            ReconcilePlan::Skip(SkipReason::Anonymous)
        );

        let me = Identity::new("me");
        for params in [
            RedirectParams::default(),
            RedirectParams::new("", "p1"),
            RedirectParams::new("cs_1", ""),
        ] {
            assert_eq!(
                plan_recordings(Some(&me), &params, &[product("p1", true)]),
                ReconcilePlan::Skip(SkipReason::MissingParams)
            );
        }
    }

    #[test]
    fn test_plan_classifies_candidates() {
        let me = Identity::new("me");
        let products = [product("p1", true), product("p2", false)];
        let plan = plan_recordings(
            Some(&me),
            &RedirectParams::new("cs_1", "p1,p2,p3,p1"),
            &products,
        );

        let ReconcilePlan::Process(candidates) = &plan else {
            panic!("expected a processing plan");
        };
        let actions: Vec<_> = candidates.iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                CandidateAction::Record,
                CandidateAction::SkipNotDigital,
                CandidateAction::SkipUnknown,
                CandidateAction::Record,
            ]
        );
        // One recording per occurrence
        assert_eq!(plan.recordings().count(), 2);
    }

    #[test]
    fn test_purchased_downloads_intersection() {
        let products = [product("p1", true), product("p2", false), product("p4", true)];
        let purchases = [purchase("p4"), purchase("p1"), purchase("p2"), purchase("p1")];
        let candidates = [ProductId::new("p1"), ProductId::new("p2")];

        let purchased = purchased_downloads(&purchases, &products, &candidates);
        assert_eq!(purchased.len(), 1);
        assert_eq!(purchased[0].product_id, "p1");
        assert_eq!(purchased[0].url, "https://files.example.com/p1");
        assert_eq!(purchased[0].size_display(), "1.00 MB");
    }
}
