//! Checkout initiation.
//!
//! Builds a single-item payment request for a product, asks the backend for
//! a checkout session, and hands the session URL to the host's
//! [`Navigator`].

use bytebazaar_core::{CheckoutSession, Product, ProductId, ShoppingItem};
use tracing::{info, instrument};
use url::Url;

use crate::error::{StoreError, add_breadcrumb};
use crate::notify::{Notification, Notifier};
use crate::store::Storefront;

/// Token the payment processor replaces with the real session id.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Path of the payment-success page.
pub const SUCCESS_PATH: &str = "/payment-success";

/// Path of the payment-failure page.
pub const CANCEL_PATH: &str = "/payment-failure";

/// Shown when the checkout session could not be created.
pub const CHECKOUT_FAILED_MESSAGE: &str = "Failed to start checkout. Please try again.";

/// Host hook that sends the browser elsewhere.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Success and cancel URLs handed to the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success: String,
    pub cancel: String,
}

impl RedirectUrls {
    /// Build redirect URLs under `origin` for the given products.
    ///
    /// The placeholder token is left unescaped so the processor can
    /// substitute it.
    #[must_use]
    pub fn new(origin: &Url, product_ids: &[ProductId]) -> Self {
        let origin = origin.origin().ascii_serialization();
        let products = product_ids
            .iter()
            .map(|id| urlencoding::encode(id.as_str()))
            .collect::<Vec<_>>()
            .join(",");

        Self {
            success: format!(
                "{origin}{SUCCESS_PATH}?session_id={SESSION_ID_PLACEHOLDER}&products={products}"
            ),
            cancel: format!("{origin}{CANCEL_PATH}"),
        }
    }
}

/// How a checkout attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The browser was sent to the payment page.
    Redirected(CheckoutSession),
    /// The caller must sign in first; nothing was requested.
    LoginRequired,
}

/// Start checkout for a single product.
///
/// # Errors
///
/// Returns the session-creation error after notifying the user. The browser
/// is not navigated.
#[instrument(skip_all, fields(product_id = %product.id))]
pub async fn begin_checkout(
    store: &Storefront,
    product: &Product,
    navigator: &dyn Navigator,
    notifier: &dyn Notifier,
) -> Result<CheckoutOutcome, StoreError> {
    if store.identity().is_none() {
        notifier.notify(Notification::info("Please log in to purchase products"));
        return Ok(CheckoutOutcome::LoginRequired);
    }

    add_breadcrumb(
        "checkout",
        "Checkout started",
        Some(&[("product_id", product.id.as_str())]),
    );

    let options = store.options();
    let items = vec![ShoppingItem::single(product, options.currency)];
    let urls = RedirectUrls::new(&options.origin, std::slice::from_ref(&product.id));

    match store
        .create_checkout_session(items, &urls.success, &urls.cancel)
        .await
    {
        Ok(session) => {
            info!(session_id = %session.id, "Redirecting to checkout");
            navigator.navigate(&session.url);
            Ok(CheckoutOutcome::Redirected(session))
        }
        Err(err) => {
            err.capture();
            notifier.notify(Notification::error(CHECKOUT_FAILED_MESSAGE));
            Err(err)
        }
    }
}
