//! Checkout and entitlement entities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::error::ParseError;
use super::id::{Principal, ProductId};
use super::price::CurrencyCode;

/// A user's entitlement to download one digital product.
///
/// The backend is the sole authority on uniqueness and on incrementing
/// `download_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalPurchase {
    pub user: Principal,
    pub product_id: ProductId,
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    pub purchase_timestamp: DateTime<Utc>,
    pub download_count: u64,
    pub allowed_downloads: u64,
}

impl DigitalPurchase {
    /// Downloads left before the ceiling is reached.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.allowed_downloads.saturating_sub(self.download_count)
    }

    /// Whether every allowed download has been used.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

/// One line of a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub product_name: String,
    pub product_description: String,
    /// Unit price in minor currency units.
    pub price_in_cents: u64,
    pub quantity: u64,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl ShoppingItem {
    /// A quantity-one line for a single product.
    #[must_use]
    pub fn single(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            product_name: product.name.clone(),
            product_description: product.description.clone(),
            price_in_cents: product.price_cents,
            quantity: 1,
            currency: currency.code().to_string(),
        }
    }
}

/// Payment-processor checkout session the browser is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl CheckoutSession {
    /// Parse the serialized session returned by the backend.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload is not a JSON object and
    /// `ParseError::MissingField("url")` if it carries no redirect URL.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let session: RawCheckoutSession = serde_json::from_str(raw)?;
        let url = session
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ParseError::MissingField("url"))?;

        Ok(Self {
            id: session.id.unwrap_or_default(),
            url,
        })
    }
}

/// Payment-processor credentials stored by the backend.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeConfiguration {
    pub secret_key: String,
    /// Two-letter ISO country codes allowed at checkout.
    pub allowed_countries: Vec<String>,
}

impl fmt::Debug for StripeConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfiguration")
            .field("secret_key", &"[REDACTED]")
            .field("allowed_countries", &self.allowed_countries)
            .finish()
    }
}
