//! Byte Bazaar storefront client.
//!
//! Cached, readiness-aware access to the storefront backend, plus the
//! customer-facing flows built on it: catalog browsing, checkout
//! initiation, purchase confirmation after the payment redirect and the
//! downloads library.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = StorefrontConfig::from_env()?;
//! let _guard = telemetry::init(&config);
//!
//! let store = Storefront::new(config.store.clone());
//! store.connect_http(&config.backend, Some(Identity::new(principal))).await?;
//!
//! let mut confirmation = PurchaseConfirmation::new(store.clone(), notifier);
//! let outcome = confirmation.drive(&RedirectParams::from_url(&url)).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cache;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod downloads;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod telemetry;

pub use backend::{Backend, BackendError, HttpBackend};
pub use cache::{CacheKey, Query, QueryStatus};
pub use checkout::{CheckoutOutcome, Navigator, RedirectUrls, begin_checkout};
pub use config::{ConfigError, StorefrontConfig};
pub use error::StoreError;
pub use notify::{Notification, Notifier};
pub use reconcile::{PurchaseConfirmation, ReconcileOutcome, RedirectParams};
pub use service::Identity;
pub use store::{Mutation, Storefront};
