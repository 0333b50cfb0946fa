//! Byte Bazaar admin workflows.
//!
//! Catalog management, digital-download editing, homepage content, payment
//! processor setup and demo seeding, all built on the storefront client.
//!
//! # Security
//!
//! Every workflow hangs off an [`AdminSession`], which is only handed out
//! to a signed-in caller the backend reports as admin. The backend enforces
//! the same rule on every write; the session gate only spares a round trip.
//!
//! # Setup gate
//!
//! Until a payment processor configuration is saved, every write except
//! [`AdminSession::configure_stripe`] fails with
//! [`AdminError::SetupRequired`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod downloads;
pub mod error;
pub mod homepage;
pub mod payments;
pub mod seed;
pub mod session;

pub use catalog::{CategoryDraft, ProductDraft};
pub use downloads::DigitalDownloadDraft;
pub use error::AdminError;
pub use payments::StripeSetup;
pub use seed::SeedResult;
pub use session::AdminSession;
