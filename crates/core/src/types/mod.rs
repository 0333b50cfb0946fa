//! Core types for Byte Bazaar.
//!
//! This module provides type-safe wrappers for the storefront's domain concepts.

pub mod blob;
pub mod catalog;
pub mod error;
pub mod id;
pub mod price;
pub mod purchase;
pub mod status;

pub use blob::{ExternalBlob, UploadProgress};
pub use catalog::{
    BrandStory, Category, DigitalDownload, HeroBanner, HomepageContent, Product, UserProfile,
    format_megabytes,
};
pub use error::ParseError;
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use purchase::{CheckoutSession, DigitalPurchase, ShoppingItem, StripeConfiguration};
pub use status::*;
