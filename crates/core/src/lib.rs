//! Byte Bazaar Core - Shared domain types.
//!
//! This crate provides the entities exchanged with the storefront backend:
//! - `storefront` - Remote data access, purchase reconciliation, checkout
//! - `admin` - Catalog and payment administration workflows
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! The backend owns every entity; values here are ephemeral copies.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, blob handles, catalog and purchase entities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
