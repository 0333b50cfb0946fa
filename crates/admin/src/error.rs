//! Error types for admin workflows.

use bytebazaar_storefront::StoreError;
use thiserror::Error;

/// Errors that can occur in the admin panel.
#[derive(Debug, Error)]
pub enum AdminError {
    /// No caller is signed in.
    #[error("Sign in required")]
    NotSignedIn,

    /// The caller is not an admin.
    #[error("Admin access required")]
    Forbidden,

    /// Payment setup must be completed first.
    #[error("Payment processor is not configured")]
    SetupRequired,

    /// A form field failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storefront operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AdminError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Message suitable for a user-facing notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotSignedIn => "Please log in to access the admin panel".to_string(),
            Self::Forbidden => "You do not have permission to access this page".to_string(),
            Self::SetupRequired => "Please configure Stripe before continuing".to_string(),
            Self::Validation(message) => message.clone(),
            Self::Store(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}
