//! Unified error handling with Sentry integration.
//!
//! Provides `StoreError`, returned by every accessor and flow in this crate.
//! Server-side failures are captured to Sentry via [`StoreError::capture`]
//! before being surfaced to the user as a notification.

use std::sync::Arc;

use bytebazaar_core::ParseError;
use thiserror::Error;

use crate::backend::BackendError;

/// Storefront error type.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend connection is not established yet.
    #[error("Service unavailable: backend not connected")]
    ServiceUnavailable,

    /// The operation needs a signed-in caller.
    #[error("Not signed in")]
    Unauthenticated,

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] Arc<BackendError>),

    /// Backend returned data the client cannot use.
    #[error("Malformed response: {0}")]
    MalformedResponse(Arc<ParseError>),

    /// Internal invariant broken.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        Self::Backend(Arc::new(err))
    }
}

impl From<ParseError> for StoreError {
    fn from(err: ParseError) -> Self {
        Self::MalformedResponse(Arc::new(err))
    }
}

impl StoreError {
    /// Whether the backend reported the requested entity as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(err) if matches!(**err, BackendError::NotFound(_)))
    }

    /// Report server-side failures to Sentry and log them with the event id.
    ///
    /// Client-side conditions (not connected, not signed in) are only logged.
    pub fn capture(&self) {
        if matches!(
            self,
            Self::Backend(_) | Self::MalformedResponse(_) | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::warn!(error = %self, "Storefront request refused");
        }
    }
}

/// Set the Sentry user context from the caller's principal.
///
/// Call this after the identity resolves to associate errors with users.
pub fn set_sentry_user(principal: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(principal.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Checkout started", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::ServiceUnavailable.to_string(),
            "Service unavailable: backend not connected"
        );

        let err = StoreError::from(BackendError::Rejected("Unknown product".to_string()));
        assert_eq!(err.to_string(), "Backend error: Rejected: Unknown product");

        let err = StoreError::from(ParseError::MissingField("url"));
        assert!(matches!(err, StoreError::MalformedResponse(_)));
    }

    #[test]
    fn test_is_not_found() {
        assert!(StoreError::from(BackendError::NotFound("product p9".to_string())).is_not_found());
        assert!(!StoreError::from(BackendError::RateLimited(1)).is_not_found());
        assert!(!StoreError::Unauthenticated.is_not_found());
    }

    #[test]
    fn test_capture_without_client_is_noop() {
        // No Sentry client is bound in tests
        StoreError::Internal("broken".to_string()).capture();
        StoreError::Unauthenticated.capture();
    }
}
