//! Admin access gate.
//!
//! Every admin workflow takes an [`AdminSession`], which can only be obtained
//! by a signed-in caller the backend reports as admin.

use std::fmt;

use bytebazaar_storefront::{QueryStatus, StoreError, Storefront};
use tracing::{debug, instrument};

use crate::error::AdminError;

/// Proof that the current caller is an admin.
#[derive(Clone)]
pub struct AdminSession {
    store: Storefront,
}

impl fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSession")
            .field("identity", &self.store.identity())
            .finish_non_exhaustive()
    }
}

impl AdminSession {
    /// Check that the caller may use the admin panel.
    ///
    /// # Errors
    ///
    /// - `Store(ServiceUnavailable)` while the backend is not connected
    /// - `NotSignedIn` for anonymous callers
    /// - `Forbidden` if the backend does not report the caller as admin (a
    ///   failed admin check counts as "not admin")
    #[instrument(skip_all)]
    pub async fn require(store: &Storefront) -> Result<Self, AdminError> {
        if !store.service().is_ready() {
            return Err(StoreError::ServiceUnavailable.into());
        }
        if store.identity().is_none() {
            return Err(AdminError::NotSignedIn);
        }

        let is_admin = store.is_caller_admin().await;
        match is_admin.status {
            QueryStatus::Disabled => Err(StoreError::ServiceUnavailable.into()),
            _ if is_admin.data => {
                debug!("Admin session granted");
                Ok(Self {
                    store: store.clone(),
                })
            }
            _ => Err(AdminError::Forbidden),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Storefront {
        &self.store
    }

    /// Whether payment setup still blocks the other admin actions.
    ///
    /// Only a successful check reporting a configured processor opens the
    /// gate. A disconnected store is left to fail with `ServiceUnavailable`.
    pub async fn setup_required(&self) -> bool {
        let configured = self.store.is_stripe_configured().await;
        configured.status != QueryStatus::Disabled
            && !(configured.is_fetched() && configured.data)
    }

    /// Fail with `SetupRequired` until payment setup is done.
    pub(crate) async fn ensure_setup_complete(&self) -> Result<(), AdminError> {
        if self.setup_required().await {
            Err(AdminError::SetupRequired)
        } else {
            Ok(())
        }
    }
}
