//! Backend connection and caller identity.
//!
//! The storefront starts disconnected: the backend client becomes available
//! only once the caller's session has been resolved. [`ServiceHandle`]
//! publishes that transition on a `watch` channel so reads can wait for it
//! and resume automatically.

use std::fmt;
use std::sync::Arc;

use bytebazaar_core::Principal;
use tokio::sync::watch;

use crate::backend::Backend;
use crate::error::StoreError;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub principal: Principal,
}

impl Identity {
    #[must_use]
    pub fn new(principal: impl Into<Principal>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

/// A connected backend plus the identity it acts for.
#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn Backend>,
    identity: Option<Identity>,
}

impl Session {
    #[must_use]
    pub const fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// The signed-in caller, or `None` for an anonymous session.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Shared, observable slot holding the current [`Session`].
#[derive(Clone)]
pub struct ServiceHandle {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for ServiceHandle {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }
}

impl ServiceHandle {
    /// A handle with no backend connected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a connected backend.
    pub fn connect(&self, backend: Arc<dyn Backend>, identity: Option<Identity>) {
        self.tx.send_replace(Some(Session { backend, identity }));
    }

    /// Drop the backend connection. Reads are disabled until reconnected.
    pub fn disconnect(&self) {
        self.tx.send_replace(None);
    }

    /// Replace the identity of the current session.
    ///
    /// Returns `false` if no backend is connected.
    pub fn set_identity(&self, identity: Option<Identity>) -> bool {
        self.tx.send_if_modified(|slot| match slot {
            Some(session) if session.identity != identity => {
                session.identity = identity;
                true
            }
            _ => false,
        });
        self.is_ready()
    }

    /// Whether a backend is connected.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The current session, if connected.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// The current caller, if connected and signed in.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.tx
            .borrow()
            .as_ref()
            .and_then(|session| session.identity.clone())
    }

    /// Wait until a backend is connected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ServiceUnavailable` if the channel closes first.
    pub async fn ready(&self) -> Result<Session, StoreError> {
        let mut rx = self.tx.subscribe();
        let session = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| StoreError::ServiceUnavailable)?;
        session.clone().ok_or(StoreError::ServiceUnavailable)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::memory::MemoryBackend;

    #[tokio::test]
    async fn test_starts_disconnected() {
        let handle = ServiceHandle::new();
        assert!(!handle.is_ready());
        assert!(handle.current().is_none());
        assert!(handle.identity().is_none());
        assert!(!handle.set_identity(Some(Identity::new("abc"))));
    }

    #[tokio::test]
    async fn test_ready_resumes_after_connect() {
        let handle = ServiceHandle::new();

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.ready().await })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        handle.connect(Arc::new(MemoryBackend::new()), Some(Identity::new("abc")));
        let session = waiter.await.unwrap().unwrap();
        assert_eq!(session.identity().unwrap().principal, "abc");
    }

    #[tokio::test]
    async fn test_set_identity_and_disconnect() {
        let handle = ServiceHandle::new();
        handle.connect(Arc::new(MemoryBackend::new()), None);
        assert!(handle.identity().is_none());

        assert!(handle.set_identity(Some(Identity::new("abc"))));
        assert_eq!(handle.identity(), Some(Identity::new("abc")));

        handle.disconnect();
        assert!(!handle.is_ready());
    }
}
