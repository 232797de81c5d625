//! Shared session state.
//!
//! DESIGN
//! ======
//! `SessionStore` owns a `watch` channel over `SessionState`. The session
//! synchronizer is the only writer; the navigation guard reads snapshots and
//! waits on `loading`. Every write replaces session and identity in one
//! `send_modify`, so no observer sees a half-applied reconcile.

use std::sync::Arc;

use tokio::sync::watch;

use crate::services::types::{AuthUser, Identity, Role, Session};

// =============================================================================
// SESSION STATE
// =============================================================================

/// Process-wide auth record.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session: Option<Session>,
    pub user: Option<AuthUser>,
    pub user_id: Option<i32>,
    pub role: Option<Role>,
    /// True until the first session check resolves.
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { session: None, user: None, user_id: None, role: None, loading: true }
    }
}

impl SessionState {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        Some(Identity { user_id: self.user_id?, role: self.role? })
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Owned, injectable container for [`SessionState`]. Clones share state.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.tx.borrow().loading
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Resolve once `loading` is false. The watch is released on return.
    pub async fn wait_until_loaded(&self) {
        let mut rx = self.tx.subscribe();
        // The store holds the sender, so the channel cannot close under us.
        let _ = rx.wait_for(|state| !state.loading).await;
    }

    /// Seed identity from the local cache. Ignored once loading has finished.
    pub(crate) fn restore_identity(&self, identity: Identity) {
        self.tx.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.user_id = Some(identity.user_id);
            state.role = Some(identity.role);
            true
        });
    }

    /// Replace session and identity together, optionally ending `loading`.
    pub(crate) fn apply(&self, session: Option<Session>, identity: Option<Identity>, finish_loading: bool) {
        self.tx.send_modify(|state| {
            state.user = session.as_ref().map(|s| s.user.clone());
            state.session = session;
            state.user_id = identity.map(|i| i.user_id);
            state.role = identity.map(|i| i.role);
            if finish_loading {
                state.loading = false;
            }
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
