//! Session synchronizer: reconciles provider sessions into shared state.
//!
//! ARCHITECTURE
//! ============
//! `initialize` restores the cached identity, subscribes to provider change
//! events, resolves the first session and only then starts the listener
//! task, so the initial reconcile always completes before any change event
//! is processed. Events that arrive earlier wait in the subscription queue.
//!
//! ERROR HANDLING
//! ==============
//! Provider failures during `initialize` surface to the caller. Record-store
//! failures are logged and leave identity unset for that cycle. The
//! ensure-user-row write runs as a spawned task whose errors only reach the
//! log. A missing row is created insert-only, so a row written concurrently
//! (e.g. by registration) is never overwritten.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::Subscription;
use super::provider::{IdentityProvider, UserRecordStore};
use super::registration::generate_userid;
use super::types::{AuthEvent, AuthUser, Identity, Role, ServiceError, Session, UserRecord};
use crate::state::SessionStore;
use crate::storage::{self, LocalStorage};

/// Errors surfaced by [`SessionSynchronizer::initialize`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session already initialized")]
    AlreadyInitialized,
    #[error("identity provider error: {0}")]
    Provider(#[from] ServiceError),
}

/// Single writer of [`SessionStore`].
pub struct SessionSynchronizer {
    store: SessionStore,
    provider: Arc<dyn IdentityProvider>,
    records: Arc<dyn UserRecordStore>,
    storage: Arc<dyn LocalStorage>,
    initialized: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    /// Users with a row creation in flight.
    creating: Arc<Mutex<HashSet<Uuid>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionSynchronizer {
    #[must_use]
    pub fn new(
        store: SessionStore,
        provider: Arc<dyn IdentityProvider>,
        records: Arc<dyn UserRecordStore>,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        Self {
            store,
            provider,
            records,
            storage,
            initialized: AtomicBool::new(false),
            listener: Mutex::new(None),
            background: Mutex::new(Vec::new()),
            creating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Restore cached identity, resolve the first session and start
    /// listening for provider changes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyInitialized`] on a second call, or
    /// [`SessionError::Provider`] if the session request fails. In the latter
    /// case `loading` stays true and the subscription is released.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), SessionError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyInitialized);
        }

        if let Some(identity) = storage::read_cached_identity(self.storage.as_ref()) {
            debug!(user_id = identity.user_id, role = %identity.role, "restored cached identity");
            self.store.restore_identity(identity);
        }

        let subscription = self.provider.on_auth_state_change();
        let session = self.provider.get_session().await?;
        let logged_in = session.is_some();
        self.reconcile(session, true).await;
        info!(logged_in, "session initialized");

        let handle = tokio::spawn(listen(Arc::downgrade(self), subscription));
        *lock(&self.listener) = Some(handle);
        Ok(())
    }

    /// Apply a provider change. Never touches `loading`.
    pub async fn on_session_change(&self, event: AuthEvent, session: Option<Session>) {
        debug!(%event, has_session = session.is_some(), "auth state changed");
        self.reconcile(session, false).await;
    }

    async fn reconcile(&self, session: Option<Session>, finish_loading: bool) {
        let Some(session) = session else {
            storage::clear_cached_identity(self.storage.as_ref());
            self.store.apply(None, None, finish_loading);
            return;
        };

        let user = session.user.clone();
        let lookup = self.records.find_identity(user.id).await;
        let identity = match &lookup {
            Ok(Some(identity)) => Some(*identity),
            Ok(None) => {
                debug!(user = %user.id, "no user record yet");
                None
            }
            Err(e) => {
                warn!(user = %user.id, error = %e, "user record lookup failed");
                None
            }
        };

        match identity {
            Some(identity) => storage::write_cached_identity(self.storage.as_ref(), identity),
            None => storage::clear_cached_identity(self.storage.as_ref()),
        }
        self.store.apply(Some(session), identity, finish_loading);

        if let Ok(existing) = lookup {
            self.spawn_ensure_user_row(user, existing);
        }
    }

    fn spawn_ensure_user_row(&self, user: AuthUser, existing: Option<Identity>) {
        let creates = existing.is_none();
        if creates && !lock(&self.creating).insert(user.id) {
            debug!(user = %user.id, "user row creation already in flight");
            return;
        }
        let records = Arc::clone(&self.records);
        let creating = Arc::clone(&self.creating);
        let handle = tokio::spawn(async move {
            match ensure_user_row(records.as_ref(), &user, existing).await {
                Ok(Some(record)) => debug!(user = %user.id, userid = record.userid, "user row ensured"),
                Ok(None) => debug!(user = %user.id, "user row already present, left untouched"),
                Err(e) => warn!(user = %user.id, error = %e, "ensure user row failed"),
            }
            if creates {
                lock(&creating).remove(&user.id);
            }
        });
        let mut background = lock(&self.background);
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Wait for every spawned ensure-user-row task to finish.
    pub async fn flush_background(&self) {
        let handles = std::mem::take(&mut *lock(&self.background));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task aborted");
            }
        }
    }

    /// Release the provider subscription and drain background work.
    pub async fn shutdown(&self) {
        let listener = lock(&self.listener).take();
        if let Some(handle) = listener {
            handle.abort();
            let _ = handle.await;
        }
        self.flush_background().await;
    }
}

impl Drop for SessionSynchronizer {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }
}

async fn listen(synchronizer: Weak<SessionSynchronizer>, mut subscription: Subscription) {
    while let Some((event, session)) = subscription.recv().await {
        let Some(synchronizer) = synchronizer.upgrade() else {
            break;
        };
        synchronizer.on_session_change(event, session).await;
    }
    subscription.unsubscribe();
}

/// Refresh the user row found by the lookup, or create one if there was none.
/// Returns `None` when the create lost to a row that appeared meanwhile.
async fn ensure_user_row(
    records: &dyn UserRecordStore,
    user: &AuthUser,
    existing: Option<Identity>,
) -> Result<Option<UserRecord>, ServiceError> {
    if let Some(identity) = existing {
        let record = UserRecord::for_auth_user(user, identity);
        records.upsert(&record).await?;
        return Ok(Some(record));
    }

    let role = user
        .metadata_str("role")
        .and_then(|raw| raw.parse::<Role>().ok())
        .unwrap_or(Role::Staff);
    let identity = Identity { user_id: generate_userid(records).await?, role };
    let record = UserRecord::for_auth_user(user, identity);
    Ok(records.insert_if_absent(&record).await?.then_some(record))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
