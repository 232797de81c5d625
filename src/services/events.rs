//! Auth-change fan-out with explicit subscription handles.
//!
//! DESIGN
//! ======
//! Each subscriber owns an unbounded queue, so events emitted while the
//! subscriber is busy (e.g. during the initial reconcile) are delivered
//! later in emission order. Dropping or unsubscribing a `Subscription`
//! removes its queue from the hub immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::types::{AuthEvent, Session};

/// One change notification: the event and the session it produced.
pub type AuthChange = (AuthEvent, Option<Session>);

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<AuthChange>>,
}

/// Registry of auth-change listeners.
#[derive(Clone, Default)]
pub struct AuthEventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl AuthEventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new listener.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, tx);
        Subscription { id, hub: self.clone(), rx }
    }

    /// Deliver `(event, session)` to every live listener.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let mut inner = self.lock();
        inner
            .listeners
            .retain(|_, tx| tx.send((event, session.clone())).is_ok());
        tracing::debug!(%event, listeners = inner.listeners.len(), "auth event emitted");
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn remove(&self, id: u64) {
        self.lock().listeners.remove(&id);
    }
}

/// Standing registration with an [`AuthEventHub`].
///
/// Released on [`Subscription::unsubscribe`] or drop.
pub struct Subscription {
    id: u64,
    hub: AuthEventHub,
    rx: mpsc::UnboundedReceiver<AuthChange>,
}

impl Subscription {
    /// Wait for the next change.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        self.rx.recv().await
    }

    /// Take an already-queued change without waiting.
    pub fn try_recv(&mut self) -> Option<AuthChange> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
