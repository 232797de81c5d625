//! Navigation guard: gates route transitions on shared session state.
//!
//! DESIGN
//! ======
//! The decision is a pure function of the target and a [`SessionState`]
//! snapshot. A transition that arrives while the first session check is in
//! flight is deferred: it waits for `loading` to clear, drops its watch, and
//! is decided again for the original target. Only session presence gates a
//! route; identity fields never do.

use tracing::debug;

use super::routes::{LANDING, LOGIN, RouteName, Target};
use crate::state::{SessionState, SessionStore};

/// Outcome of one evaluation of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wait for the first session check.
    Defer,
    Allow,
    Redirect(RouteName),
}

#[must_use]
pub fn decide(target: &Target, state: &SessionState) -> Decision {
    if state.loading {
        return Decision::Defer;
    }
    let logged_in = state.is_logged_in();
    if target.requires_auth() && !logged_in {
        return Decision::Redirect(LOGIN);
    }
    if target.is(LOGIN) && logged_in {
        return Decision::Redirect(LANDING);
    }
    Decision::Allow
}

/// Lifecycle of a single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Pending,
    Deferred,
    Allowed,
    Redirected(RouteName),
}

impl TransitionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Allowed | Self::Redirected(_))
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub target: Target,
    pub state: TransitionState,
}

impl Transition {
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self { target, state: TransitionState::Pending }
    }

    /// Evaluate against `snapshot`. Terminal transitions do not move.
    pub fn advance(&mut self, snapshot: &SessionState) -> TransitionState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.state = match decide(&self.target, snapshot) {
            Decision::Defer => TransitionState::Deferred,
            Decision::Allow => TransitionState::Allowed,
            Decision::Redirect(to) => TransitionState::Redirected(to),
        };
        self.state
    }
}

/// Where a navigation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allowed(Target),
    Redirected { from: Target, to: Target },
}

impl Navigation {
    /// The target actually rendered.
    #[must_use]
    pub fn destination(&self) -> &Target {
        match self {
            Self::Allowed(target) | Self::Redirected { to: target, .. } => target,
        }
    }
}

#[derive(Clone)]
pub struct NavigationGuard {
    store: SessionStore,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub async fn navigate(&self, full_path: &str) -> Navigation {
        self.before_each(Target::resolve(full_path)).await
    }

    /// Run `target` through the guard, waiting out the first session check
    /// if needed.
    pub async fn before_each(&self, target: Target) -> Navigation {
        let mut transition = Transition::new(target);
        loop {
            match transition.advance(&self.store.snapshot()) {
                TransitionState::Allowed => {
                    debug!(target = %transition.target, "navigation allowed");
                    return Navigation::Allowed(transition.target);
                }
                TransitionState::Redirected(to) => {
                    debug!(from = %transition.target, %to, "navigation redirected");
                    return Navigation::Redirected { from: transition.target, to: Target::named(to) };
                }
                TransitionState::Deferred | TransitionState::Pending => {
                    debug!(target = %transition.target, "navigation deferred until session loads");
                    self.store.wait_until_loaded().await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
