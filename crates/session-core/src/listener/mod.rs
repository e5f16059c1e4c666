//! Session lifecycle listeners
//!
//! Listeners are notified synchronously, inline with the manager call that
//! triggered the transition, in registration order. Each hook receives an
//! immutable [`SessionSnapshot`]; nothing a listener does can reach the
//! authoritative record. A panicking listener is isolated: the panic is
//! caught and logged, and delivery continues to the remaining listeners.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::session::SessionSnapshot;

/// Lifecycle notification hooks.
///
/// All methods default to no-ops so implementors only override the
/// transitions they care about. A given session receives `on_stop` or
/// `on_expiration` over its lifetime, never both.
pub trait SessionListener: Send + Sync {
    /// A session was created and persisted.
    fn on_start(&self, _session: &SessionSnapshot) {}

    /// A session was explicitly terminated.
    fn on_stop(&self, _session: &SessionSnapshot) {}

    /// Validation found a session idle past its timeout and expired it.
    fn on_expiration(&self, _session: &SessionSnapshot) {}
}

/// Ordered collection of registered listeners.
///
/// Listeners are registered and removed by reference; delivery follows
/// registration order.
pub struct SessionListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
}

impl SessionListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove a previously registered listener. Returns whether it was found.
    pub fn remove(&self, listener: &Arc<dyn SessionListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() < before
    }

    pub fn notify_start(&self, session: &SessionSnapshot) {
        self.deliver("on_start", session, |l, s| l.on_start(s));
    }

    pub fn notify_stop(&self, session: &SessionSnapshot) {
        self.deliver("on_stop", session, |l, s| l.on_stop(s));
    }

    pub fn notify_expiration(&self, session: &SessionSnapshot) {
        self.deliver("on_expiration", session, |l, s| l.on_expiration(s));
    }

    fn deliver<F>(&self, hook: &str, session: &SessionSnapshot, f: F)
    where
        F: Fn(&dyn SessionListener, &SessionSnapshot),
    {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| f(listener.as_ref(), session)));
            if result.is_err() {
                tracing::warn!(
                    "session listener panicked during {} for session [{}], continuing delivery",
                    hook,
                    session.id
                );
            }
        }
    }
}

impl Default for SessionListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
