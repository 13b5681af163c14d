//! Per-session cancellation of in-flight backend calls.
//!
//! One root token per session with an active call. Starting a new call
//! cancels and replaces the previous root, so each session has at most one
//! request in flight; callers get a child token so the root is never
//! handed out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::SessionId;

/// Tracks one in-flight call per session.
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    roots: HashMap<SessionId, CancellationToken>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new call for `session`, cancelling any previous one, and
    /// return a child token for the new call to observe.
    pub fn start_call(&mut self, session: SessionId) -> CancellationToken {
        if let Some(previous) = self.roots.remove(&session) {
            debug!(?session, "superseding in-flight call");
            previous.cancel();
        }
        let root = CancellationToken::new();
        let child = root.child_token();
        self.roots.insert(session, root);
        child
    }

    /// Cancel the session's in-flight call, if any. Idempotent.
    pub fn cancel_call(&mut self, session: SessionId) {
        if let Some(root) = self.roots.remove(&session) {
            debug!(?session, "cancelling in-flight call");
            root.cancel();
        }
    }

    /// Forget a call that completed on its own.
    pub fn finish_call(&mut self, session: SessionId) {
        self.roots.remove(&session);
    }

    pub fn is_in_flight(&self, session: SessionId) -> bool {
        self.roots.contains_key(&session)
    }
}

/// Cloneable handle over a [`CancellationCoordinator`], so a UI task can
/// cancel a call while the owning store is busy awaiting it.
#[derive(Debug, Clone, Default)]
pub struct SharedCanceller {
    inner: Arc<Mutex<CancellationCoordinator>>,
}

impl SharedCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CancellationCoordinator> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn start_call(&self, session: SessionId) -> CancellationToken {
        self.lock().start_call(session)
    }

    pub fn cancel_call(&self, session: SessionId) {
        self.lock().cancel_call(session)
    }

    pub fn finish_call(&self, session: SessionId) {
        self.lock().finish_call(session)
    }

    pub fn is_in_flight(&self, session: SessionId) -> bool {
        self.lock().is_in_flight(session)
    }
}
