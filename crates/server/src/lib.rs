use std::sync::Arc;

use axum::http::HeaderValue;
use remote::Backend;
use services::services::{reconciler::PositionReconciler, session::SessionStore};

pub mod error;
pub mod file_logging;
pub mod middleware;
pub mod routes;
pub mod views;

/// Shared handler state. One process serves one signed-in user; the
/// session store is the single source of truth for who that is.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn Backend>,
    session: SessionStore,
    reconciler: PositionReconciler,
    allowed_origin: Option<HeaderValue>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            session: SessionStore::new(backend.clone()),
            reconciler: PositionReconciler::new(backend.clone()),
            backend,
            allowed_origin: None,
        }
    }

    /// Lets a browser front end served from `origin` call the JSON API.
    /// Without it no cross-origin request is allowed.
    pub fn with_allowed_origin(mut self, origin: HeaderValue) -> Self {
        self.allowed_origin = Some(origin);
        self
    }

    pub fn allowed_origin(&self) -> Option<&HeaderValue> {
        self.allowed_origin.as_ref()
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn reconciler(&self) -> &PositionReconciler {
        &self.reconciler
    }
}
