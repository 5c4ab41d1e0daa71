//! HTTP surface of the reconciler.
//!
//! # Endpoints
//!
//! - `POST /signals` - Decides on one signal and returns the outcomes
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

pub mod health;
pub mod signals;

pub use health::health_handler;
pub use signals::{SignalError, signal_handler};

use crate::determinator::Determinator;
use crate::ports::Collaborators;

/// Shared application state, passed to handlers via Axum's `State`
/// extractor.
pub struct AppState<P: Collaborators> {
    determinator: Arc<Determinator<P>>,
}

impl<P: Collaborators> Clone for AppState<P> {
    fn clone(&self) -> Self {
        AppState {
            determinator: Arc::clone(&self.determinator),
        }
    }
}

impl<P: Collaborators> AppState<P> {
    pub fn new(determinator: Arc<Determinator<P>>) -> Self {
        AppState { determinator }
    }

    pub fn determinator(&self) -> &Determinator<P> {
        &self.determinator
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<P: Collaborators>(app_state: AppState<P>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/signals", post(signal_handler::<P>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
