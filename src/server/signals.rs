//! Direct signal intake.
//!
//! Producers that do not go through the queue post signals here and get the
//! determinator's decisions back synchronously.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::determinator::{Outcome, Signal};
use crate::error::ReconcileError;
use crate::ports::Collaborators;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl IntoResponse for SignalError {
    fn into_response(self) -> Response {
        let status = match &self {
            SignalError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            SignalError::Reconcile(ReconcileError::Validation(_)) => StatusCode::BAD_REQUEST,
            SignalError::Reconcile(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Decides on one signal.
///
/// # Response
///
/// - 200 OK with the outcome for every URL the signal concerns
/// - 400 Bad Request for a body that is not a signal or fails validation
///
/// ```ignore
/// POST /signals HTTP/1.1
/// Content-Type: application/json
///
/// {"kind": "verdict", "payload": {"clientReferenceGroupId": "c1", "url": "http://foo.com", "caseId": 7}}
///
/// HTTP/1.1 200 OK
///
/// [{"url": "http://foo.com", "decision": "resume"}]
/// ```
pub async fn signal_handler<P: Collaborators>(
    State(app_state): State<AppState<P>>,
    body: Bytes,
) -> Result<Json<Vec<Outcome>>, SignalError> {
    let signal: Signal = serde_json::from_slice(&body).inspect_err(|e| {
        warn!(error = %e, "Rejected malformed signal");
    })?;
    debug!(origin = %signal.origin(), "Received signal");

    let outcomes = app_state.determinator().handle(signal).await?;
    Ok(Json(outcomes))
}
