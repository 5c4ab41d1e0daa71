//! Hand-off from the governor back to the signal handlers.
//!
//! Redelivery is fire-and-forget: the governor only needs to know that a
//! signal was accepted for processing, not how it was decided. The binary
//! wires the target to a bounded channel drained by [`serve_redrives`].

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::determinator::{Determinator, Signal};
use crate::error::ReconcileError;
use crate::ports::Collaborators;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedriveError {
    #[error("redrive target is full")]
    Full,

    #[error("redrive target is closed")]
    Closed,
}

/// Accepts re-dispatched signals.
pub trait RedriveTarget: Send + Sync {
    /// Queues `signal` for processing without waiting for the outcome.
    ///
    /// # Errors
    ///
    /// A refused signal must stay on its source queue, so callers do not
    /// delete it.
    fn dispatch(&self, signal: Signal) -> Result<(), RedriveError>;
}

impl RedriveTarget for mpsc::Sender<Signal> {
    fn dispatch(&self, signal: Signal) -> Result<(), RedriveError> {
        self.try_send(signal).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RedriveError::Full,
            mpsc::error::TrySendError::Closed(_) => RedriveError::Closed,
        })
    }
}

/// Runs redelivered signals through the determinator until shutdown or until
/// every sender is dropped.
///
/// Each signal is handled on its own task, so a slow dependency call on one
/// does not hold up the rest of the batch. Signals that fail validation are
/// parked on the validation error queue. Handlers already running are
/// awaited before returning.
pub async fn serve_redrives<P: Collaborators>(
    determinator: Arc<Determinator<P>>,
    mut rx: mpsc::Receiver<Signal>,
    shutdown: CancellationToken,
) {
    info!("Redrive worker started");
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received, stopping redrive worker");
                break;
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Redrive handler panicked");
                }
            }

            signal = rx.recv() => {
                let Some(signal) = signal else {
                    info!("Redrive channel closed");
                    break;
                };
                in_flight.spawn(redrive_one(Arc::clone(&determinator), signal));
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Redrive handler panicked");
        }
    }
}

async fn redrive_one<P: Collaborators>(determinator: Arc<Determinator<P>>, signal: Signal) {
    let origin = signal.origin();
    let parked = signal.clone();
    match determinator.handle(signal).await {
        Ok(outcomes) => debug!(origin = %origin, outcomes = outcomes.len(), "Handled redelivered signal"),
        Err(e @ ReconcileError::Validation(_)) => determinator.park_invalid(&parked, &e).await,
        Err(e) => error!(origin = %origin, error = %e, "Redelivered signal rejected"),
    }
}
