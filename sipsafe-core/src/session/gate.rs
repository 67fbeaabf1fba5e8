//! Verified logging and background persistence
//!
//! Photo verification can take seconds. The session lock is only taken once
//! a verdict is in, so the ticker and other actions keep running while the
//! verifier works, and a caller that gives up leaves the session untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use super::{SessionSignal, SharedSession};
use crate::collaborators::{DrinkRecorder, DrinkVerifier};
use crate::error::Error;
use crate::types::{DrinkEvent, DrinkLogRecord};

/// Result of gating a drink on photo verification.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Verified and added to the session
    Logged(Vec<SessionSignal>),
    /// The verifier looked at the photo and said no
    Rejected(String),
    /// The verifier could not produce a verdict
    Failed(String),
}

/// Verify `photo`, then log `event` only if the verifier allows it.
pub async fn log_verified_drink<V: DrinkVerifier>(
    session: &SharedSession,
    verifier: &V,
    photo: &[u8],
    event: DrinkEvent,
    timeout: Duration,
) -> GateOutcome {
    let verdict = tokio::time::timeout(timeout, verifier.verify_drink(photo, &event.label)).await;

    let verdict = match verdict {
        Err(_) => {
            let err = Error::Timeout {
                operation: "drink verification",
                secs: timeout.as_secs(),
            };
            tracing::warn!(label = %event.label, error = %err, "Verification failed");
            return GateOutcome::Failed(err.to_string());
        }
        Ok(Err(e)) => {
            tracing::warn!(label = %event.label, error = %e, "Verification failed");
            return GateOutcome::Failed(e.to_string());
        }
        Ok(Ok(verdict)) => verdict,
    };

    if !verdict.allowed {
        tracing::info!(label = %event.label, summary = %verdict.summary, "Drink rejected");
        return GateOutcome::Rejected(verdict.summary);
    }

    let mut tracker = session.lock().await;
    GateOutcome::Logged(tracker.log_drink(event, Utc::now()))
}

/// Result of a background drink log write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted { id: String },
    Failed { id: String, reason: String },
}

/// Write `record` on a background task.
///
/// The session is never rolled back on failure; the outcome is logged and
/// handed back through the join handle for callers that care.
pub fn persist_in_background<R>(recorder: Arc<R>, record: DrinkLogRecord) -> JoinHandle<PersistOutcome>
where
    R: DrinkRecorder + 'static,
{
    tokio::spawn(async move {
        match recorder.record_drink(&record).await {
            Ok(()) => {
                tracing::debug!(id = %record.id, "Drink log persisted");
                PersistOutcome::Persisted { id: record.id }
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Failed to persist drink log");
                PersistOutcome::Failed {
                    id: record.id,
                    reason: e.to_string(),
                }
            }
        }
    })
}
