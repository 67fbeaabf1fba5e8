//! Background recomputation of the shared session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SessionSignal, SessionTracker};

/// Session shared between the ticker and user actions.
///
/// Tick and log/remove all read-modify-write the same state, so every access
/// goes through this one lock.
pub type SharedSession = Arc<Mutex<SessionTracker>>;

pub fn shared(tracker: SessionTracker) -> SharedSession {
    Arc::new(Mutex::new(tracker))
}

/// Handle to a running ticker. Dropping it aborts the task.
pub struct TickerHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Ask the ticker to stop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session ticker did not exit cleanly");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Recompute `session` every `period`, forwarding any signals to `on_signal`.
///
/// The first tick fires immediately.
pub fn spawn_ticker<F>(session: SharedSession, period: Duration, mut on_signal: F) -> TickerHandle
where
    F: FnMut(SessionSignal) + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let period = period.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(period_ms = period.as_millis() as u64, "Session ticker started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let signals = {
                        let mut tracker = session.lock().await;
                        tracker.tick(Utc::now())
                    };
                    for signal in signals {
                        on_signal(signal);
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Session ticker stopped");
    });

    TickerHandle {
        stop_tx,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bac::Zone;
    use crate::types::{DrinkAmount, DrinkEvent, PhysiologicalProfile};
    use chrono::Duration as ChronoDuration;
    use tokio::sync::mpsc;

    fn session_with_old_drink() -> SharedSession {
        let then = Utc::now() - ChronoDuration::hours(3);
        let mut tracker = SessionTracker::new(PhysiologicalProfile::default(), then);
        tracker.log_drink(
            DrinkEvent::new("BEER", DrinkAmount::StandardDrinks(1.0), then),
            then,
        );
        assert_eq!(tracker.state().zone, Zone::Mild);
        shared(tracker)
    }

    #[tokio::test]
    async fn test_ticker_recomputes_and_forwards_signals() {
        let session = session_with_old_drink();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = spawn_ticker(session.clone(), Duration::from_millis(10), move |signal| {
            let _ = tx.send(signal);
        });

        let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("ticker should tick")
            .expect("channel open");
        assert!(matches!(
            signal,
            SessionSignal::ZoneChanged {
                from: Zone::Mild,
                to: Zone::Sober,
                ..
            }
        ));
        assert_eq!(session.lock().await.state().zone, Zone::Sober);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let session = session_with_old_drink();
        let handle = spawn_ticker(session.clone(), Duration::from_millis(5), |_| {});
        assert!(!handle.is_finished());
        handle.stop().await;

        // Lock is free once the ticker is gone
        let tracker = session.try_lock().expect("ticker released the session");
        assert_eq!(tracker.state().drinks.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_aborts_ticker() {
        let session = session_with_old_drink();
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionSignal>();
        let handle = spawn_ticker(session, Duration::from_secs(3600), move |signal| {
            let _ = tx.send(signal);
        });
        // First tick is immediate
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(first, Ok(Some(_))));

        drop(handle);
        // Sender lives in the aborted task, so the channel closes
        let closed = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }
}
