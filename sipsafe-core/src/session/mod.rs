//! Live drinking session
//!
//! [`SessionTracker`] owns the drink list of the active session and the two
//! guards that keep its side effects in check:
//!
//! - `water_nudge_counter` drives the "drink water" reminder every Nth drink.
//! - `auto_alert_sent` makes the emergency alert fire at most once per session.
//!
//! Every operation takes `now` explicitly. Callers share a tracker between
//! the ticker and user actions through [`ticker::SharedSession`].

pub mod gate;
pub mod ticker;

pub use gate::{log_verified_drink, persist_in_background, GateOutcome, PersistOutcome};
pub use ticker::{shared, spawn_ticker, SharedSession, TickerHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bac::{self, Zone};
use crate::collaborators::ProfileSource;
use crate::error::{Error, Result};
use crate::types::{DrinkEvent, PhysiologicalProfile};

/// Drinks between hydration reminders unless configured otherwise.
pub const DEFAULT_HYDRATION_NUDGE_EVERY: u32 = 3;

/// Mutable state of one tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub active: bool,
    /// Newest first
    pub drinks: Vec<DrinkEvent>,
    pub current_bac: f64,
    pub zone: Zone,
    pub water_nudge_counter: u32,
    pub auto_alert_sent: bool,
}

impl SessionState {
    /// A fresh, active, empty session.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            active: true,
            drinks: Vec::new(),
            current_bac: 0.0,
            zone: Zone::Sober,
            water_nudge_counter: 0,
            auto_alert_sent: false,
        }
    }
}

/// Side effect requested by a session operation.
///
/// The tracker never performs side effects itself; callers route these to
/// notifications, the alert dispatcher, or the terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionSignal {
    /// Classification moved between zones
    ZoneChanged { from: Zone, to: Zone, bac: f64 },
    /// Time for a glass of water
    HydrationNudge { drink_count: u32 },
    /// DANGER was reached; fires once per session
    EmergencyAlert { bac: f64 },
}

/// Read-only view of the session at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub duration: String,
    pub bac: f64,
    pub zone: Zone,
    pub advice: &'static str,
    pub color: &'static str,
    pub time_to_sober: String,
    pub drink_count: usize,
    pub total_standard_drinks: f64,
    pub drinks: Vec<DrinkEvent>,
}

/// Owns the active session and recomputes it on demand.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    state: SessionState,
    profile: PhysiologicalProfile,
    hydration_nudge_every: u32,
}

impl SessionTracker {
    /// Start tracking with a fresh session.
    pub fn new(profile: PhysiologicalProfile, now: DateTime<Utc>) -> Self {
        Self::from_state(SessionState::new(now), profile)
    }

    /// Resume a previously persisted session.
    ///
    /// The stored zone and guards are kept as-is so a resumed session never
    /// re-fires an alert or a zone transition it already reported.
    pub fn from_state(state: SessionState, profile: PhysiologicalProfile) -> Self {
        Self {
            state,
            profile: profile.sanitized(),
            hydration_nudge_every: DEFAULT_HYDRATION_NUDGE_EVERY,
        }
    }

    /// Override how many drinks pass between hydration reminders (0 disables them).
    pub fn with_hydration_nudge_every(mut self, every: u32) -> Self {
        self.hydration_nudge_every = every;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn profile(&self) -> PhysiologicalProfile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: PhysiologicalProfile) {
        self.profile = profile.sanitized();
    }

    /// Reset everything, including both guards.
    pub fn start_session(&mut self, now: DateTime<Utc>) {
        self.state = SessionState::new(now);
        tracing::info!(session_id = %self.state.session_id, "Session started");
    }

    /// Ending a session is the same full reset as starting one.
    pub fn end_session(&mut self, now: DateTime<Utc>) {
        let previous = std::mem::replace(&mut self.state, SessionState::new(now));
        tracing::info!(
            session_id = %previous.session_id,
            drinks = previous.drinks.len(),
            "Session ended"
        );
    }

    /// Add a drink and recompute.
    ///
    /// Signals come back in order: zone change, emergency alert, hydration nudge.
    pub fn log_drink(&mut self, mut event: DrinkEvent, now: DateTime<Utc>) -> Vec<SessionSignal> {
        let bac_at_log = bac::estimate_bac(
            std::iter::once(&event).chain(self.state.drinks.iter()),
            &self.profile,
            now,
        );
        event.bac_at_log = bac_at_log;

        tracing::debug!(
            drink_id = %event.id,
            label = %event.label,
            bac = bac_at_log,
            "Drink logged"
        );
        self.state.drinks.insert(0, event);

        let mut signals = self.recompute(now);

        self.state.water_nudge_counter += 1;
        let every = self.hydration_nudge_every;
        if every > 0 && self.state.water_nudge_counter % every == 0 && !self.state.zone.is_danger()
        {
            signals.push(SessionSignal::HydrationNudge {
                drink_count: self.state.water_nudge_counter,
            });
        }

        signals
    }

    /// Remove a drink by id and recompute. Guards and the nudge counter are untouched.
    pub fn remove_drink(&mut self, id: &str, now: DateTime<Utc>) -> Result<Vec<SessionSignal>> {
        let index = self
            .state
            .drinks
            .iter()
            .position(|event| event.id == id)
            .ok_or_else(|| Error::DrinkNotFound(id.to_string()))?;
        let removed = self.state.drinks.remove(index);
        tracing::debug!(drink_id = %removed.id, label = %removed.label, "Drink removed");
        Ok(self.recompute(now))
    }

    /// Periodic re-evaluation against the wall clock.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SessionSignal> {
        self.recompute(now)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let bac = bac::estimate_bac(&self.state.drinks, &self.profile, now);
        let zone = Zone::classify(bac);
        SessionSnapshot {
            session_id: self.state.session_id.clone(),
            active: self.state.active,
            started_at: self.state.started_at,
            duration: bac::format_session_duration(self.state.started_at, now),
            bac,
            zone,
            advice: zone.advice(),
            color: zone.color(),
            time_to_sober: bac::format_time_to_sober(bac),
            drink_count: self.state.drinks.len(),
            total_standard_drinks: self
                .state
                .drinks
                .iter()
                .map(|event| event.amount.standard_drinks())
                .sum(),
            drinks: self.state.drinks.clone(),
        }
    }

    fn recompute(&mut self, now: DateTime<Utc>) -> Vec<SessionSignal> {
        let bac = bac::estimate_bac(&self.state.drinks, &self.profile, now);
        let zone = Zone::classify(bac);
        let previous = self.state.zone;
        self.state.current_bac = bac;
        self.state.zone = zone;

        let mut signals = Vec::new();
        if zone != previous {
            tracing::info!(from = %previous, to = %zone, bac, "Zone changed");
            signals.push(SessionSignal::ZoneChanged {
                from: previous,
                to: zone,
                bac,
            });
        }

        if zone.is_danger() && !self.state.auto_alert_sent {
            self.state.auto_alert_sent = true;
            tracing::warn!(session_id = %self.state.session_id, bac, "Danger zone reached");
            signals.push(SessionSignal::EmergencyAlert { bac });
        }

        signals
    }
}

/// Current profile from `source`, or the default profile if it has none or fails.
pub async fn resolve_profile<P: ProfileSource>(source: &P) -> PhysiologicalProfile {
    match source.current_profile().await {
        Ok(Some(profile)) => profile.sanitized(),
        Ok(None) => PhysiologicalProfile::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Profile unavailable, using default");
            PhysiologicalProfile::default()
        }
    }
}
