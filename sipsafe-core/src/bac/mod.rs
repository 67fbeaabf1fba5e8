//! Blood alcohol estimation
//!
//! Widmark model: each drink contributes a peak concentration
//! `grams / (weight_kg * 1000 * r) * 100` (percent), eliminated linearly at
//! 0.015 %/hour. Contributions are summed and the total clamped at zero.
//!
//! Everything here is pure: `now` is always passed in, never read from a clock.

pub mod abv;
pub mod zone;

pub use abv::{estimate_custom_abv, volume_ml_from_standard_drinks, DrinkPreset, PRESETS};
pub use zone::Zone;

use chrono::{DateTime, Utc};

use crate::types::{DrinkAmount, DrinkEvent, PhysiologicalProfile, Sex};

/// Pounds to kilograms.
pub const KG_PER_LB: f64 = 0.453592;

/// BAC eliminated per hour, in percent.
pub const ELIMINATION_RATE_PER_HOUR: f64 = 0.015;

/// Widmark body-water constant for males.
pub const WIDMARK_R_MALE: f64 = 0.73;

/// Widmark body-water constant for females.
pub const WIDMARK_R_FEMALE: f64 = 0.66;

impl Sex {
    /// Widmark body-water distribution constant.
    pub fn widmark_r(&self) -> f64 {
        match self {
            Sex::Male => WIDMARK_R_MALE,
            Sex::Female => WIDMARK_R_FEMALE,
        }
    }
}

/// Peak BAC (percent) one drink adds for this profile, before any elimination.
pub fn peak_contribution(amount: &DrinkAmount, profile: &PhysiologicalProfile) -> f64 {
    let profile = profile.sanitized();
    let weight_kg = profile.weight_lbs * KG_PER_LB;
    (amount.ethanol_grams() / (weight_kg * 1000.0 * profile.sex.widmark_r())) * 100.0
}

/// Hours elapsed between `from` and `now`; drinks stamped in the future count as zero.
fn elapsed_hours(from: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = now.signed_duration_since(from).num_milliseconds();
    (millis as f64 / 3_600_000.0).max(0.0)
}

/// Remaining BAC contribution of a single drink at `now`.
pub fn remaining_contribution(
    event: &DrinkEvent,
    profile: &PhysiologicalProfile,
    now: DateTime<Utc>,
) -> f64 {
    let peak = peak_contribution(&event.amount, profile);
    let eliminated = peak.min(elapsed_hours(event.timestamp, now) * ELIMINATION_RATE_PER_HOUR);
    peak - eliminated
}

/// Estimated BAC (percent) at `now` for a set of drinks.
///
/// Order-independent and never negative. For a fixed set of drinks the
/// result never increases as `now` moves forward.
pub fn estimate_bac<'a, I>(events: I, profile: &PhysiologicalProfile, now: DateTime<Utc>) -> f64
where
    I: IntoIterator<Item = &'a DrinkEvent>,
{
    let total: f64 = events
        .into_iter()
        .map(|event| remaining_contribution(event, profile, now))
        .sum();
    // An empty sum is -0.0
    if total > 0.0 {
        total
    } else {
        0.0
    }
}

/// Hours until BAC reaches zero at the constant elimination rate.
pub fn hours_to_sober(bac: f64) -> f64 {
    (bac / ELIMINATION_RATE_PER_HOUR).max(0.0)
}

/// Format an hour count as "2H 15M", "2H" or "15M".
pub fn format_hours(hours: f64) -> String {
    let mut hh = hours.floor() as i64;
    let mut mm = ((hours - hours.floor()) * 60.0).round() as i64;
    if mm == 60 {
        hh += 1;
        mm = 0;
    }
    match (hh, mm) {
        (0, mm) => format!("{}M", mm),
        (hh, 0) => format!("{}H", hh),
        (hh, mm) => format!("{}H {}M", hh, mm),
    }
}

/// Time until sober, e.g. "NOW", "2H 30M", "4H", "45M".
pub fn format_time_to_sober(bac: f64) -> String {
    let hours = hours_to_sober(bac);
    if hours <= 0.0 {
        return "NOW".to_string();
    }
    format_hours(hours)
}

/// How long a session has been running, in the same "H/M" style.
pub fn format_session_duration(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_hours(elapsed_hours(started_at, now))
}
