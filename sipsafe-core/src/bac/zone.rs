//! Safety zones derived from an estimated BAC.

use serde::{Deserialize, Serialize};

/// Upper bound (exclusive) of the MILD zone.
pub const MILD_UPPER: f64 = 0.06;
/// Upper bound (exclusive) of the CAUTION zone.
pub const CAUTION_UPPER: f64 = 0.10;
/// BAC at or above which the DANGER zone starts.
pub const DANGER_THRESHOLD: f64 = 0.15;

/// Discretized safety classification of a BAC value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Zone {
    #[default]
    Sober,
    Mild,
    Caution,
    High,
    Danger,
}

impl Zone {
    /// Step function over the zone thresholds.
    pub fn classify(bac: f64) -> Self {
        if bac <= 0.0 || bac.is_nan() {
            Zone::Sober
        } else if bac < MILD_UPPER {
            Zone::Mild
        } else if bac < CAUTION_UPPER {
            Zone::Caution
        } else if bac < DANGER_THRESHOLD {
            Zone::High
        } else {
            Zone::Danger
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Zone::Sober => "SOBER",
            Zone::Mild => "MILD",
            Zone::Caution => "CAUTION",
            Zone::High => "HIGH",
            Zone::Danger => "DANGER",
        }
    }

    /// Fixed advisory shown alongside the zone.
    pub fn advice(&self) -> &'static str {
        match self {
            Zone::Sober => "ALL CLEAR. STAY HYDRATED.",
            Zone::Mild => "MILD EFFECTS. DRINK WATER.",
            Zone::Caution => "COORDINATION AFFECTED. NO DRIVING.",
            Zone::High => "SIGNIFICANTLY IMPAIRED. STOP NOW.",
            Zone::Danger => "SEEK HELP IMMEDIATELY.",
        }
    }

    /// Display color token: "safe", "caution", "red" or "paper-on-red".
    pub fn color(&self) -> &'static str {
        match self {
            Zone::Sober | Zone::Mild => "safe",
            Zone::Caution => "caution",
            Zone::High => "red",
            Zone::Danger => "paper-on-red",
        }
    }

    pub fn is_danger(&self) -> bool {
        matches!(self, Zone::Danger)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SOBER" => Some(Zone::Sober),
            "MILD" => Some(Zone::Mild),
            "CAUTION" => Some(Zone::Caution),
            "HIGH" => Some(Zone::High),
            "DANGER" => Some(Zone::Danger),
            _ => None,
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(Zone::classify(0.0), Zone::Sober);
        assert_eq!(Zone::classify(0.0599), Zone::Mild);
        assert_eq!(Zone::classify(0.06), Zone::Caution);
        assert_eq!(Zone::classify(0.0999), Zone::Caution);
        assert_eq!(Zone::classify(0.10), Zone::High);
        assert_eq!(Zone::classify(0.1499), Zone::High);
        assert_eq!(Zone::classify(0.15), Zone::Danger);
        assert_eq!(Zone::classify(0.4), Zone::Danger);
    }

    #[test]
    fn test_tiny_positive_bac_is_mild() {
        assert_eq!(Zone::classify(1e-9), Zone::Mild);
    }

    #[test]
    fn test_zone_ordering() {
        assert!(Zone::Danger > Zone::High);
        assert!(Zone::Mild > Zone::Sober);
    }

    #[test]
    fn test_parse_roundtrips_label() {
        for zone in [Zone::Sober, Zone::Mild, Zone::Caution, Zone::High, Zone::Danger] {
            assert_eq!(Zone::parse(zone.label()), Some(zone));
        }
        assert_eq!(Zone::parse("tipsy"), None);
    }

    #[test]
    fn test_advice_and_colors() {
        assert_eq!(Zone::Danger.advice(), "SEEK HELP IMMEDIATELY.");
        assert_eq!(Zone::Sober.color(), Zone::Mild.color());
        assert_eq!(Zone::Danger.color(), "paper-on-red");
    }
}
