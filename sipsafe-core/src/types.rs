//! Core domain types for sipsafe
//!
//! | Term | Definition |
//! |------|------------|
//! | **DrinkEvent** | One drink logged into the live session |
//! | **DrinkAmount** | How much alcohol a drink carries (standard drinks or volume + ABV) |
//! | **DrinkLogRecord** | A historical, append-only drink log used for analytics |
//! | **PhysiologicalProfile** | Weight and sex used by the Widmark estimate |
//! | **EmergencyContact** | Someone who receives the danger alert by SMS |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grams of ethanol in one US standard drink.
pub const GRAMS_PER_STANDARD_DRINK: f64 = 14.0;

/// Density of ethanol in g/mL.
pub const ETHANOL_DENSITY_G_PER_ML: f64 = 0.789;

// ============================================
// Drinks
// ============================================

/// Quantity of alcohol in a drink.
///
/// The live session logs pre-computed standard drinks; historical logs
/// carry raw volume and ABV. Both normalize to grams of ethanol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrinkAmount {
    /// Pre-computed US standard drinks (1.0 = 14 g ethanol)
    StandardDrinks(f64),
    /// Raw serving volume and alcohol by volume percentage
    Volume { volume_ml: f64, abv_percent: f64 },
}

impl DrinkAmount {
    /// Grams of ethanol in this amount. Non-finite or negative inputs yield 0.
    pub fn ethanol_grams(&self) -> f64 {
        let grams = match *self {
            DrinkAmount::StandardDrinks(std) => std * GRAMS_PER_STANDARD_DRINK,
            DrinkAmount::Volume {
                volume_ml,
                abv_percent,
            } => volume_ml * (abv_percent / 100.0) * ETHANOL_DENSITY_G_PER_ML,
        };
        if grams.is_finite() {
            grams.max(0.0)
        } else {
            0.0
        }
    }

    /// Millilitres of pure ethanol in this amount.
    pub fn pure_alcohol_ml(&self) -> f64 {
        match *self {
            DrinkAmount::Volume {
                volume_ml,
                abv_percent,
            } => (volume_ml * abv_percent / 100.0).max(0.0),
            DrinkAmount::StandardDrinks(_) => self.ethanol_grams() / ETHANOL_DENSITY_G_PER_ML,
        }
    }

    /// Equivalent number of standard drinks.
    pub fn standard_drinks(&self) -> f64 {
        self.ethanol_grams() / GRAMS_PER_STANDARD_DRINK
    }
}

/// A drink logged into the live session.
///
/// Immutable once created; removed only by explicit removal or a session reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrinkEvent {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Drink type name (preset label or catalog name)
    pub label: String,
    /// Alcohol quantity
    pub amount: DrinkAmount,
    /// When the drink was logged
    pub timestamp: DateTime<Utc>,
    /// Session BAC right after this drink was logged (set by the tracker)
    #[serde(default)]
    pub bac_at_log: f64,
}

impl DrinkEvent {
    /// Create a new event with a fresh id.
    pub fn new(label: impl Into<String>, amount: DrinkAmount, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            amount,
            timestamp,
            bac_at_log: 0.0,
        }
    }

    /// Historical log record for durable persistence.
    pub fn to_log_record(&self, estimated_bac_contribution: Option<f64>) -> DrinkLogRecord {
        let (volume_ml, abv_percent) = match self.amount {
            DrinkAmount::Volume {
                volume_ml,
                abv_percent,
            } => (Some(volume_ml), Some(abv_percent)),
            DrinkAmount::StandardDrinks(_) => (None, None),
        };
        DrinkLogRecord {
            id: self.id.clone(),
            label: self.label.clone(),
            created_at: self.timestamp,
            volume_ml,
            abv_percent,
            pure_alcohol_ml: Some(self.amount.pure_alcohol_ml()),
            estimated_bac_contribution,
        }
    }
}

/// A historical drink log, as stored locally or returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkLogRecord {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default, alias = "drinkName")]
    pub label: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub volume_ml: Option<f64>,
    #[serde(default, alias = "abv")]
    pub abv_percent: Option<f64>,
    #[serde(default)]
    pub pure_alcohol_ml: Option<f64>,
    #[serde(default)]
    pub estimated_bac_contribution: Option<f64>,
}

impl DrinkLogRecord {
    /// Pure ethanol volume: stored value, else derived from volume and ABV, else 0.
    pub fn pure_alcohol_ml(&self) -> f64 {
        if let Some(ml) = self.pure_alcohol_ml {
            return ml;
        }
        match (self.volume_ml, self.abv_percent) {
            (Some(volume_ml), Some(abv_percent)) => volume_ml * abv_percent / 100.0,
            _ => 0.0,
        }
    }
}

// ============================================
// Profile
// ============================================

/// Biological sex, selecting the Widmark body-water constant.
///
/// Only two values exist in the model; anything else deserializes as
/// `Female`, matching how profiles were read on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    #[default]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }

    /// Parse leniently: "male" (any case) is male, everything else female.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("male") {
            Sex::Male
        } else {
            Sex::Female
        }
    }
}

impl<'de> Deserialize<'de> for Sex {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Sex::parse_lenient(&s))
    }
}

/// Weight and sex used by the BAC estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysiologicalProfile {
    pub weight_lbs: f64,
    pub sex: Sex,
}

impl PhysiologicalProfile {
    pub const DEFAULT_WEIGHT_LBS: f64 = 130.0;

    /// Replace an unusable weight (zero, negative, NaN) with the default.
    pub fn sanitized(self) -> Self {
        if self.weight_lbs.is_finite() && self.weight_lbs > 0.0 {
            self
        } else {
            tracing::warn!(
                weight_lbs = self.weight_lbs,
                "Invalid profile weight, using default"
            );
            Self {
                weight_lbs: Self::DEFAULT_WEIGHT_LBS,
                ..self
            }
        }
    }
}

impl Default for PhysiologicalProfile {
    fn default() -> Self {
        Self {
            weight_lbs: Self::DEFAULT_WEIGHT_LBS,
            sex: Sex::Female,
        }
    }
}

// ============================================
// Contacts
// ============================================

/// An emergency contact reachable through an email-to-SMS carrier gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub carrier: String,
}
