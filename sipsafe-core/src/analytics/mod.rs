//! Historical consumption analytics
//!
//! Buckets drink logs into hours, days or months depending on the requested
//! [`AnalyticsRange`], then compares the range against the equal-length
//! period right before it.
//!
//! - [`aggregate`]: the pure computation over a list of records
//! - [`service`]: prefers server-side aggregation, falls back to computing locally
//!
//! Result types serialize to the same JSON the backend's
//! `/api/drinklogs/analytics` endpoint returns.

pub mod aggregate;
pub mod range;
pub mod service;

pub use aggregate::compute_analytics;
pub use range::{AnalyticsRange, Granularity, Window};
pub use service::{AnalyticsOrigin, AnalyticsReport, AnalyticsService};

use serde::{Deserialize, Serialize};

/// One zero-filled slot in the consumption series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionBucket {
    /// Display label ("21:00", "Mon", "Oct 26")
    pub label: String,
    /// Sortable key: hour "0".."23", `YYYY-MM-DD`, or `YYYY-MM`
    #[serde(rename = "date")]
    pub key: String,
    pub count: u32,
    #[serde(default)]
    pub pure_alcohol_ml: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsTotals {
    pub total_drinks: u32,
    #[serde(default)]
    pub total_pure_alcohol_ml: f64,
}

/// Consumption compared with the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Same,
}

impl TrendDirection {
    pub fn compare(current: u32, previous: u32) -> Self {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => TrendDirection::Up,
            std::cmp::Ordering::Less => TrendDirection::Down,
            std::cmp::Ordering::Equal => TrendDirection::Same,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Same => "same",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsTrends {
    #[serde(rename = "consumptionDirection", alias = "direction")]
    pub direction: TrendDirection,
    pub current_period_drinks: u32,
    pub previous_period_drinks: u32,
    #[serde(default)]
    pub previous_period_pure_alcohol_ml: f64,
    /// Mean hours between consecutive drinks, one decimal
    #[serde(default)]
    pub avg_hours_between_drinks: f64,
    /// Longest gap between consecutive drinks, one decimal
    #[serde(default)]
    pub longest_gap_hours: f64,
}

/// Bucketed series plus totals and trends for one range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub buckets: Vec<ConsumptionBucket>,
    pub totals: AnalyticsTotals,
    pub trends: AnalyticsTrends,
}

impl AnalyticsResult {
    /// Busiest bucket, if any bucket has a drink.
    pub fn peak_bucket(&self) -> Option<&ConsumptionBucket> {
        self.buckets
            .iter()
            .filter(|bucket| bucket.count > 0)
            .max_by_key(|bucket| bucket.count)
    }
}
