//! Seams to everything outside the in-process session
//!
//! Each trait is one capability the tracker and analytics need from the
//! outside world. [`crate::db::Database`] and [`crate::client::BackendClient`]
//! implement the storage and network sides; tests provide in-memory fakes.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertReport;
use crate::analytics::{AnalyticsRange, AnalyticsResult};
use crate::error::Result;
use crate::types::{DrinkLogRecord, EmergencyContact, PhysiologicalProfile};

/// Where the current user's weight and sex come from.
pub trait ProfileSource: Send + Sync {
    /// `Ok(None)` when the user has not filled in a profile.
    fn current_profile(
        &self,
    ) -> impl Future<Output = Result<Option<PhysiologicalProfile>>> + Send;
}

/// Historical drink logs, newest first.
pub trait DrinkLogSource: Send + Sync {
    fn list_drink_logs(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<DrinkLogRecord>>> + Send;
}

/// Analytics already aggregated by a server.
pub trait RemoteAnalyticsSource: Send + Sync {
    fn precomputed_analytics(
        &self,
        range: AnalyticsRange,
    ) -> impl Future<Output = Result<AnalyticsResult>> + Send;
}

/// Verdict on a drink photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub allowed: bool,
    pub summary: String,
}

/// Checks a drink photo before the drink is logged.
pub trait DrinkVerifier: Send + Sync {
    fn verify_drink(
        &self,
        photo: &[u8],
        expected_label: &str,
    ) -> impl Future<Output = Result<VerificationVerdict>> + Send;
}

/// Delivers the emergency message to contacts.
pub trait AlertDispatcher: Send + Sync {
    fn send_alert(
        &self,
        message: &str,
        contacts: &[EmergencyContact],
    ) -> impl Future<Output = Result<AlertReport>> + Send;
}

/// Durable, append-only drink log storage.
pub trait DrinkRecorder: Send + Sync {
    fn record_drink(&self, record: &DrinkLogRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Profile fixed at construction, typically from the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticProfile {
    profile: Option<PhysiologicalProfile>,
}

impl StaticProfile {
    pub fn new(profile: Option<PhysiologicalProfile>) -> Self {
        Self { profile }
    }
}

impl ProfileSource for StaticProfile {
    async fn current_profile(&self) -> Result<Option<PhysiologicalProfile>> {
        Ok(self.profile)
    }
}
