//! Analytics with a remote-first, local-fallback policy.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use super::{compute_analytics, AnalyticsRange, AnalyticsResult};
use crate::collaborators::{DrinkLogSource, RemoteAnalyticsSource};
use crate::error::{Error, Result};

/// Logs fetched for local aggregation unless configured otherwise.
pub const DEFAULT_FALLBACK_LOG_LIMIT: usize = 500;

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsOrigin {
    /// Aggregated by the server
    Remote,
    /// Computed in-process from listed logs
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub range: AnalyticsRange,
    pub origin: AnalyticsOrigin,
    /// The local listing hit its limit, so older logs were left out
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(flatten)]
    pub result: AnalyticsResult,
}

/// Serves analytics from a remote aggregator when available, otherwise from
/// raw logs.
pub struct AnalyticsService<R, L> {
    remote: Option<R>,
    logs: L,
    fallback_limit: usize,
}

impl<R, L> AnalyticsService<R, L>
where
    R: RemoteAnalyticsSource,
    L: DrinkLogSource,
{
    pub fn new(remote: Option<R>, logs: L) -> Self {
        Self {
            remote,
            logs,
            fallback_limit: DEFAULT_FALLBACK_LOG_LIMIT,
        }
    }

    pub fn with_fallback_limit(mut self, limit: usize) -> Self {
        self.fallback_limit = limit.max(1);
        self
    }

    /// Analytics for `range` as of `now`.
    ///
    /// Fails only when both the remote source and the local computation fail.
    pub async fn get_analytics<Tz: TimeZone>(
        &self,
        range: AnalyticsRange,
        now: DateTime<Tz>,
    ) -> Result<AnalyticsReport> {
        let remote_error = match &self.remote {
            Some(remote) => match remote.precomputed_analytics(range).await {
                Ok(result) => {
                    tracing::debug!(range = %range, "Using remote analytics");
                    return Ok(AnalyticsReport {
                        range,
                        origin: AnalyticsOrigin::Remote,
                        truncated: false,
                        result,
                    });
                }
                Err(e) => {
                    tracing::warn!(range = %range, error = %e, "Remote analytics failed, computing locally");
                    e.to_string()
                }
            },
            None => "no remote analytics source configured".to_string(),
        };

        // Reach back far enough to cover the previous-period comparison
        let (since, _) = range.window(&now).previous_period();
        match self.logs.list_drink_logs(self.fallback_limit, Some(since)).await {
            Ok(records) => {
                let truncated = records.len() >= self.fallback_limit;
                if truncated {
                    tracing::warn!(
                        range = %range,
                        limit = self.fallback_limit,
                        since = %since,
                        "Local analytics hit the log limit, older drinks are not counted"
                    );
                }
                Ok(AnalyticsReport {
                    range,
                    origin: AnalyticsOrigin::Local,
                    truncated,
                    result: compute_analytics(range, &records, now),
                })
            }
            Err(e) => {
                tracing::error!(range = %range, error = %e, "Local analytics failed");
                Err(Error::AnalyticsUnavailable {
                    remote: remote_error,
                    local: e.to_string(),
                })
            }
        }
    }
}
