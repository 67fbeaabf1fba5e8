//! HTTP client for the SipSafe backend
//!
//! Covers the drink log, analytics, photo scan and emergency SMS endpoints.
//! Reads and scans are retried on transient failures; writes are sent once
//! so a flaky connection never double-logs a drink or double-texts a contact.

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::alerts::AlertReport;
use crate::analytics::{AnalyticsRange, AnalyticsResult};
use crate::bac::abv::category_for_label;
use crate::collaborators::{
    AlertDispatcher, DrinkLogSource, DrinkRecorder, DrinkVerifier, RemoteAnalyticsSource,
    VerificationVerdict,
};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::types::{DrinkLogRecord, EmergencyContact};

/// Response from POST /api/drinklogs/scan
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[serde(default)]
    pub drink_name: String,
    #[serde(default, rename = "estimatedABV")]
    pub estimated_abv: Option<f64>,
    #[serde(default)]
    pub drink_category: Option<String>,
    /// none, low, medium or high
    #[serde(default)]
    pub tampering_risk: Option<String>,
    #[serde(default)]
    pub tampering_reasons: Vec<String>,
    #[serde(default)]
    pub safety_alert: bool,
    #[serde(default)]
    pub notes: String,
}

impl ScanResult {
    /// Decide whether a drink logged as `expected_label` may go through.
    pub fn verdict(&self, expected_label: &str) -> VerificationVerdict {
        let risk = self
            .tampering_risk
            .as_deref()
            .unwrap_or("none")
            .trim()
            .to_lowercase();

        if self.safety_alert || !matches!(risk.as_str(), "none" | "low") {
            let reasons = if self.tampering_reasons.is_empty() {
                "visual anomaly detected".to_string()
            } else {
                self.tampering_reasons.join("; ")
            };
            return VerificationVerdict {
                allowed: false,
                summary: format!("Possible tampering ({} risk): {}", risk, reasons),
            };
        }

        let expected = category_for_label(expected_label);
        if let Some(seen) = self.drink_category.as_deref() {
            let seen = seen.trim().to_lowercase();
            if !categories_compatible(expected, &seen) {
                return VerificationVerdict {
                    allowed: false,
                    summary: format!(
                        "Photo looks like {} ({}), not {}",
                        self.display_name(),
                        seen,
                        expected_label
                    ),
                };
            }
        }

        let abv = self
            .estimated_abv
            .map(|abv| format!(", ~{:.1}% ABV", abv))
            .unwrap_or_default();
        VerificationVerdict {
            allowed: true,
            summary: format!("Looks like {}{}. Tampering risk: {}.", self.display_name(), abv, risk),
        }
    }

    fn display_name(&self) -> &str {
        if self.drink_name.trim().is_empty() {
            "Unknown"
        } else {
            self.drink_name.trim()
        }
    }
}

/// Close-enough categories: a shot in a cocktail glass is fine, cider reads as beer.
fn categories_compatible(expected: &str, seen: &str) -> bool {
    matches!(
        (expected, seen),
        (_, "" | "unknown")
            | ("cocktail", "spirits")
            | ("spirits", "cocktail")
            | ("cider", "beer")
    ) || expected == seen
}

/// HTTP client for the SipSafe backend API
pub struct BackendClient {
    config: BackendConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client from configuration.
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("backend.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Build a client only when the backend is enabled and fully configured.
    pub fn from_config(config: &BackendConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }
        Self::new(config.clone()).map(Some)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Backend(format!("failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Backend(format!(
                "API error ({}): {}",
                status.as_u16(),
                error_text
            )))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http_client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| Error::Backend(format!("HTTP request failed: {}", e)))?;
        Self::read_response(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("HTTP request failed: {}", e)))?;
        Self::read_response(response).await
    }

    /// Run `request` again on transient failures (5xx, timeouts) with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = self.config.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying backend request"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match request().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!(operation, error = %e, "Transient backend error");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Backend("max retries exceeded".to_string())))
    }

    /// GET /api/drinklogs/analytics?range=
    pub async fn fetch_analytics(&self, range: AnalyticsRange) -> Result<AnalyticsResult> {
        let path = format!(
            "/api/drinklogs/analytics?range={}",
            urlencoding::encode(range.as_str())
        );
        self.with_retry("analytics", || self.get_json(&path)).await
    }

    /// GET /api/drinklogs?limit=, newest first
    pub async fn fetch_drink_logs(&self, limit: usize) -> Result<Vec<DrinkLogRecord>> {
        let path = format!("/api/drinklogs?limit={}", limit);
        self.with_retry("drink logs", || self.get_json(&path)).await
    }

    /// POST /api/drinklogs/scan
    pub async fn scan_drink(&self, photo: &[u8]) -> Result<ScanResult> {
        let body = ScanRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(photo),
        };
        self.with_retry("scan", || self.post_json("/api/drinklogs/scan", &body))
            .await
    }

    /// POST /api/drinklogs
    pub async fn create_drink_log(&self, record: &DrinkLogRecord) -> Result<()> {
        let (Some(volume_ml), Some(abv)) = (record.volume_ml, record.abv_percent) else {
            return Err(Error::InvalidInput(format!(
                "drink log {} needs a volume and ABV for the backend",
                record.id
            )));
        };
        let body = CreateDrinkLogRequest {
            drink_name: &record.label,
            category: category_for_label(&record.label),
            abv,
            volume_ml,
        };
        let _: serde_json::Value = self.post_json("/api/drinklogs", &body).await?;
        Ok(())
    }

    /// POST /api/alerts/emergency-sms
    pub async fn send_emergency_sms(
        &self,
        message: &str,
        contacts: &[EmergencyContact],
    ) -> Result<AlertReport> {
        let body = EmergencySmsRequest { contacts, message };
        self.post_json("/api/alerts/emergency-sms", &body).await
    }
}

impl DrinkLogSource for BackendClient {
    async fn list_drink_logs(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DrinkLogRecord>> {
        let mut logs = self.fetch_drink_logs(limit).await?;
        if let Some(since) = since {
            logs.retain(|log| log.created_at >= since);
        }
        Ok(logs)
    }
}

impl RemoteAnalyticsSource for BackendClient {
    async fn precomputed_analytics(&self, range: AnalyticsRange) -> Result<AnalyticsResult> {
        self.fetch_analytics(range).await
    }
}

impl DrinkVerifier for BackendClient {
    async fn verify_drink(&self, photo: &[u8], expected_label: &str) -> Result<VerificationVerdict> {
        let scan = self.scan_drink(photo).await?;
        Ok(scan.verdict(expected_label))
    }
}

impl AlertDispatcher for BackendClient {
    async fn send_alert(&self, message: &str, contacts: &[EmergencyContact]) -> Result<AlertReport> {
        self.send_emergency_sms(message, contacts).await
    }
}

impl DrinkRecorder for BackendClient {
    async fn record_drink(&self, record: &DrinkLogRecord) -> Result<()> {
        self.create_drink_log(record).await
    }
}

/// Request body for POST /api/drinklogs/scan
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanRequest {
    image_base64: String,
}

/// Request body for POST /api/drinklogs
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDrinkLogRequest<'a> {
    drink_name: &'a str,
    category: &'a str,
    abv: f64,
    volume_ml: f64,
}

/// Request body for POST /api/alerts/emergency-sms
#[derive(Serialize)]
struct EmergencySmsRequest<'a> {
    contacts: &'a [EmergencyContact],
    message: &'a str,
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Backend(msg) => {
            msg.starts_with("API error (5")
                || msg.contains("timed out")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        Error::Timeout { .. } => true,
        _ => false,
    }
}
