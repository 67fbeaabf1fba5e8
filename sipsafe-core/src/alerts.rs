//! Emergency alerts
//!
//! Alerts go out as SMS through email-to-SMS carrier gateways
//! (`5551234567@vtext.com`). This module composes the message, screens
//! contacts, and hands the usable ones to an [`AlertDispatcher`].

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::collaborators::AlertDispatcher;
use crate::error::{Error, Result};
use crate::types::EmergencyContact;

/// Gateways truncate longer bodies.
pub const MAX_MESSAGE_CHARS: usize = 300;

/// Sample number shipped in profile forms; never a real contact.
pub const PLACEHOLDER_PHONE: &str = "1234567890";

const CARRIER_GATEWAYS: &[(&str, &[&str])] = &[
    ("att", &["txt.att.net", "mms.att.net"]),
    ("verizon", &["vtext.com", "vzwpix.com"]),
    ("tmobile", &["tmomail.net"]),
    ("sprint", &["messaging.sprintpcs.com", "pm.sprint.com"]),
    ("boost", &["sms.myboostmobile.com", "myboostmobile.com"]),
    ("cricket", &["sms.cricketwireless.net", "mms.cricketwireless.net"]),
    ("uscellular", &["email.uscc.net", "mms.uscc.net"]),
    ("metropcs", &["mymetropcs.com"]),
    ("virgin", &["vmobl.com"]),
    ("visible", &["vtext.com"]),
];

/// A message accepted by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivered {
    pub to: String,
    #[serde(default)]
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub to: String,
    pub error: String,
}

/// Outcome of one alert across all contacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertReport {
    pub attempted: usize,
    #[serde(default)]
    pub sent: Vec<Delivered>,
    #[serde(default)]
    pub failed: Vec<FailedDelivery>,
}

impl AlertReport {
    /// True when at least one contact was reached.
    pub fn any_sent(&self) -> bool {
        !self.sent.is_empty()
    }
}

/// Body of the emergency SMS.
///
/// `location` is (latitude, longitude) when known.
pub fn compose_alert_message<Tz: TimeZone>(
    bac: f64,
    at: &DateTime<Tz>,
    location: Option<(f64, f64)>,
) -> String {
    let location_text = match location {
        Some((lat, lng)) => format!(
            "Coordinates: {lat:.6}, {lng:.6}. Map: https://maps.google.com/?q={lat:.6},{lng:.6}"
        ),
        None => "Location unavailable.".to_string(),
    };
    let message = format!(
        "SipSafe alert: I may need help. BAC: {:.3}%. Time: {}. {}",
        bac,
        at.naive_local().format("%-m/%-d/%Y, %-I:%M:%S %p"),
        location_text
    );
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Ten-digit US number from free-form input, dropping a leading country code.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 if digits.starts_with('1') => Some(digits[1..].to_string()),
        10 => Some(digits),
        _ => None,
    }
}

pub fn supported_carriers() -> impl Iterator<Item = &'static str> {
    CARRIER_GATEWAYS.iter().map(|(name, _)| *name)
}

/// Gateway email addresses for a phone on a carrier, in preference order.
pub fn gateway_addresses(phone: &str, carrier: &str) -> Result<Vec<String>> {
    let number = normalize_phone(phone)
        .ok_or_else(|| Error::InvalidInput("invalid US phone number".to_string()))?;
    let carrier = carrier.trim().to_lowercase();
    let domains = CARRIER_GATEWAYS
        .iter()
        .find(|(name, _)| *name == carrier)
        .map(|(_, domains)| *domains)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "unsupported or missing carrier '{}' (supported: {})",
                carrier,
                supported_carriers().collect::<Vec<_>>().join(", ")
            ))
        })?;
    Ok(domains
        .iter()
        .map(|domain| format!("{}@{}", number, domain))
        .collect())
}

/// Split contacts into ones worth sending to and rejections.
pub fn prepare_recipients(
    contacts: &[EmergencyContact],
) -> (Vec<EmergencyContact>, Vec<FailedDelivery>) {
    let mut usable = Vec::new();
    let mut rejected = Vec::new();

    for contact in contacts {
        let label = contact.label.trim();
        let phone = contact.phone.trim();
        let reject = |error: String| FailedDelivery {
            to: if phone.is_empty() { label.to_string() } else { phone.to_string() },
            error,
        };

        if label.is_empty() || phone.is_empty() {
            rejected.push(reject("contact needs a name and a phone number".to_string()));
            continue;
        }
        if normalize_phone(phone).as_deref() == Some(PLACEHOLDER_PHONE) {
            rejected.push(reject("placeholder phone number".to_string()));
            continue;
        }
        if let Err(e) = gateway_addresses(phone, &contact.carrier) {
            rejected.push(reject(e.to_string()));
            continue;
        }

        usable.push(EmergencyContact {
            label: label.to_string(),
            phone: phone.to_string(),
            carrier: contact.carrier.trim().to_lowercase(),
        });
    }

    (usable, rejected)
}

/// Send `message` to every usable contact.
///
/// Contacts rejected locally are reported as failed deliveries alongside
/// whatever the dispatcher reports.
pub async fn dispatch_alert<D: AlertDispatcher>(
    dispatcher: &D,
    message: &str,
    contacts: &[EmergencyContact],
) -> Result<AlertReport> {
    let (usable, rejected) = prepare_recipients(contacts);
    if usable.is_empty() {
        tracing::warn!(
            configured = contacts.len(),
            rejected = rejected.len(),
            "No usable emergency contacts"
        );
        return Err(Error::NoContacts);
    }

    let mut report = dispatcher.send_alert(message, &usable).await?;
    report.attempted += rejected.len();
    report.failed.extend(rejected);

    tracing::info!(
        attempted = report.attempted,
        sent = report.sent.len(),
        failed = report.failed.len(),
        "Emergency alert dispatched"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    fn contact(label: &str, phone: &str, carrier: &str) -> EmergencyContact {
        EmergencyContact {
            label: label.to_string(),
            phone: phone.to_string(),
            carrier: carrier.to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        sent_to: Mutex<Vec<String>>,
    }

    impl AlertDispatcher for RecordingDispatcher {
        async fn send_alert(&self, _message: &str, contacts: &[EmergencyContact]) -> Result<AlertReport> {
            let mut sent_to = self.sent_to.lock().unwrap();
            let sent = contacts
                .iter()
                .map(|c| {
                    sent_to.push(c.phone.clone());
                    Delivered {
                        to: c.phone.clone(),
                        sid: "queued".to_string(),
                    }
                })
                .collect();
            Ok(AlertReport {
                attempted: contacts.len(),
                sent,
                failed: Vec::new(),
            })
        }
    }

    #[test]
    fn test_compose_message() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 23, 5, 9).unwrap();
        let message = compose_alert_message(0.16, &at, None);
        assert_eq!(
            message,
            "SipSafe alert: I may need help. BAC: 0.160%. Time: 10/17/2026, 11:05:09 PM. Location unavailable."
        );

        let with_location = compose_alert_message(0.2, &at, Some((40.7128, -74.006)));
        assert!(with_location.contains("Coordinates: 40.712800, -74.006000"));
        assert!(with_location.chars().count() <= MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("+1 555 123 4567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("25551234567"), None);
        assert_eq!(normalize_phone("123"), None);
    }

    #[test]
    fn test_gateway_addresses() {
        assert_eq!(
            gateway_addresses("555-123-4567", " Verizon ").unwrap(),
            vec!["5551234567@vtext.com", "5551234567@vzwpix.com"]
        );
        assert_eq!(
            gateway_addresses("5551234567", "tmobile").unwrap(),
            vec!["5551234567@tmomail.net"]
        );
        assert!(gateway_addresses("5551234567", "pigeon").is_err());
        assert!(gateway_addresses("55512", "att").is_err());
    }

    #[test]
    fn test_prepare_recipients_filters() {
        let contacts = vec![
            contact("Mom", "555-123-4567", "att"),
            contact("", "5559876543", "att"),
            contact("Sample", "123-456-7890", "att"),
            contact("Roommate", "555", "att"),
            contact("Friend", "5550001111", ""),
        ];
        let (usable, rejected) = prepare_recipients(&contacts);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].label, "Mom");
        assert_eq!(rejected.len(), 4);
        assert!(rejected[1].error.contains("placeholder"));
    }

    #[tokio::test]
    async fn test_dispatch_merges_rejections() {
        let dispatcher = RecordingDispatcher::default();
        let contacts = vec![
            contact("Mom", "5551234567", "att"),
            contact("Dad", "5557654321", "verizon"),
            contact("Nobody", "1234567890", "att"),
        ];
        let report = dispatch_alert(&dispatcher, "help", &contacts).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.sent.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.any_sent());
        assert_eq!(dispatcher.sent_to.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_without_contacts() {
        let dispatcher = RecordingDispatcher::default();
        let err = dispatch_alert(&dispatcher, "help", &[contact("X", "1234567890", "att")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoContacts));
        assert!(dispatcher.sent_to.lock().unwrap().is_empty());
    }

    #[test]
    fn test_report_from_backend_json() {
        let json = r#"{"ok": true, "attempted": 2,
            "sent": [{"to": "5551234567@txt.att.net", "sid": "<abc@mail>"}],
            "failed": [{"to": "555", "error": "Invalid US phone number."}]}"#;
        let report: AlertReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.sent[0].sid, "<abc@mail>");
        assert_eq!(report.failed.len(), 1);
    }
}
