//! Alerts emitted by running services and their delivery to integrations.
//!
//! - **Alert**: one event reported by a service, tagged with its type's policy
//! - **IntegrationAlert**: delivery state of one alert for one integration
//! - **dispatch**: `IntegrationHub`, the explicit registry of configured
//!   integrations that sends, retries and polls

pub mod dispatch;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::plugins::defs::{AlertPolicy, EVENT_TYPE};
use crate::plugins::service::AlertType;

pub use dispatch::{ConfiguredIntegration, IntegrationHub};

/// One event reported by a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    /// Policy of the alert's type at the time it was raised.
    pub status: AlertPolicy,
    /// Alert fields supplied by the service.
    pub fields: Map<String, Value>,
}

impl Alert {
    pub fn new(alert_type: &AlertType, fields: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: alert_type.name.clone(),
            status: alert_type.policy,
            fields,
        }
    }

    /// Flat event handed to `send_event`: service fields plus the alert's own
    /// `id`, `timestamp`, `event_type` and `status`, which take precedence.
    pub fn to_event(&self) -> Map<String, Value> {
        let mut event = self.fields.clone();
        event.insert("id".into(), Value::String(self.id.to_string()));
        event.insert("timestamp".into(), Value::String(self.timestamp.to_rfc3339()));
        event.insert(EVENT_TYPE.into(), Value::String(self.event_type.clone()));
        event.insert("status".into(), Value::String(self.status.as_str().into()));
        event
    }

    /// Names from `required` that the event does not carry (or carries as `null`).
    pub fn missing_fields<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        let event = self.to_event();
        required
            .iter()
            .filter(|f| event.get(f.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect()
    }
}

/// Delivery state of an alert for one integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationAlertStatus {
    Pending,
    /// Sent; the integration expects follow-up polling.
    Polling,
    InPolling,
    Done,
    /// Alert lacked the integration's required fields.
    ErrorMissing,
    ErrorSending,
    ErrorPolling,
    ErrorSendingFormatting,
    ErrorPollingFormatting,
}

impl IntegrationAlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Polling => "polling",
            Self::InPolling => "in_polling",
            Self::Done => "done",
            Self::ErrorMissing => "error_missing",
            Self::ErrorSending => "error_sending",
            Self::ErrorPolling => "error_polling",
            Self::ErrorSendingFormatting => "error_sending_formatting",
            Self::ErrorPollingFormatting => "error_polling_formatting",
        }
    }

    /// No further work will be done for this alert.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending | Self::Polling | Self::InPolling)
    }

    pub fn is_error(&self) -> bool {
        self.is_final() && *self != Self::Done
    }
}

impl fmt::Display for IntegrationAlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert on its way to one integration.
#[derive(Debug, Clone)]
pub struct IntegrationAlert {
    pub alert: Alert,
    /// Name of the target integration.
    pub integration: String,
    pub status: IntegrationAlertStatus,
    /// Send attempts left.
    pub retries: u32,
    pub send_time: Option<DateTime<Utc>>,
    /// Last response of the integration, fed back into `poll_for_updates`.
    pub output_data: Option<Value>,
}

impl IntegrationAlert {
    pub fn new(alert: Alert, integration: &str, retries: u32) -> Self {
        Self {
            alert,
            integration: integration.to_string(),
            status: IntegrationAlertStatus::Pending,
            retries,
            send_time: None,
            output_data: None,
        }
    }
}

impl fmt::Display for IntegrationAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.alert.event_type, self.integration, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert_type(policy: AlertPolicy) -> AlertType {
        AlertType {
            name: "ssh_login".into(),
            label: "SSH login".into(),
            service: "ssh".into(),
            policy,
            fields: vec!["username".into(), "originating_ip".into()],
        }
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_alert_takes_policy_of_type() {
        let alert = Alert::new(&alert_type(AlertPolicy::Mute), Map::new());
        assert_eq!(alert.event_type, "ssh_login");
        assert_eq!(alert.status, AlertPolicy::Mute);
    }

    #[test]
    fn test_to_event_alert_keys_win() {
        let alert = Alert::new(
            &alert_type(AlertPolicy::Alert),
            fields(json!({"username": "root", "event_type": "spoofed"})),
        );
        let event = alert.to_event();
        assert_eq!(event["username"], "root");
        assert_eq!(event["event_type"], "ssh_login");
        assert_eq!(event["status"], "Alert");
        assert_eq!(event["id"], alert.id.to_string());
    }

    #[test]
    fn test_missing_fields() {
        let alert = Alert::new(
            &alert_type(AlertPolicy::Alert),
            fields(json!({"username": "root", "password": null})),
        );
        let required = vec![
            "username".to_string(),
            "password".to_string(),
            "originating_ip".to_string(),
            "timestamp".to_string(),
        ];
        assert_eq!(alert.missing_fields(&required), vec!["password", "originating_ip"]);
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_value(IntegrationAlertStatus::ErrorSendingFormatting).unwrap(),
            json!("error_sending_formatting")
        );
        assert_eq!(IntegrationAlertStatus::InPolling.to_string(), "in_polling");
        assert!(IntegrationAlertStatus::Done.is_final());
        assert!(!IntegrationAlertStatus::Polling.is_final());
        assert!(IntegrationAlertStatus::ErrorMissing.is_error());
        assert!(!IntegrationAlertStatus::Done.is_error());
    }

    #[test]
    fn test_alert_serde_roundtrip_keeps_fields() {
        let alert = Alert::new(
            &alert_type(AlertPolicy::Ignore),
            fields(json!({"username": "admin"})),
        );
        let back: Alert = serde_json::from_value(serde_json::to_value(&alert).unwrap()).unwrap();
        assert_eq!(back, alert);
    }
}
