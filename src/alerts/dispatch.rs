//! Alert delivery to configured integrations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::HoneycombError;
use crate::plugins::defs::{AlertPolicy, IntegrationType, SEND_ALERT_DATA_INTERVAL};
use crate::plugins::{Integration, PluginArgs};
use crate::runtime::OutputIntegration;

use super::{Alert, IntegrationAlert, IntegrationAlertStatus};

/// An integration loaded with its arguments, ready to receive alerts.
#[derive(Clone)]
pub struct ConfiguredIntegration {
    pub integration: Integration,
    pub args: PluginArgs,
    /// Also deliver alerts whose policy is `Mute`.
    pub send_muted: bool,
    pub handle: Arc<dyn OutputIntegration>,
}

impl ConfiguredIntegration {
    pub fn new(
        integration: Integration,
        args: PluginArgs,
        handle: Arc<dyn OutputIntegration>,
    ) -> Self {
        Self {
            integration,
            args,
            send_muted: false,
            handle,
        }
    }

    pub fn with_send_muted(mut self, send_muted: bool) -> Self {
        self.send_muted = send_muted;
        self
    }

    pub fn name(&self) -> &str {
        &self.integration.name
    }
}

impl std::fmt::Debug for ConfiguredIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredIntegration")
            .field("integration", &self.integration.name)
            .field("send_muted", &self.send_muted)
            .finish()
    }
}

/// Registry of configured integrations plus the queue of alerts awaiting
/// follow-up polling.
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use std::time::Duration;
/// use honeycomb::alerts::IntegrationHub;
///
/// let hub = IntegrationHub::new().with_send_interval(Duration::from_secs(1));
/// assert!(hub.is_empty());
/// assert!(hub.poll_pending().await.is_empty());
/// assert_eq!(hub.pending_polls().await, 0);
/// # });
/// ```
pub struct IntegrationHub {
    integrations: Vec<ConfiguredIntegration>,
    polling: Mutex<Vec<IntegrationAlert>>,
    send_interval: Duration,
}

impl Default for IntegrationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationHub {
    pub fn new() -> Self {
        Self {
            integrations: Vec::new(),
            polling: Mutex::new(Vec::new()),
            send_interval: SEND_ALERT_DATA_INTERVAL,
        }
    }

    /// Pause between failed send attempts.
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Add an integration, replacing one already configured under the same name.
    pub fn configure(&mut self, configured: ConfiguredIntegration) {
        info!(integration = %configured.name(), send_muted = configured.send_muted, "Integration configured");
        self.integrations
            .retain(|c| c.integration.name != configured.integration.name);
        self.integrations.push(configured);
    }

    pub fn integrations(&self) -> &[ConfiguredIntegration] {
        &self.integrations
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }

    /// Integrations that should receive `alert`.
    pub fn subscribers(&self, alert: &Alert) -> Vec<&ConfiguredIntegration> {
        if alert.status == AlertPolicy::Ignore {
            return Vec::new();
        }
        self.integrations
            .iter()
            .filter(|c| c.integration.integration_type == IntegrationType::EventOutput)
            .filter(|c| c.integration.supports_event_type(&alert.event_type))
            .filter(|c| alert.status == AlertPolicy::Alert || c.send_muted)
            .collect()
    }

    /// Send `alert` to every subscriber concurrently. Alerts that went out to
    /// a polling integration are queued for [`poll_pending`](Self::poll_pending).
    pub async fn dispatch(&self, alert: &Alert) -> Vec<IntegrationAlert> {
        if alert.status == AlertPolicy::Ignore {
            info!(event_type = %alert.event_type, id = %alert.id, "Alert ignored");
            return Vec::new();
        }

        let subscribers = self.subscribers(alert);
        if subscribers.is_empty() {
            debug!(event_type = %alert.event_type, "No integration subscribed to alert");
            return Vec::new();
        }

        let results = join_all(
            subscribers
                .into_iter()
                .map(|configured| self.send_with_retries(configured, alert)),
        )
        .await;

        let queued: Vec<IntegrationAlert> = results
            .iter()
            .filter(|r| r.status == IntegrationAlertStatus::Polling)
            .cloned()
            .collect();
        if !queued.is_empty() {
            self.polling.lock().await.extend(queued);
        }
        results
    }

    /// Deliver one alert to one integration, retrying failed sends.
    pub async fn send_with_retries(
        &self,
        configured: &ConfiguredIntegration,
        alert: &Alert,
    ) -> IntegrationAlert {
        let integration = &configured.integration;
        let attempts = integration.send_retries().max(1);
        let mut delivery = IntegrationAlert::new(alert.clone(), &integration.name, attempts);

        let missing = alert.missing_fields(&integration.required_fields);
        if !missing.is_empty() {
            let error = HoneycombError::IntegrationMissingRequiredField(missing.join(", "));
            warn!(
                integration = %integration.name,
                event_type = %alert.event_type,
                error = %error,
                "Not sending alert"
            );
            delivery.status = IntegrationAlertStatus::ErrorMissing;
            return delivery;
        }

        let event = alert.to_event();
        while delivery.retries > 0 {
            match configured.handle.send_event(&event).await {
                Ok(output) => {
                    delivery.send_time = Some(Utc::now());
                    delivery.output_data = Some(output);
                    delivery.status = if integration.polling_enabled {
                        IntegrationAlertStatus::Polling
                    } else {
                        IntegrationAlertStatus::Done
                    };
                    debug!(integration = %integration.name, id = %alert.id, status = %delivery.status, "Alert sent");
                    return delivery;
                }
                Err(HoneycombError::IntegrationOutputFormat(e)) => {
                    warn!(integration = %integration.name, error = %e, "Integration returned malformed output");
                    delivery.status = IntegrationAlertStatus::ErrorSendingFormatting;
                    return delivery;
                }
                Err(e) => {
                    delivery.retries -= 1;
                    warn!(
                        integration = %integration.name,
                        retries_left = delivery.retries,
                        error = %e,
                        "Failed to send alert"
                    );
                    if delivery.retries > 0 {
                        tokio::time::sleep(self.send_interval).await;
                    }
                }
            }
        }

        delivery.status = IntegrationAlertStatus::ErrorSending;
        delivery
    }

    /// Poll every queued alert once. Finished alerts (done or failed) are
    /// returned; the rest stay queued.
    pub async fn poll_pending(&self) -> Vec<IntegrationAlert> {
        let queued = std::mem::take(&mut *self.polling.lock().await);
        let mut finished = Vec::new();
        let mut requeue = Vec::new();

        for mut delivery in queued {
            let Some(configured) = self
                .integrations
                .iter()
                .find(|c| c.integration.name == delivery.integration)
            else {
                warn!(integration = %delivery.integration, "Polling integration is no longer configured");
                delivery.status = IntegrationAlertStatus::ErrorPolling;
                finished.push(delivery);
                continue;
            };

            if polling_expired(delivery.send_time, configured.integration.polling_duration) {
                warn!(integration = %delivery.integration, id = %delivery.alert.id, "Polling time exceeded");
                delivery.status = IntegrationAlertStatus::ErrorPolling;
                finished.push(delivery);
                continue;
            }

            delivery.status = IntegrationAlertStatus::InPolling;
            let output_data = delivery.output_data.clone().unwrap_or(Value::Null);
            match configured.handle.poll_for_updates(&output_data).await {
                Ok(output) => {
                    delivery.output_data = Some(output);
                    delivery.status = IntegrationAlertStatus::Done;
                    debug!(integration = %delivery.integration, id = %delivery.alert.id, "Polling done");
                    finished.push(delivery);
                }
                Err(HoneycombError::IntegrationPollEvent(e)) => {
                    debug!(integration = %delivery.integration, error = %e, "Poll not ready, retrying later");
                    delivery.status = IntegrationAlertStatus::Polling;
                    requeue.push(delivery);
                }
                Err(HoneycombError::IntegrationOutputFormat(e)) => {
                    warn!(integration = %delivery.integration, error = %e, "Integration returned malformed poll output");
                    delivery.status = IntegrationAlertStatus::ErrorPollingFormatting;
                    finished.push(delivery);
                }
                Err(e) => {
                    warn!(integration = %delivery.integration, error = %e, "Polling failed");
                    delivery.status = IntegrationAlertStatus::ErrorPolling;
                    finished.push(delivery);
                }
            }
        }

        if !requeue.is_empty() {
            self.polling.lock().await.extend(requeue);
        }
        finished
    }

    /// Number of alerts awaiting polling.
    pub async fn pending_polls(&self) -> usize {
        self.polling.lock().await.len()
    }
}

fn polling_expired(send_time: Option<DateTime<Utc>>, polling_duration: Option<Duration>) -> bool {
    match (send_time, polling_duration) {
        (Some(sent), Some(limit)) => (Utc::now() - sent)
            .to_std()
            .map_or(false, |elapsed| elapsed > limit),
        _ => false,
    }
}
