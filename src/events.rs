//! Fire-and-forget events for the notification pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{FollowGraphError, Result};
use crate::model::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowEventKind {
    /// A PENDING edge was created
    FollowRequested,
    /// An ACTIVE edge was created directly (public target)
    Followed,
    /// A PENDING edge became ACTIVE
    FollowRequestAccepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowEvent {
    pub kind: FollowEventKind,
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Receives events after the transaction that caused them commits.
/// `emit` must not block and has no result.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: FollowEvent);
}

/// Writes events to the log only
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: FollowEvent) {
        log::info!(
            "event {:?}: {} -> {}",
            event.kind, event.follower_id, event.followee_id
        );
    }
}

/// POSTs each event as JSON to a webhook on a detached task
pub struct WebhookEventSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookEventSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FollowGraphError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl EventSink for WebhookEventSink {
    fn emit(&self, event: FollowEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("no async runtime, dropping event {:?}", event.kind);
            return;
        };
        let client = self.client.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    log::debug!("delivered {:?} event for {}", event.kind, event.followee_id);
                }
                Ok(resp) => log::warn!("event webhook returned {} for {:?}", resp.status(), event.kind),
                Err(e) => log::warn!("event webhook failed for {:?}: {}", event.kind, e),
            }
        });
    }
}

/// Build the sink named in the config
pub fn from_config(config: &Config) -> Result<Arc<dyn EventSink>> {
    match &config.events.webhook_url {
        Some(url) => Ok(Arc::new(WebhookEventSink::new(
            url,
            Duration::from_millis(config.events.timeout_ms),
        )?)),
        None => Ok(Arc::new(LogEventSink)),
    }
}

/// Collects events in memory for assertions
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub events: std::sync::Mutex<Vec<FollowEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn kinds(&self) -> Vec<FollowEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: FollowEvent) {
        self.events.lock().unwrap().push(event);
    }
}
