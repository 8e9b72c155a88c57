use crate::relay::error::RelayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Notification channels declared when the service starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Channel {
    /// Low importance. Carries the "service running" notice.
    Service,
    /// High importance. Carries consent prompts.
    Permission,
}

impl Channel {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Service => "photo_rename_service",
            Self::Permission => "photo_rename_permission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u32,
    pub channel: Channel,
    pub title: String,
    pub body: String,
    pub deep_link: Option<String>,
    /// Auto-dismiss hint for the host.
    pub timeout: Option<Duration>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn create_channel(&self, channel: Channel) -> Result<(), RelayError>;

    async fn publish(&self, notification: &Notification) -> Result<(), RelayError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn create_channel(&self, channel: Channel) -> Result<(), RelayError> {
        info!(channel = channel.id(), "Notification channel ready");
        Ok(())
    }

    async fn publish(&self, notification: &Notification) -> Result<(), RelayError> {
        info!(
            id = notification.id,
            channel = notification.channel.id(),
            title = %notification.title,
            body = %notification.body,
            deep_link = ?notification.deep_link,
            "Notification"
        );
        Ok(())
    }
}
