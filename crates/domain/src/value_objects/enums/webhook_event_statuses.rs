use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEventStatus {
    Processed,
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "processed" => WebhookEventStatus::Processed,
            _ => WebhookEventStatus::Failed,
        }
    }
}

/// Where a delivery stands after claiming its event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClaim {
    /// No row existed; this delivery inserted it.
    Fresh,
    /// An earlier delivery failed; this one takes the row over.
    RetryFailed,
    /// Already processed. Nothing may be written.
    Done,
}

impl EventClaim {
    pub fn from_existing(existing: Option<WebhookEventStatus>) -> Self {
        match existing {
            None => EventClaim::Fresh,
            Some(WebhookEventStatus::Failed) => EventClaim::RetryFailed,
            Some(WebhookEventStatus::Processed) => EventClaim::Done,
        }
    }
}

impl Display for WebhookEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
