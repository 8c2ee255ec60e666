use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{TabDescriptor, TabIndex, TabStatus};

/// Push event category carrying per-tab status changes.
pub const TAB_STATUS_EVENT: &str = "tab_status";

/// One record of the config fetch response, as sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTabRecord {
    pub label: String,
    pub icon_url: String,
    pub iframe_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restartable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
}

impl RawTabRecord {
    /// Normalizes the record into a descriptor at `index`.
    pub fn into_descriptor(self, index: TabIndex) -> TabDescriptor {
        TabDescriptor {
            index,
            label: self.label,
            icon_url: self.icon_url,
            iframe_url: self.iframe_url,
            is_restartable: self.restartable.unwrap_or(false),
            accent_color: self.accent_color,
        }
    }
}

/// Payload of a `tab_status` push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabStatusPayload {
    pub tab_index: i64,
    pub state: TabStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Typed events emitted by the host over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    TabStatus(TabStatusPayload),
}

/// Untyped view of a push frame: the category plus an unvalidated payload.
///
/// Receivers dispatch on `kind` and leave payload validation to the listener
/// registered for that category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}
