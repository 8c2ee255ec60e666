//! Tab status synchronization and restart orchestration.
//!
//! A [`TabSession`] loads the configured tabs once, seeds a [`StatusStore`],
//! keeps it current from `tab_status` push events, and runs optimistic
//! restarts through the [`RestartOrchestrator`]. Renderers read the result
//! through [`presentation::present`].

use anyhow::{anyhow, Context, Result};
use url::Url;

pub mod config_loader;
pub mod error;
pub mod notifications;
pub mod presentation;
pub mod push_channel;
pub mod restart;
pub mod session;
pub mod status_events;
pub mod status_store;
pub mod transport;

pub use config_loader::{ConfigLoader, ConfigSource};
pub use error::{ConfigError, RestartError};
pub use notifications::{Notification, NotificationSink, ToastQueue, TracingNotificationSink};
pub use presentation::{present, ConfigLoadState, RenderMode, RestartControl, TabView, UiAction};
pub use push_channel::{connect_push_channel, EventHub, ListenerId, PushChannel, PushListener};
pub use restart::{RestartCommand, RestartOrchestrator, RestartOutcome, RollbackPolicy};
pub use session::{SessionDeps, TabSession};
pub use status_events::{StatusEvent, StatusEventSubscriber, StatusSubscription};
pub use status_store::{StatusAccessor, StatusChange, StatusSnapshot, StatusSource, StatusStore};
pub use transport::HttpTabApi;

/// Connection settings for one tab host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSyncConfig {
    server_url: String,
}

impl TabSyncConfig {
    pub fn new(server_url: impl AsRef<str>) -> Result<Self> {
        let raw = server_url.as_ref().trim();
        let parsed =
            Url::parse(raw).with_context(|| format!("invalid tab host url: {raw}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must start with http:// or https://"));
        }
        if parsed.host_str().is_none() {
            return Err(anyhow!("server_url must include a host: {raw}"));
        }
        Ok(Self {
            server_url: raw.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.server_url, path.trim_start_matches('/'))
    }

    pub fn ws_url(&self) -> String {
        let ws_base = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.server_url.clone()
        };
        format!("{ws_base}/ws")
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
