//! One-shot tab configuration loading with a session-lifetime cache.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{TabDescriptor, TabIndex},
    protocol::RawTabRecord,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ConfigError;

#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_tabs(&self) -> Result<Vec<RawTabRecord>, ConfigError>;
}

/// Loads the tab list once per session.
///
/// A successful load is cached until the loader is dropped; the config is
/// not expected to change without a full reload. Failures are not cached, so
/// calling [`ConfigLoader::load`] again after an error re-fetches.
pub struct ConfigLoader {
    source: Arc<dyn ConfigSource>,
    cached: Mutex<Option<Arc<[TabDescriptor]>>>,
}

impl ConfigLoader {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub async fn load(&self) -> Result<Arc<[TabDescriptor]>, ConfigError> {
        // Held across the fetch so concurrent callers share one request.
        let mut cached = self.cached.lock().await;
        if let Some(tabs) = cached.as_ref() {
            return Ok(Arc::clone(tabs));
        }

        let records = self.source.fetch_tabs().await.map_err(|err| {
            warn!(error = %err, "tab configuration load failed");
            err
        })?;
        let tabs: Arc<[TabDescriptor]> = normalize_records(records).into();
        debug!(tab_count = tabs.len(), "tab configuration loaded");
        *cached = Some(Arc::clone(&tabs));
        Ok(tabs)
    }

    pub async fn cached(&self) -> Option<Arc<[TabDescriptor]>> {
        self.cached.lock().await.clone()
    }
}

/// Assigns each record its ordinal position as the tab index.
pub fn normalize_records(records: Vec<RawTabRecord>) -> Vec<TabDescriptor> {
    records
        .into_iter()
        .enumerate()
        .map(|(position, record)| record.into_descriptor(TabIndex(position)))
        .collect()
}

#[cfg(test)]
#[path = "tests/config_loader_tests.rs"]
mod tests;
