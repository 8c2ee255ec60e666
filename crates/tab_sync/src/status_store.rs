//! Authoritative per-tab status map.

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use shared::domain::{TabDescriptor, TabIndex, TabStatus};
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub type StatusSnapshot = BTreeMap<TabIndex, TabStatus>;

const CHANGE_FEED_CAPACITY: usize = 256;

/// Which writer produced a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    PushEvent,
    RestartIssued,
    RestartRolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub index: TabIndex,
    pub previous: TabStatus,
    pub current: TabStatus,
    pub source: StatusSource,
}

/// Read/write access to per-tab status, as used by the status writers.
pub trait StatusAccessor: Send + Sync {
    fn status(&self, index: TabIndex) -> Option<TabStatus>;
    /// Returns `false` when `index` has no entry; nothing is written then.
    fn set_status(&self, index: TabIndex, status: TabStatus, source: StatusSource) -> bool;
}

/// Holds exactly one status per configured tab.
///
/// Locks are only taken for the duration of a single read or write, never
/// across an await point.
pub struct StatusStore {
    statuses: RwLock<StatusSnapshot>,
    changes: broadcast::Sender<StatusChange>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            statuses: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    /// Replaces every entry with `running` for each tab in `tabs`.
    pub fn seed(&self, tabs: &[TabDescriptor]) {
        let seeded: StatusSnapshot = tabs
            .iter()
            .map(|tab| (tab.index, TabStatus::Running))
            .collect();
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        *statuses = seeded;
        debug!(tab_count = statuses.len(), "status store seeded");
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feed of every status change that altered a value.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StatusChange> {
        self.changes.subscribe()
    }
}

impl StatusAccessor for StatusStore {
    fn status(&self, index: TabIndex) -> Option<TabStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
            .copied()
    }

    fn set_status(&self, index: TabIndex, status: TabStatus, source: StatusSource) -> bool {
        let previous = {
            let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
            let Some(entry) = statuses.get_mut(&index) else {
                trace!(tab_index = index.0, ?source, "ignoring status for unknown tab");
                return false;
            };
            std::mem::replace(entry, status)
        };

        if previous != status {
            debug!(
                tab_index = index.0,
                %previous,
                current = %status,
                ?source,
                "tab status changed"
            );
            let _ = self.changes.send(StatusChange {
                index,
                previous,
                current: status,
                source,
            });
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/status_store_tests.rs"]
mod tests;
