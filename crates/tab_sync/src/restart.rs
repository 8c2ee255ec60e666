//! Optimistic tab restarts with compensating rollback.
//!
//! A restart marks the tab `restarting` before the remote command is issued.
//! On success nothing else is written: the host reports the settled status
//! through a `tab_status` push event. On failure the status captured before
//! the restart is written back and one notification is raised.
//!
//! Known limitation: a push event for the same tab that lands while the
//! command is in flight is overwritten by the rollback under
//! [`RollbackPolicy::Unconditional`]. The next push event corrects it.
//! [`RollbackPolicy::OnlyIfRestarting`] skips the rollback in that case.

use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{TabIndex, TabStatus};
use tracing::{debug, error, warn};

use crate::{
    error::RestartError,
    notifications::{Notification, NotificationSink},
    status_store::{StatusAccessor, StatusSource},
};

pub const RESTART_FAILED_CAPTION: &str = "Restart failed";

#[async_trait]
pub trait RestartCommand: Send + Sync {
    async fn restart(&self, index: TabIndex) -> Result<(), RestartError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Always restore the pre-restart status on failure.
    #[default]
    Unconditional,
    /// Restore only while the tab still reads `restarting`.
    OnlyIfRestarting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The host accepted the command; the settled status arrives by push.
    Issued,
    RolledBack { restored: TabStatus },
    /// The command failed but a newer status was already in place.
    RollbackSkipped { current: TabStatus },
    UnknownTab,
}

/// State captured for exactly one in-flight restart.
struct RestartOperationContext {
    index: TabIndex,
    previous: TabStatus,
}

pub struct RestartOrchestrator {
    statuses: Arc<dyn StatusAccessor>,
    command: Arc<dyn RestartCommand>,
    notifications: Arc<dyn NotificationSink>,
    rollback_policy: RollbackPolicy,
}

impl RestartOrchestrator {
    pub fn new(
        statuses: Arc<dyn StatusAccessor>,
        command: Arc<dyn RestartCommand>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            statuses,
            command,
            notifications,
            rollback_policy: RollbackPolicy::default(),
        }
    }

    pub fn with_rollback_policy(mut self, rollback_policy: RollbackPolicy) -> Self {
        self.rollback_policy = rollback_policy;
        self
    }

    pub async fn restart(&self, index: TabIndex) -> RestartOutcome {
        let Some(context) = self.begin(index) else {
            warn!(tab_index = index.0, "restart requested for unknown tab");
            return RestartOutcome::UnknownTab;
        };

        match self.command.restart(index).await {
            Ok(()) => {
                debug!(tab_index = index.0, "restart command accepted");
                RestartOutcome::Issued
            }
            Err(err) => self.roll_back(context, err),
        }
    }

    fn begin(&self, index: TabIndex) -> Option<RestartOperationContext> {
        let previous = self.statuses.status(index)?;
        self.statuses
            .set_status(index, TabStatus::Restarting, StatusSource::RestartIssued);
        Some(RestartOperationContext { index, previous })
    }

    fn roll_back(&self, context: RestartOperationContext, err: RestartError) -> RestartOutcome {
        let RestartOperationContext { index, previous } = context;
        let outcome = match self.rollback_policy {
            RollbackPolicy::Unconditional => self.restore(index, previous),
            RollbackPolicy::OnlyIfRestarting => match self.statuses.status(index) {
                Some(TabStatus::Restarting) => self.restore(index, previous),
                Some(current) => {
                    warn!(
                        tab_index = index.0,
                        %current,
                        "restart failed after a newer status arrived; keeping it"
                    );
                    RestartOutcome::RollbackSkipped { current }
                }
                None => RestartOutcome::UnknownTab,
            },
        };

        error!(tab_index = index.0, error = %err, "restart failed");
        self.notifications
            .notify(Notification::failure(RESTART_FAILED_CAPTION, &err));
        outcome
    }

    fn restore(&self, index: TabIndex, previous: TabStatus) -> RestartOutcome {
        if self
            .statuses
            .set_status(index, previous, StatusSource::RestartRolledBack)
        {
            warn!(tab_index = index.0, restored = %previous, "restart rolled back");
            RestartOutcome::RolledBack { restored: previous }
        } else {
            RestartOutcome::UnknownTab
        }
    }
}

#[cfg(test)]
#[path = "tests/restart_tests.rs"]
mod tests;
