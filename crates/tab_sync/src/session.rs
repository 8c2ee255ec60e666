//! Root context of the tab-management subsystem.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::{
    config_loader::{ConfigLoader, ConfigSource},
    notifications::NotificationSink,
    presentation::{present, ConfigLoadState, RenderMode, UiAction},
    push_channel::PushChannel,
    restart::{RestartCommand, RestartOrchestrator, RestartOutcome, RollbackPolicy},
    status_events::{StatusEventSubscriber, StatusSubscription},
    status_store::{StatusAccessor, StatusSource, StatusStore},
    transport::HttpTabApi,
    TabSyncConfig,
};

/// Capabilities a session is built from.
pub struct SessionDeps {
    pub config_source: Arc<dyn ConfigSource>,
    pub restart_command: Arc<dyn RestartCommand>,
    pub push_channel: Arc<dyn PushChannel>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl SessionDeps {
    /// Uses one HTTP client for both the config fetch and restart commands.
    pub fn http(
        config: TabSyncConfig,
        push_channel: Arc<dyn PushChannel>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let api = Arc::new(HttpTabApi::new(config));
        Self {
            config_source: api.clone(),
            restart_command: api,
            push_channel,
            notifications,
        }
    }
}

/// Owns the loader, store, orchestrator and the status subscription for
/// one page lifetime.
pub struct TabSession {
    loader: ConfigLoader,
    store: Arc<StatusStore>,
    subscriber: StatusEventSubscriber,
    orchestrator: RestartOrchestrator,
    load_state: RwLock<ConfigLoadState>,
    subscription: Mutex<Option<StatusSubscription>>,
}

impl TabSession {
    pub fn new(deps: SessionDeps) -> Self {
        Self::with_rollback_policy(deps, RollbackPolicy::default())
    }

    pub fn with_rollback_policy(deps: SessionDeps, rollback_policy: RollbackPolicy) -> Self {
        let store = Arc::new(StatusStore::new());
        let orchestrator = RestartOrchestrator::new(
            store.clone(),
            deps.restart_command,
            deps.notifications,
        )
        .with_rollback_policy(rollback_policy);
        Self {
            loader: ConfigLoader::new(deps.config_source),
            store,
            subscriber: StatusEventSubscriber::new(deps.push_channel),
            orchestrator,
            load_state: RwLock::new(ConfigLoadState::Loading),
            subscription: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    pub fn load_state(&self) -> ConfigLoadState {
        self.load_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loads the config, seeds the store and starts listening for status
    /// events. Returns the resulting render mode.
    pub async fn start(&self) -> RenderMode {
        self.load_config().await;
        self.render()
    }

    pub fn render(&self) -> RenderMode {
        let state = self.load_state();
        present(&state, &self.store.snapshot())
    }

    /// Runs an action exposed by a render mode. Only restarts produce an
    /// outcome.
    pub async fn dispatch(&self, action: UiAction) -> Option<RestartOutcome> {
        match action {
            UiAction::RetryConfigLoad => {
                self.load_config().await;
                None
            }
            UiAction::Restart(index) => Some(self.orchestrator.restart(index).await),
        }
    }

    /// Stops status event delivery. Safe to call repeatedly.
    pub fn teardown(&self) {
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
            info!("tab session torn down");
        }
    }

    async fn load_config(&self) {
        if matches!(self.load_state(), ConfigLoadState::Loaded(_)) {
            return;
        }
        self.set_load_state(ConfigLoadState::Loading);
        match self.loader.load().await {
            Ok(tabs) => {
                self.store.seed(&tabs);
                self.ensure_subscribed();
                self.set_load_state(ConfigLoadState::Loaded(tabs));
            }
            Err(err) => self.set_load_state(ConfigLoadState::Failed(err)),
        }
    }

    fn set_load_state(&self, state: ConfigLoadState) {
        *self
            .load_state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn ensure_subscribed(&self) {
        let mut slot = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        let store = Arc::clone(&self.store);
        *slot = Some(self.subscriber.subscribe(move |index, status| {
            store.set_status(index, status, StatusSource::PushEvent);
        }));
        debug!("subscribed to tab status events");
    }
}

impl Drop for TabSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
