//! Maps config-load state and tab statuses onto render modes.

use std::sync::Arc;

use shared::domain::{TabDescriptor, TabIndex, TabStatus};

use crate::{error::ConfigError, status_store::StatusSnapshot};

/// Result of the config load as seen by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoadState {
    Loading,
    Failed(ConfigError),
    Loaded(Arc<[TabDescriptor]>),
}

/// User actions a render mode can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    RetryConfigLoad,
    Restart(TabIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartControl {
    pub action: UiAction,
    /// `false` while the tab is already restarting.
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabView {
    pub descriptor: TabDescriptor,
    pub status: TabStatus,
    pub restart: Option<RestartControl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    Loading,
    Error {
        message: String,
        requires_reauth: bool,
        retry: UiAction,
    },
    Empty,
    Populated(Vec<TabView>),
}

impl RenderMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Error { .. } => "error",
            Self::Empty => "empty",
            Self::Populated(_) => "populated",
        }
    }
}

/// Selects exactly one render mode. Only `state` decides the mode;
/// `statuses` only fills in the populated view.
pub fn present(state: &ConfigLoadState, statuses: &StatusSnapshot) -> RenderMode {
    match state {
        ConfigLoadState::Loading => RenderMode::Loading,
        ConfigLoadState::Failed(err) => RenderMode::Error {
            message: err.message().to_string(),
            requires_reauth: err.requires_reauth(),
            retry: UiAction::RetryConfigLoad,
        },
        ConfigLoadState::Loaded(tabs) if tabs.is_empty() => RenderMode::Empty,
        ConfigLoadState::Loaded(tabs) => RenderMode::Populated(
            tabs.iter()
                .map(|descriptor| tab_view(descriptor, statuses))
                .collect(),
        ),
    }
}

fn tab_view(descriptor: &TabDescriptor, statuses: &StatusSnapshot) -> TabView {
    let status = statuses
        .get(&descriptor.index)
        .copied()
        .unwrap_or_default();
    let restart = descriptor.is_restartable.then_some(RestartControl {
        action: UiAction::Restart(descriptor.index),
        enabled: status != TabStatus::Restarting,
    });
    TabView {
        descriptor: descriptor.clone(),
        status,
        restart,
    }
}

#[cfg(test)]
#[path = "tests/presentation_tests.rs"]
mod tests;
