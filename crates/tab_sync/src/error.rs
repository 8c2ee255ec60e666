//! Error types for config loading and restart commands.

use shared::domain::TabIndex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("not authorized to load tab configuration: {0}")]
    Unauthorized(String),
    #[error("failed to load tab configuration: {0}")]
    Transport(String),
    #[error("invalid tab configuration response: {0}")]
    InvalidResponse(String),
}

impl ConfigError {
    /// Human-readable detail extracted from the transport failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized(message)
            | Self::Transport(message)
            | Self::InvalidResponse(message) => message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestartError {
    #[error("not authorized to restart tab {index}: {message}")]
    Unauthorized { index: TabIndex, message: String },
    #[error("tab host rejected restart of tab {index}: {message}")]
    Rejected { index: TabIndex, message: String },
    #[error("restart request for tab {index} failed: {message}")]
    Transport { index: TabIndex, message: String },
}

impl RestartError {
    pub fn index(&self) -> TabIndex {
        match self {
            Self::Unauthorized { index, .. }
            | Self::Rejected { index, .. }
            | Self::Transport { index, .. } => *index,
        }
    }
}
