//! HTTP transport for the config fetch and restart command endpoints.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::TabIndex,
    error::{ApiError, ErrorCode},
    protocol::RawTabRecord,
};
use tracing::debug;

use crate::{
    config_loader::ConfigSource, error::ConfigError, restart::RestartCommand, RestartError,
    TabSyncConfig,
};

/// Failure of one HTTP exchange, classified before it is mapped onto the
/// caller's error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportFailure {
    Unauthorized(String),
    Rejected(String),
    Unreachable(String),
    Decode(String),
}

pub struct HttpTabApi {
    http: Client,
    config: TabSyncConfig,
}

impl HttpTabApi {
    pub fn new(config: TabSyncConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &TabSyncConfig {
        &self.config
    }

    pub(crate) async fn get_tabs(&self) -> Result<Vec<RawTabRecord>, TransportFailure> {
        let url = self.config.api_url("tabs");
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| TransportFailure::Unreachable(err.to_string()))?;
        let res = ensure_success(res).await?;
        res.json::<Vec<RawTabRecord>>()
            .await
            .map_err(|err| TransportFailure::Decode(err.to_string()))
    }

    pub(crate) async fn post_restart(&self, index: TabIndex) -> Result<(), TransportFailure> {
        let url = self.config.api_url(&format!("tabs/{}/restart", index.0));
        let res = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|err| TransportFailure::Unreachable(err.to_string()))?;
        ensure_success(res).await?;
        Ok(())
    }
}

async fn ensure_success(res: Response) -> Result<Response, TransportFailure> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %body, "tab host returned error response");
    Err(classify_failure(status, &body))
}

pub(crate) fn classify_failure(status: StatusCode, body: &str) -> TransportFailure {
    let api_error = serde_json::from_str::<ApiError>(body).ok();
    let message = match &api_error {
        Some(api_error) => api_error.message.clone(),
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .map(|reason| format!("{} {reason}", status.as_u16()))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    };

    let unauthorized = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || matches!(
            api_error.as_ref().map(|e| e.code),
            Some(ErrorCode::Unauthorized | ErrorCode::Forbidden)
        );
    if unauthorized {
        TransportFailure::Unauthorized(message)
    } else {
        TransportFailure::Rejected(message)
    }
}

impl From<TransportFailure> for ConfigError {
    fn from(value: TransportFailure) -> Self {
        match value {
            TransportFailure::Unauthorized(message) => Self::Unauthorized(message),
            TransportFailure::Rejected(message) | TransportFailure::Unreachable(message) => {
                Self::Transport(message)
            }
            TransportFailure::Decode(message) => Self::InvalidResponse(message),
        }
    }
}

impl TransportFailure {
    fn into_restart_error(self, index: TabIndex) -> RestartError {
        match self {
            Self::Unauthorized(message) => RestartError::Unauthorized { index, message },
            Self::Rejected(message) => RestartError::Rejected { index, message },
            Self::Unreachable(message) | Self::Decode(message) => {
                RestartError::Transport { index, message }
            }
        }
    }
}

#[async_trait]
impl ConfigSource for HttpTabApi {
    async fn fetch_tabs(&self) -> Result<Vec<RawTabRecord>, ConfigError> {
        self.get_tabs().await.map_err(ConfigError::from)
    }
}

#[async_trait]
impl RestartCommand for HttpTabApi {
    async fn restart(&self, index: TabIndex) -> Result<(), RestartError> {
        self.post_restart(index)
            .await
            .map_err(|failure| failure.into_restart_error(index))
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
