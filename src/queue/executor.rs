//! Remote delivery of queued actions.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote rejected action ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

/// Applies one queued action payload on the server side.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, payload: &Value) -> Result<(), ExecutorError>;
}

/// Posts each action as JSON to the API layer.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExecutor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteExecutor for HttpExecutor {
    async fn execute(&self, payload: &Value) -> Result<(), ExecutorError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ExecutorError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Stand-in used when no executor endpoint is configured: every delivery
/// fails, so actions stay queued until one is.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredExecutor;

#[async_trait]
impl RemoteExecutor for UnconfiguredExecutor {
    async fn execute(&self, _payload: &Value) -> Result<(), ExecutorError> {
        Err(ExecutorError::Unavailable(
            "no executor endpoint configured".to_string(),
        ))
    }
}
