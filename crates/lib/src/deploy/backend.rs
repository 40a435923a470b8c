//! Deployment backend abstraction.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{DeploymentRequest, DeploymentResult, ErrorDetail, ProvisioningState};

/// Errors raised by a deployment backend.
#[derive(Debug, Error)]
pub enum BackendError {
  /// The request cannot be expressed to the backend.
  #[error("invalid deployment request: {0}")]
  InvalidRequest(String),

  /// The request never produced a response.
  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The backend rejected the request.
  #[error("{url} returned HTTP {status}{}", .detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
  Status {
    url: String,
    status: u16,
    detail: Option<ErrorDetail>,
  },

  /// The backend answered with a body that could not be decoded.
  #[error("failed to decode response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  /// A result was requested before the operation finished.
  #[error("deployment '{name}' is still {state}")]
  NotTerminal { name: String, state: ProvisioningState },
}

impl BackendError {
  pub fn transport(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Transport {
      url: url.into(),
      source: Box::new(source),
    }
  }

  /// Whether repeating the call might succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Transport { .. } => true,
      Self::Status { status, .. } => matches!(status, 408 | 429) || *status >= 500,
      _ => false,
    }
  }
}

/// A backend that accepts create-or-update submissions.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
  /// Submit a deployment and return a handle to the long-running operation.
  async fn create_or_update(&self, request: &DeploymentRequest) -> Result<Box<dyn DeploymentOperation>, BackendError>;
}

/// Handle to a submitted deployment.
#[async_trait]
pub trait DeploymentOperation: Send {
  /// Deployment name the operation was submitted under.
  fn name(&self) -> &str;

  /// Block until the deployment reaches a terminal provisioning state.
  async fn wait_for_completion(&mut self) -> Result<ProvisioningState, BackendError>;

  /// The final result. Fails with [`BackendError::NotTerminal`] before completion.
  async fn result(&mut self) -> Result<DeploymentResult, BackendError>;
}
