//! Submit a template and wait for the deployment to finish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::backend::{BackendError, DeploymentBackend};
use super::naming::NameGenerator;
use super::types::{DeploymentMode, DeploymentRequest, DeploymentResult, DeploymentScope};
use crate::template::RecipeTemplate;

/// Errors from [`DeploymentDriver::submit_and_wait`].
#[derive(Debug, Error)]
pub enum DriverError {
  #[error("failed to submit deployment '{name}': {source}")]
  Submit {
    name: String,
    #[source]
    source: BackendError,
  },

  #[error("failed while waiting for deployment '{name}': {source}")]
  Wait {
    name: String,
    #[source]
    source: BackendError,
  },

  #[error("failed to retrieve result of deployment '{name}': {source}")]
  Result {
    name: String,
    #[source]
    source: BackendError,
  },

  /// The caller cancelled. `submission` tells how far the request got; a
  /// deployment that may exist keeps running.
  #[error("deployment '{name}' was cancelled")]
  Cancelled { name: String, submission: Submission },

  #[error("deployment '{name}' did not finish within {timeout:?}")]
  Timeout { name: String, timeout: Duration },
}

/// How far a deployment request got before the caller cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
  /// The request was never sent.
  NotSent,
  /// The request was sent but no answer arrived. The backend may have accepted it.
  InFlight,
  /// The backend accepted the deployment.
  Accepted,
}

impl Submission {
  /// Whether a deployment may exist on the backend.
  pub fn may_exist(self) -> bool {
    !matches!(self, Self::NotSent)
  }
}

impl DriverError {
  /// Name of the deployment the error concerns.
  pub fn deployment_name(&self) -> &str {
    match self {
      Self::Submit { name, .. }
      | Self::Wait { name, .. }
      | Self::Result { name, .. }
      | Self::Cancelled { name, .. }
      | Self::Timeout { name, .. } => name,
    }
  }
}

/// A deployment that reached a terminal state.
#[derive(Debug, Clone)]
pub struct CompletedDeployment {
  pub name: String,
  pub result: DeploymentResult,
}

/// Drives one deployment from submission to terminal result.
#[derive(Clone)]
pub struct DeploymentDriver {
  backend: Arc<dyn DeploymentBackend>,
  names: Arc<dyn NameGenerator>,
  wait_timeout: Option<Duration>,
}

impl DeploymentDriver {
  pub fn new(backend: Arc<dyn DeploymentBackend>, names: Arc<dyn NameGenerator>) -> Self {
    Self {
      backend,
      names,
      wait_timeout: None,
    }
  }

  /// Bound the wait for a terminal state.
  pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.wait_timeout = timeout;
    self
  }

  /// Submit `template` in incremental mode under a fresh name and wait for it.
  ///
  /// # Arguments
  ///
  /// * `template` - Decoded template to deploy
  /// * `scope` - Subscription and resource group to deploy into
  /// * `cancel` - Observed during submission and the wait
  ///
  /// # Returns
  ///
  /// The deployment name and its terminal result. A terminal result is
  /// returned even when provisioning failed; judging it is up to the caller.
  pub async fn submit_and_wait(
    &self,
    template: RecipeTemplate,
    scope: &DeploymentScope,
    cancel: &CancellationToken,
  ) -> Result<CompletedDeployment, DriverError> {
    let name = self.names.next_name();
    let request = DeploymentRequest {
      name: name.clone(),
      scope: scope.clone(),
      template,
      mode: DeploymentMode::Incremental,
    };

    if cancel.is_cancelled() {
      warn!(deployment = %name, "cancelled before the deployment was sent");
      return Err(DriverError::Cancelled {
        name,
        submission: Submission::NotSent,
      });
    }

    let submitted = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        warn!(deployment = %name, "cancelled while the deployment request was in flight; it may still be created");
        return Err(DriverError::Cancelled {
          name,
          submission: Submission::InFlight,
        });
      }
      submitted = self.backend.create_or_update(&request) => submitted,
    };
    let mut operation = submitted.map_err(|source| DriverError::Submit {
      name: name.clone(),
      source,
    })?;
    info!(deployment = %name, "deployment submitted");

    let waited = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        warn!(deployment = %name, "cancelled while waiting; the deployment is left running");
        return Err(DriverError::Cancelled {
          name,
          submission: Submission::Accepted,
        });
      }
      waited = with_deadline(self.wait_timeout, operation.wait_for_completion()) => waited,
    };
    let state = match waited {
      Some(Ok(state)) => state,
      Some(Err(source)) => return Err(DriverError::Wait { name, source }),
      None => {
        let timeout = self.wait_timeout.unwrap_or_default();
        warn!(deployment = %name, timeout = ?timeout, "gave up waiting for deployment");
        return Err(DriverError::Timeout { name, timeout });
      }
    };
    info!(deployment = %name, state = %state, "deployment reached terminal state");

    let result = operation
      .result()
      .await
      .map_err(|source| DriverError::Result {
        name: name.clone(),
        source,
      })?;

    Ok(CompletedDeployment { name, result })
  }
}

/// Run `future`, giving up after `deadline` when one is set.
async fn with_deadline<F: Future>(deadline: Option<Duration>, future: F) -> Option<F::Output> {
  match deadline {
    Some(deadline) => tokio::time::timeout(deadline, future).await.ok(),
    None => Some(future.await),
  }
}
