//! Engine stages and errors.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::deploy::{BackendError, DeploymentFailed, DriverError, Submission};
use crate::reference::ReferenceError;
use crate::registry::{Digest, ManifestDecodeError, RegistryError};
use crate::template::TemplateDecodeError;

/// A step of the recipe pipeline. Errors carry the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  ParseReference,
  ResolveManifest,
  FetchTemplate,
  DecodeTemplate,
  SubmitDeployment,
  WaitForDeployment,
  RetrieveResult,
  ExtractOutputs,
}

impl Stage {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::ParseReference => "parse template reference",
      Self::ResolveManifest => "fetch recipe manifest from registry",
      Self::FetchTemplate => "fetch recipe template from registry",
      Self::DecodeTemplate => "decode recipe template",
      Self::SubmitDeployment => "submit deployment",
      Self::WaitForDeployment => "wait for deployment",
      Self::RetrieveResult => "retrieve deployment result",
      Self::ExtractOutputs => "extract deployment outputs",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors from the recipe engine.
#[derive(Debug, Error)]
pub enum RecipeError {
  /// The reference is malformed. No network call was made.
  #[error("invalid template reference: {0}")]
  InvalidReference(#[from] ReferenceError),

  /// Transport, protocol or integrity failure talking to the registry.
  #[error("failed to {stage}: {source}")]
  Registry {
    stage: Stage,
    #[source]
    source: RegistryError,
  },

  /// The manifest was fetched but has no usable first layer.
  #[error("failed to fetch recipe manifest from registry: manifest {digest} is malformed: {source}")]
  ManifestDecode {
    digest: Digest,
    #[source]
    source: ManifestDecodeError,
  },

  /// The template blob is not a JSON object.
  #[error("failed to decode recipe template: {0}")]
  TemplateDecode(#[from] TemplateDecodeError),

  /// The backend rejected the submission or failed while being polled.
  #[error("failed to {stage} '{name}': {source}")]
  Deployment {
    stage: Stage,
    name: String,
    #[source]
    source: BackendError,
  },

  /// The deployment finished in a non-success state.
  #[error(transparent)]
  DeploymentFailed(#[from] DeploymentFailed),

  /// The caller cancelled. A deployment that was sent to the backend is named
  /// and keeps running if the backend created it.
  #[error(
    "cancelled while trying to {stage}{}",
    .deployment.as_deref().map(|d| format!(" (deployment '{d}' was sent to the backend and is not rolled back)")).unwrap_or_default()
  )]
  Cancelled { stage: Stage, deployment: Option<String> },

  /// The configured deadline passed before the deployment finished.
  #[error("timed out after {timeout:?} while trying to {stage} '{deployment}'")]
  Timeout {
    stage: Stage,
    timeout: Duration,
    deployment: String,
  },
}

impl RecipeError {
  /// The stage that failed.
  pub fn stage(&self) -> Stage {
    match self {
      Self::InvalidReference(_) => Stage::ParseReference,
      Self::ManifestDecode { .. } => Stage::ResolveManifest,
      Self::TemplateDecode(_) => Stage::DecodeTemplate,
      Self::DeploymentFailed(_) => Stage::ExtractOutputs,
      Self::Registry { stage, .. }
      | Self::Deployment { stage, .. }
      | Self::Cancelled { stage, .. }
      | Self::Timeout { stage, .. } => *stage,
    }
  }

  /// Name of the deployment involved, once one was generated.
  pub fn deployment_name(&self) -> Option<&str> {
    match self {
      Self::Deployment { name, .. } => Some(name),
      Self::DeploymentFailed(failed) => Some(&failed.name),
      Self::Cancelled { deployment, .. } => deployment.as_deref(),
      Self::Timeout { deployment, .. } => Some(deployment),
      _ => None,
    }
  }

  /// Whether running the same call again could succeed.
  ///
  /// Malformed input or content, failed deployments and cancellation are
  /// final. Transport faults, throttling and timeouts are not.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Registry { source, .. } => source.is_retryable(),
      Self::Deployment { source, .. } => source.is_retryable(),
      Self::Timeout { .. } => true,
      Self::InvalidReference(_)
      | Self::ManifestDecode { .. }
      | Self::TemplateDecode(_)
      | Self::DeploymentFailed(_)
      | Self::Cancelled { .. } => false,
    }
  }

  pub(crate) fn registry(stage: Stage) -> impl FnOnce(RegistryError) -> Self {
    move |source| Self::Registry { stage, source }
  }
}

impl From<DriverError> for RecipeError {
  fn from(err: DriverError) -> Self {
    match err {
      DriverError::Submit { name, source } => Self::Deployment {
        stage: Stage::SubmitDeployment,
        name,
        source,
      },
      DriverError::Wait { name, source } => Self::Deployment {
        stage: Stage::WaitForDeployment,
        name,
        source,
      },
      DriverError::Result { name, source } => Self::Deployment {
        stage: Stage::RetrieveResult,
        name,
        source,
      },
      DriverError::Cancelled { name, submission } => Self::Cancelled {
        stage: match submission {
          Submission::Accepted => Stage::WaitForDeployment,
          Submission::NotSent | Submission::InFlight => Stage::SubmitDeployment,
        },
        deployment: submission.may_exist().then_some(name),
      },
      DriverError::Timeout { name, timeout } => Self::Timeout {
        stage: Stage::WaitForDeployment,
        timeout,
        deployment: name,
      },
    }
  }
}
