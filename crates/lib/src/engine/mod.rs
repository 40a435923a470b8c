//! The recipe deployment engine.
//!
//! A call runs one linear pipeline:
//!
//! ```text
//! parse reference -> resolve manifest -> fetch template blob -> decode template
//!   -> submit deployment -> wait for terminal state -> extract outputs
//! ```
//!
//! The first failing step ends the call with a [`RecipeError`] naming the
//! step. Nothing is retried here and no partial output is returned. The engine
//! keeps no state between calls; concurrent calls share only the collaborators'
//! connection pools.

mod types;

pub use types::{RecipeError, Stage};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Credentials, EngineConfig};
use crate::deploy::{ArmDeploymentBackend, BackendError, DeploymentDriver, DeploymentScope, extract_outputs};
use crate::reference::parse_reference;
use crate::registry::{ManifestError, RegistryClient, RegistryError, RemoteRegistry, fetch_blob, resolve_layer_digest};
use crate::template::{RecipeTemplate, decode_template};

/// Deploys recipes. Controllers depend on this rather than on [`RecipeEngine`]
/// so a fake can stand in.
#[async_trait]
pub trait RecipeHandler: Send + Sync {
  /// Fetch the recipe at `reference` and deploy it into the resource group.
  ///
  /// Returns the output resource IDs in the order the backend reported them.
  async fn deploy_recipe(
    &self,
    reference: &str,
    subscription_id: &str,
    resource_group: &str,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, RecipeError>;
}

/// Errors building an engine from configuration.
#[derive(Debug, Error)]
pub enum EngineSetupError {
  #[error("failed to create registry client: {0}")]
  Registry(#[from] RegistryError),

  #[error("failed to create deployment backend: {0}")]
  Backend(#[from] BackendError),
}

/// Registry-backed recipe engine.
#[derive(Clone)]
pub struct RecipeEngine {
  registry: Arc<dyn RegistryClient>,
  driver: DeploymentDriver,
}

impl RecipeEngine {
  pub fn new(registry: Arc<dyn RegistryClient>, driver: DeploymentDriver) -> Self {
    Self { registry, driver }
  }

  /// Build an engine on [`RemoteRegistry`] and [`ArmDeploymentBackend`].
  pub fn from_config(config: &EngineConfig, credentials: &Credentials) -> Result<Self, EngineSetupError> {
    let registry = RemoteRegistry::new(&config.registry, credentials.registry_token.clone())?;
    let backend = ArmDeploymentBackend::new(
      &config.deployment,
      &config.registry.user_agent,
      credentials.arm_token.clone(),
    )?;
    let driver = DeploymentDriver::new(Arc::new(backend), Arc::from(config.deployment.naming.generator()))
      .with_wait_timeout(config.deployment.timeout());

    Ok(Self::new(Arc::new(registry), driver))
  }

  /// Replace the deployment wait deadline. `None` waits until a terminal state.
  pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.driver = self.driver.with_wait_timeout(timeout);
    self
  }

  /// Resolve, download and decode the template at `reference` without deploying it.
  pub async fn fetch_recipe(&self, reference: &str, cancel: &CancellationToken) -> Result<RecipeTemplate, RecipeError> {
    let reference = parse_reference(reference)?;
    info!(repository = %reference.repository, tag = %reference.tag, "fetching recipe");

    let repo = self
      .registry
      .repository(&reference.repository)
      .map_err(RecipeError::registry(Stage::ResolveManifest))?;

    let digest = until_cancelled(
      cancel,
      Stage::ResolveManifest,
      resolve_layer_digest(repo.as_ref(), &reference.tag),
    )
    .await?
    .map_err(|err| match err {
      ManifestError::Registry(source) => RecipeError::Registry {
        stage: Stage::ResolveManifest,
        source,
      },
      ManifestError::Decode { digest, source } => RecipeError::ManifestDecode { digest, source },
    })?;
    info!(repository = %reference.repository, digest = %digest, "resolved recipe layer");

    let bytes = until_cancelled(cancel, Stage::FetchTemplate, fetch_blob(repo.as_ref(), &digest))
      .await?
      .map_err(RecipeError::registry(Stage::FetchTemplate))?;

    let template = decode_template(&bytes)?;
    info!(digest = %digest, size = bytes.len(), "decoded recipe template");
    Ok(template)
  }

  /// Fetch the recipe at `reference`, deploy it and return its output resource IDs.
  ///
  /// # Arguments
  ///
  /// * `reference` - `repository:tag` of the recipe artifact
  /// * `subscription_id` - Subscription to deploy into
  /// * `resource_group` - Resource group to deploy into
  /// * `cancel` - Cancels registry fetches, submission and the deployment
  ///   wait. A deployment request that was already sent is not withdrawn.
  pub async fn deploy_recipe(
    &self,
    reference: &str,
    subscription_id: &str,
    resource_group: &str,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, RecipeError> {
    let template = self.fetch_recipe(reference, cancel).await?;
    let scope = DeploymentScope::new(subscription_id, resource_group);

    let completed = self.driver.submit_and_wait(template, &scope, cancel).await?;
    let resources = extract_outputs(&completed.result, &completed.name).inspect_err(|err| {
      warn!(deployment = %completed.name, state = %err.state, "recipe deployment failed");
    })?;

    info!(deployment = %completed.name, resources = resources.len(), "recipe deployed");
    Ok(resources)
  }
}

#[async_trait]
impl RecipeHandler for RecipeEngine {
  async fn deploy_recipe(
    &self,
    reference: &str,
    subscription_id: &str,
    resource_group: &str,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, RecipeError> {
    RecipeEngine::deploy_recipe(self, reference, subscription_id, resource_group, cancel).await
  }
}

/// Run `future` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, stage: Stage, future: F) -> Result<F::Output, RecipeError> {
  tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      warn!(stage = %stage, "recipe cancelled");
      Err(RecipeError::Cancelled { stage, deployment: None })
    }
    output = future => Ok(output),
  }
}
