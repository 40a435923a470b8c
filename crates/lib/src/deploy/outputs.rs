//! Output extraction from a terminal deployment result.

use thiserror::Error;

use super::types::{DeploymentResult, ErrorDetail, ProvisioningState};

/// A deployment finished in a state other than `Succeeded`.
///
/// The backend's error detail, when it sent one, is the error source.
#[derive(Debug, Error)]
#[error("failed to deploy recipe - {name} (provisioning state {state})")]
pub struct DeploymentFailed {
  pub name: String,
  pub state: ProvisioningState,
  #[source]
  pub detail: Option<ErrorDetail>,
}

/// Return the output resource IDs of a succeeded deployment, in backend order.
pub fn extract_outputs(result: &DeploymentResult, name: &str) -> Result<Vec<String>, DeploymentFailed> {
  if result.provisioning_state != ProvisioningState::Succeeded {
    return Err(DeploymentFailed {
      name: name.to_string(),
      state: result.provisioning_state.clone(),
      detail: result.error.clone(),
    });
  }

  Ok(result.output_resources.iter().map(|r| r.id.clone()).collect())
}
