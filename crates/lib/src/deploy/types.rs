//! Deployment request and result types.
//!
//! Field names follow the Resource Manager wire format (camelCase). Results
//! are decoded leniently: every field is optional on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::template::RecipeTemplate;

/// Subscription and resource group a deployment is submitted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentScope {
  pub subscription_id: String,
  pub resource_group: String,
}

impl DeploymentScope {
  pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
    Self {
      subscription_id: subscription_id.into(),
      resource_group: resource_group.into(),
    }
  }
}

impl fmt::Display for DeploymentScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "/subscriptions/{}/resourceGroups/{}",
      self.subscription_id, self.resource_group
    )
  }
}

/// How the backend reconciles the template with existing resources.
///
/// Only incremental mode is submitted: resources named by the template are
/// added or updated and others are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
  #[default]
  Incremental,
}

/// Provisioning state reported by the backend.
///
/// Values are matched case-insensitively. Unknown values are kept verbatim
/// and are never terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProvisioningState {
  #[default]
  NotSpecified,
  Accepted,
  Running,
  Ready,
  Creating,
  Updating,
  Deleting,
  Succeeded,
  Failed,
  Canceled,
  Other(String),
}

impl ProvisioningState {
  /// `Succeeded`, `Failed` and `Canceled` end a deployment.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::NotSpecified => "NotSpecified",
      Self::Accepted => "Accepted",
      Self::Running => "Running",
      Self::Ready => "Ready",
      Self::Creating => "Creating",
      Self::Updating => "Updating",
      Self::Deleting => "Deleting",
      Self::Succeeded => "Succeeded",
      Self::Failed => "Failed",
      Self::Canceled => "Canceled",
      Self::Other(s) => s,
    }
  }
}

impl From<&str> for ProvisioningState {
  fn from(value: &str) -> Self {
    match value.to_ascii_lowercase().as_str() {
      "notspecified" => Self::NotSpecified,
      "accepted" => Self::Accepted,
      "running" => Self::Running,
      "ready" => Self::Ready,
      "creating" => Self::Creating,
      "updating" => Self::Updating,
      "deleting" => Self::Deleting,
      "succeeded" => Self::Succeeded,
      "failed" => Self::Failed,
      "canceled" | "cancelled" => Self::Canceled,
      _ => Self::Other(value.to_string()),
    }
  }
}

impl From<String> for ProvisioningState {
  fn from(value: String) -> Self {
    Self::from(value.as_str())
  }
}

impl From<ProvisioningState> for String {
  fn from(value: ProvisioningState) -> Self {
    value.as_str().to_string()
  }
}

impl fmt::Display for ProvisioningState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A resource produced by a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
  #[serde(default)]
  pub id: String,
}

/// Structured error reported by the backend for a failed deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
  pub code: String,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub details: Vec<ErrorDetail>,
}

impl fmt::Display for ErrorDetail {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.code.is_empty(), self.message.is_empty()) {
      (false, false) => write!(f, "{}: {}", self.code, self.message)?,
      (false, true) => f.write_str(&self.code)?,
      (true, false) => f.write_str(&self.message)?,
      (true, true) => f.write_str("no error detail")?,
    }
    if let Some(target) = &self.target {
      write!(f, " (target: {target})")?;
    }
    for detail in &self.details {
      write!(f, "; {detail}")?;
    }
    Ok(())
  }
}

impl std::error::Error for ErrorDetail {}

/// Final state of a deployment as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentResult {
  pub provisioning_state: ProvisioningState,
  pub output_resources: Vec<ResourceReference>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<ErrorDetail>,
}

/// A create-or-update submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRequest {
  pub name: String,
  pub scope: DeploymentScope,
  pub template: RecipeTemplate,
  pub mode: DeploymentMode,
}

impl DeploymentRequest {
  /// Request body: `{"properties": {"template": ..., "mode": ...}}`.
  pub fn body(&self) -> Value {
    json!({
      "properties": {
        "template": self.template,
        "mode": self.mode,
      }
    })
  }
}
