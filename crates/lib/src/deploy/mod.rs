//! Template deployment.
//!
//! [`DeploymentDriver`] submits a template through a [`DeploymentBackend`],
//! waits for a terminal provisioning state and hands the result to
//! [`extract_outputs`].

pub mod arm;
pub mod backend;
pub mod driver;
pub mod naming;
pub mod outputs;
pub mod types;

pub use arm::{ArmDeploymentBackend, ArmOperation};
pub use backend::{BackendError, DeploymentBackend, DeploymentOperation};
pub use driver::{CompletedDeployment, DeploymentDriver, DriverError, Submission};
pub use naming::{NameGenerator, TimestampNames, UuidNames};
pub use outputs::{DeploymentFailed, extract_outputs};
pub use types::{
  DeploymentMode, DeploymentRequest, DeploymentResult, DeploymentScope, ErrorDetail, ProvisioningState,
  ResourceReference,
};
