//! Crate-wide constants.

/// Prefix of every generated deployment name.
pub const DEPLOYMENT_NAME_PREFIX: &str = "recipe";

/// User agent sent with registry and deployment requests.
pub const USER_AGENT: &str = concat!("recipekit/", env!("CARGO_PKG_VERSION"));

/// Default Azure Resource Manager endpoint.
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Resource Manager API version used for deployments.
pub const DEFAULT_ARM_API_VERSION: &str = "2021-04-01";

/// Delay between deployment status polls when the backend gives no `Retry-After`.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Per-request timeout for registry and Resource Manager calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Manifests larger than this are refused before being read into memory.
pub const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

/// Longest tag an OCI registry accepts.
pub const MAX_TAG_LEN: usize = 128;

pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_ARTIFACT_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.artifact.manifest.v1+json";
pub const DOCKER_MANIFEST_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Media types sent in the `Accept` header when resolving a tag.
pub const MANIFEST_MEDIA_TYPES: &[&str] = &[
  OCI_MANIFEST_MEDIA_TYPE,
  OCI_ARTIFACT_MANIFEST_MEDIA_TYPE,
  DOCKER_MANIFEST_MEDIA_TYPE,
];

/// Environment variable holding a bearer token for the registry.
pub const ENV_REGISTRY_TOKEN: &str = "RECIPEKIT_REGISTRY_TOKEN";

/// Environment variable holding a bearer token for Resource Manager.
pub const ENV_ARM_TOKEN: &str = "RECIPEKIT_ARM_TOKEN";

/// Environment variable pointing at the configuration file.
pub const ENV_CONFIG_PATH: &str = "RECIPEKIT_CONFIG";
