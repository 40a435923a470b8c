//! Engine configuration.
//!
//! Configuration is read from a TOML file whose every field is optional:
//!
//! ```toml
//! [registry]
//! endpoint = "http://localhost:5000"   # mirror or test registry
//! plain_http = false
//!
//! [deployment]
//! poll_interval_secs = 5
//! request_timeout_secs = 30
//! timeout_secs = 1800
//! naming = "uuid"
//! ```
//!
//! Bearer credentials are never read from the file. They come from the
//! environment via [`Credentials::from_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  DEFAULT_ARM_API_VERSION, DEFAULT_ARM_ENDPOINT, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
  ENV_ARM_TOKEN, ENV_CONFIG_PATH, ENV_REGISTRY_TOKEN, USER_AGENT,
};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The configuration file is not valid TOML for [`EngineConfig`].
  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  /// A value parsed but is unusable.
  #[error("invalid config value '{field}': {reason}")]
  Invalid { field: &'static str, reason: String },
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
  pub registry: RegistryConfig,
  pub deployment: DeploymentConfig,
}

/// Registry client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
  /// Base URL that replaces `https://<host>` for every repository.
  pub endpoint: Option<String>,
  /// Talk to `http://<host>` instead of `https://<host>`.
  pub plain_http: bool,
  pub user_agent: String,
  pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
  fn default() -> Self {
    Self {
      endpoint: None,
      plain_http: false,
      user_agent: USER_AGENT.to_string(),
      request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
    }
  }
}

impl RegistryConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

/// How deployment names are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
  /// `recipe` followed by the current Unix time in nanoseconds.
  #[default]
  Timestamp,
  /// `recipe` followed by a random UUID.
  Uuid,
}

/// Deployment backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
  pub endpoint: String,
  pub api_version: String,
  pub poll_interval_secs: u64,
  /// Bound on each submit or status request. Unrelated to `timeout_secs`.
  pub request_timeout_secs: u64,
  /// Overall deadline for waiting on a deployment. `None` waits until the
  /// backend reports a terminal state or the caller cancels.
  pub timeout_secs: Option<u64>,
  pub naming: NamingStrategy,
}

impl Default for DeploymentConfig {
  fn default() -> Self {
    Self {
      endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
      api_version: DEFAULT_ARM_API_VERSION.to_string(),
      poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
      request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
      timeout_secs: None,
      naming: NamingStrategy::default(),
    }
  }
}

impl DeploymentConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(Duration::from_secs)
  }
}

impl EngineConfig {
  /// Parse configuration from TOML text.
  pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Load configuration.
  ///
  /// Uses `path` when given, otherwise the file named by `RECIPEKIT_CONFIG`,
  /// otherwise defaults.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => match std::env::var_os(ENV_CONFIG_PATH) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => {
          debug!("no config file, using defaults");
          return Ok(Self::default());
        }
      },
    };

    debug!(path = ?path, "loading config");
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    Self::from_toml(&text, &path)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.deployment.poll_interval_secs == 0 {
      return Err(ConfigError::Invalid {
        field: "deployment.poll_interval_secs",
        reason: "must be at least 1".to_string(),
      });
    }
    if self.deployment.timeout_secs == Some(0) {
      return Err(ConfigError::Invalid {
        field: "deployment.timeout_secs",
        reason: "must be at least 1 when set".to_string(),
      });
    }
    if self.deployment.request_timeout_secs == 0 {
      return Err(ConfigError::Invalid {
        field: "deployment.request_timeout_secs",
        reason: "must be at least 1".to_string(),
      });
    }
    if self.registry.request_timeout_secs == 0 {
      return Err(ConfigError::Invalid {
        field: "registry.request_timeout_secs",
        reason: "must be at least 1".to_string(),
      });
    }
    if let Some(endpoint) = &self.registry.endpoint {
      url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
        field: "registry.endpoint",
        reason: e.to_string(),
      })?;
    }
    url::Url::parse(&self.deployment.endpoint).map_err(|e| ConfigError::Invalid {
      field: "deployment.endpoint",
      reason: e.to_string(),
    })?;
    Ok(())
  }
}

/// Static bearer tokens for the two remote services.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
  pub registry_token: Option<String>,
  pub arm_token: Option<String>,
}

impl Credentials {
  /// Read tokens from `RECIPEKIT_REGISTRY_TOKEN` and `RECIPEKIT_ARM_TOKEN`.
  /// Empty values count as unset.
  pub fn from_env() -> Self {
    let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    Self {
      registry_token: read(ENV_REGISTRY_TOKEN),
      arm_token: read(ENV_ARM_TOKEN),
    }
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
    f.debug_struct("Credentials")
      .field("registry_token", &redact(&self.registry_token))
      .field("arm_token", &redact(&self.arm_token))
      .finish()
  }
}
