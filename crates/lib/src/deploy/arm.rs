//! Azure Resource Manager deployment backend.
//!
//! A deployment is submitted with
//! `PUT {endpoint}/subscriptions/{sub}/resourcegroups/{rg}/providers/Microsoft.Resources/deployments/{name}`
//! and then polled with `GET` on the same URL until its provisioning state is
//! terminal. `Retry-After` on a response overrides the configured poll interval
//! for the next poll.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::backend::{BackendError, DeploymentBackend, DeploymentOperation};
use super::types::{DeploymentRequest, DeploymentResult, ErrorDetail, ProvisioningState};
use crate::config::DeploymentConfig;

/// Deployment backend talking to the Resource Manager REST API.
#[derive(Clone)]
pub struct ArmDeploymentBackend {
  client: Client,
  endpoint: Url,
  api_version: String,
  poll_interval: Duration,
  token: Option<Arc<str>>,
}

/// `{"properties": {...}}` wrapper around a deployment's state.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeploymentEnvelope {
  properties: DeploymentResult,
}

/// `{"error": {...}}` body of a rejected request.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  error: ErrorDetail,
}

impl ArmDeploymentBackend {
  /// Build a backend from configuration.
  ///
  /// # Arguments
  ///
  /// * `config` - Endpoint, API version and poll interval
  /// * `user_agent` - Sent with every request
  /// * `token` - Bearer token, if the endpoint requires one
  pub fn new(config: &DeploymentConfig, user_agent: &str, token: Option<String>) -> Result<Self, BackendError> {
    let endpoint = Url::parse(&config.endpoint)
      .map_err(|e| BackendError::InvalidRequest(format!("invalid endpoint '{}': {e}", config.endpoint)))?;
    if endpoint.cannot_be_a_base() {
      return Err(BackendError::InvalidRequest(format!(
        "endpoint '{}' cannot carry a path",
        config.endpoint
      )));
    }

    let client = Client::builder()
      .user_agent(user_agent)
      .timeout(config.request_timeout())
      .build()
      .map_err(|e| BackendError::transport(endpoint.as_str(), e))?;

    Ok(Self {
      client,
      endpoint,
      api_version: config.api_version.clone(),
      poll_interval: config.poll_interval(),
      token: token.map(Arc::from),
    })
  }

  /// Override the delay between status polls.
  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  fn deployment_url(&self, request: &DeploymentRequest) -> Result<Url, BackendError> {
    let scope = &request.scope;
    for (field, value) in [
      ("subscription", scope.subscription_id.as_str()),
      ("resource group", scope.resource_group.as_str()),
      ("deployment name", request.name.as_str()),
    ] {
      if value.trim().is_empty() {
        return Err(BackendError::InvalidRequest(format!("{field} cannot be empty")));
      }
    }

    let mut url = self.endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| BackendError::InvalidRequest(format!("endpoint '{}' cannot carry a path", self.endpoint)))?
      .pop_if_empty()
      .extend([
        "subscriptions",
        scope.subscription_id.as_str(),
        "resourcegroups",
        scope.resource_group.as_str(),
        "providers",
        "Microsoft.Resources",
        "deployments",
        request.name.as_str(),
      ]);
    url.query_pairs_mut().clear().append_pair("api-version", &self.api_version);
    Ok(url)
  }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
  match token {
    Some(token) => request.bearer_auth(token),
    None => request,
  }
}

/// Decode a deployment response, turning error statuses into [`BackendError::Status`].
async fn read_deployment(response: Response, url: &Url) -> Result<(DeploymentResult, Option<Duration>), BackendError> {
  let status = response.status();
  let retry_after = response
    .headers()
    .get(RETRY_AFTER)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.trim().parse::<u64>().ok())
    .map(Duration::from_secs);
  let body = response
    .text()
    .await
    .map_err(|e| BackendError::transport(url.as_str(), e))?;

  if !status.is_success() {
    let detail = serde_json::from_str::<ErrorEnvelope>(&body).ok().map(|e| e.error);
    warn!(url = %url, status = status.as_u16(), "deployment request rejected");
    return Err(BackendError::Status {
      url: url.to_string(),
      status: status.as_u16(),
      detail,
    });
  }

  let envelope: DeploymentEnvelope = if body.trim().is_empty() {
    DeploymentEnvelope::default()
  } else {
    serde_json::from_str(&body).map_err(|source| BackendError::Decode {
      url: url.to_string(),
      source,
    })?
  };
  Ok((envelope.properties, retry_after))
}

#[async_trait]
impl DeploymentBackend for ArmDeploymentBackend {
  async fn create_or_update(&self, request: &DeploymentRequest) -> Result<Box<dyn DeploymentOperation>, BackendError> {
    let url = self.deployment_url(request)?;
    info!(deployment = %request.name, scope = %request.scope, "submitting deployment");

    let response = authorize(self.client.put(url.clone()), self.token.as_deref())
      .json(&request.body())
      .send()
      .await
      .map_err(|e| BackendError::transport(url.as_str(), e))?;
    let (latest, retry_after) = read_deployment(response, &url).await?;
    debug!(deployment = %request.name, state = %latest.provisioning_state, "deployment accepted");

    Ok(Box::new(ArmOperation {
      client: self.client.clone(),
      token: self.token.clone(),
      url,
      name: request.name.clone(),
      poll_interval: self.poll_interval,
      latest,
      retry_after,
    }))
  }
}

/// A submitted Resource Manager deployment.
pub struct ArmOperation {
  client: Client,
  token: Option<Arc<str>>,
  url: Url,
  name: String,
  poll_interval: Duration,
  latest: DeploymentResult,
  retry_after: Option<Duration>,
}

impl ArmOperation {
  async fn poll(&mut self) -> Result<(), BackendError> {
    let response = authorize(self.client.get(self.url.clone()), self.token.as_deref())
      .send()
      .await
      .map_err(|e| BackendError::transport(self.url.as_str(), e))?;
    let (latest, retry_after) = read_deployment(response, &self.url).await?;
    self.latest = latest;
    self.retry_after = retry_after;
    Ok(())
  }
}

#[async_trait]
impl DeploymentOperation for ArmOperation {
  fn name(&self) -> &str {
    &self.name
  }

  async fn wait_for_completion(&mut self) -> Result<ProvisioningState, BackendError> {
    loop {
      let state = self.latest.provisioning_state.clone();
      if state.is_terminal() {
        info!(deployment = %self.name, state = %state, "deployment finished");
        return Ok(state);
      }

      let delay = self.retry_after.take().unwrap_or(self.poll_interval);
      debug!(deployment = %self.name, state = %state, delay = ?delay, "deployment in progress");
      tokio::time::sleep(delay).await;
      self.poll().await?;
    }
  }

  async fn result(&mut self) -> Result<DeploymentResult, BackendError> {
    if !self.latest.provisioning_state.is_terminal() {
      return Err(BackendError::NotTerminal {
        name: self.name.clone(),
        state: self.latest.provisioning_state.clone(),
      });
    }
    Ok(self.latest.clone())
  }
}
