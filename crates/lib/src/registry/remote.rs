//! OCI distribution API client.
//!
//! Implements [`RegistryClient`] over HTTP:
//!
//! - tags resolve with `GET /v2/<path>/manifests/<tag>`; the manifest body is
//!   hashed locally and checked against `Docker-Content-Digest` when present
//! - blobs resolve with `HEAD /v2/<path>/blobs/<digest>`
//! - content is streamed from `manifests/<digest>` or `blobs/<digest>`
//!   depending on the descriptor's media type

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, Response, StatusCode};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use url::Url;

use super::content::ContentStream;
use super::types::{Descriptor, Digest, RegistryError};
use super::{RegistryClient, Repository};
use crate::config::RegistryConfig;
use crate::consts::{MANIFEST_MEDIA_TYPES, MAX_MANIFEST_BYTES, OCI_MANIFEST_MEDIA_TYPE};
use crate::reference::RepositoryName;
use crate::util::hash::HashAlgorithm;

const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";
const OCTET_STREAM: &str = "application/octet-stream";

/// Registry client speaking the OCI distribution protocol.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct RemoteRegistry {
  client: Client,
  endpoint: Option<Url>,
  plain_http: bool,
  token: Option<Arc<str>>,
}

impl RemoteRegistry {
  /// Build a client from configuration and an optional bearer token.
  pub fn new(config: &RegistryConfig, token: Option<String>) -> Result<Self, RegistryError> {
    let endpoint = config
      .endpoint
      .as_deref()
      .map(|e| {
        Url::parse(e).map_err(|err| RegistryError::InvalidEndpoint {
          endpoint: e.to_string(),
          reason: err.to_string(),
        })
      })
      .transpose()?;

    let client = Client::builder()
      .user_agent(config.user_agent.clone())
      .timeout(config.request_timeout())
      .build()
      .map_err(|e| RegistryError::transport("<client>", e))?;

    Ok(Self {
      client,
      endpoint,
      plain_http: config.plain_http,
      token: token.map(Arc::from),
    })
  }

  /// Base URL for a registry host, without a trailing slash.
  fn base_url(&self, host: &str) -> String {
    match &self.endpoint {
      Some(endpoint) => endpoint.as_str().trim_end_matches('/').to_string(),
      None => {
        let scheme = if self.plain_http { "http" } else { "https" };
        format!("{scheme}://{host}")
      }
    }
  }
}

impl RegistryClient for RemoteRegistry {
  fn repository(&self, name: &str) -> Result<Arc<dyn Repository>, RegistryError> {
    let parsed = RepositoryName::parse(name).map_err(|e| RegistryError::InvalidRepository {
      name: name.to_string(),
      reason: e.to_string(),
    })?;

    let base = format!("{}/v2/{}", self.base_url(&parsed.host), parsed.path);
    debug!(repository = name, base = %base, "opened repository");

    Ok(Arc::new(RemoteRepository {
      client: self.client.clone(),
      token: self.token.clone(),
      name: name.to_string(),
      base,
    }))
  }
}

/// Handle to one repository on a remote registry.
pub struct RemoteRepository {
  client: Client,
  token: Option<Arc<str>>,
  name: String,
  base: String,
}

impl RemoteRepository {
  fn url(&self, kind: &str, reference: &str) -> String {
    format!("{}/{kind}/{reference}", self.base)
  }

  /// Send a request and map transport failures and error statuses.
  async fn send(&self, method: Method, url: &str, reference: &str, accept: Option<&str>) -> Result<Response, RegistryError> {
    let mut request = self.client.request(method.clone(), url);
    if let Some(accept) = accept {
      request = request.header(ACCEPT, accept);
    }
    if let Some(token) = &self.token {
      request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    debug!(method = %method, url = %url, "registry request");
    let response = request.send().await.map_err(|e| RegistryError::transport(url, e))?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
      return Err(RegistryError::NotFound {
        repository: self.name.clone(),
        reference: reference.to_string(),
      });
    }
    if !status.is_success() {
      warn!(url = %url, status = status.as_u16(), "registry request failed");
      return Err(RegistryError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }
    Ok(response)
  }
}

#[async_trait]
impl Repository for RemoteRepository {
  fn name(&self) -> &str {
    &self.name
  }

  async fn resolve(&self, reference: &str) -> Result<Descriptor, RegistryError> {
    let url = self.url("manifests", reference);
    let accept = MANIFEST_MEDIA_TYPES.join(", ");
    let response = self.send(Method::GET, &url, reference, Some(&accept)).await?;

    if declared_length(response.headers()).is_some_and(|len| len > MAX_MANIFEST_BYTES) {
      return Err(RegistryError::TooLarge {
        reference: reference.to_string(),
        limit: MAX_MANIFEST_BYTES,
      });
    }

    let media_type = media_type(response.headers()).unwrap_or_else(|| OCI_MANIFEST_MEDIA_TYPE.to_string());
    let advertised = advertised_digest(response.headers())?;
    let body = response.bytes().await.map_err(|e| RegistryError::transport(&url, e))?;

    if body.len() as u64 > MAX_MANIFEST_BYTES {
      return Err(RegistryError::TooLarge {
        reference: reference.to_string(),
        limit: MAX_MANIFEST_BYTES,
      });
    }

    // A digest reference pins the algorithm; otherwise follow the header, then sha256.
    let pinned = Digest::parse(reference).ok();
    let algorithm = pinned
      .as_ref()
      .or(advertised.as_ref())
      .map_or(HashAlgorithm::Sha256, Digest::algorithm);
    let digest = Digest::compute(algorithm, &body);

    for expected in [pinned, advertised].into_iter().flatten() {
      if expected != digest {
        return Err(RegistryError::DigestMismatch {
          expected,
          actual: digest,
        });
      }
    }

    Ok(Descriptor {
      media_type,
      digest,
      size: body.len() as u64,
    })
  }

  async fn fetch(&self, descriptor: &Descriptor) -> Result<ContentStream, RegistryError> {
    let kind = if MANIFEST_MEDIA_TYPES.contains(&descriptor.media_type.as_str()) {
      "manifests"
    } else {
      "blobs"
    };
    let reference = descriptor.digest.to_string();
    let url = self.url(kind, &reference);
    let accept = (kind == "manifests").then_some(descriptor.media_type.as_str());

    let response = self.send(Method::GET, &url, &reference, accept).await?;
    let stream = response.bytes_stream().map_err(io::Error::other);
    Ok(Box::pin(StreamReader::new(stream)))
  }

  async fn resolve_blob(&self, digest: &Digest) -> Result<Descriptor, RegistryError> {
    let reference = digest.to_string();
    let url = self.url("blobs", &reference);
    let response = self.send(Method::HEAD, &url, &reference, None).await?;
    let headers = response.headers();

    let size = declared_length(headers).ok_or_else(|| RegistryError::MissingHeader {
      url: url.clone(),
      header: "content-length",
    })?;

    match advertised_digest(headers)? {
      Some(advertised) if &advertised != digest => {
        return Err(RegistryError::DigestMismatch {
          expected: digest.clone(),
          actual: advertised,
        });
      }
      _ => {}
    }

    Ok(Descriptor {
      media_type: media_type(headers).unwrap_or_else(|| OCTET_STREAM.to_string()),
      digest: digest.clone(),
      size,
    })
  }
}

/// The raw `Content-Length` header. HEAD responses carry no body, so the
/// response's own length hint cannot be used.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
  headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

/// `Content-Type` without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
  let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
  let media_type = value.split(';').next()?.trim();
  (!media_type.is_empty()).then(|| media_type.to_string())
}

fn advertised_digest(headers: &HeaderMap) -> Result<Option<Digest>, RegistryError> {
  match headers.get(DOCKER_CONTENT_DIGEST).and_then(|v| v.to_str().ok()) {
    Some(value) => Ok(Some(Digest::parse(value.trim())?)),
    None => Ok(None),
  }
}
