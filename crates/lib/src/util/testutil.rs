//! Test utilities for recipekit-lib.
//!
//! In-memory stand-ins for the registry and the deployment backend, plus
//! small helpers for building content and digests.

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncRead, ReadBuf};

use crate::consts::{MANIFEST_MEDIA_TYPES, OCI_MANIFEST_MEDIA_TYPE};
use crate::deploy::{
  BackendError, DeploymentBackend, DeploymentOperation, DeploymentRequest, DeploymentResult, ErrorDetail,
  NameGenerator, ProvisioningState, ResourceReference,
};
use crate::registry::{ContentStream, Descriptor, Digest, RegistryClient, RegistryError, Repository};
use crate::util::hash::HashAlgorithm;

const TEMPLATE_MEDIA_TYPE: &str = "application/vnd.recipekit.template.v1+json";

/// SHA-256 digest of `data`.
pub fn sha256_of(data: &[u8]) -> Digest {
  Digest::compute(HashAlgorithm::Sha256, data)
}

/// An OCI manifest whose single layer is `layer`.
pub fn manifest_for(layer: &[u8]) -> Vec<u8> {
  let manifest = json!({
    "schemaVersion": 2,
    "mediaType": OCI_MANIFEST_MEDIA_TYPE,
    "layers": [{
      "mediaType": TEMPLATE_MEDIA_TYPE,
      "digest": sha256_of(layer).to_string(),
      "size": layer.len(),
    }],
  });
  manifest.to_string().into_bytes()
}

/// A reader over `data` that runs a callback when dropped.
struct TrackedReader {
  inner: Cursor<Vec<u8>>,
  on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl AsyncRead for TrackedReader {
  fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
    Pin::new(&mut self.inner).poll_read(cx, buf)
  }
}

impl Drop for TrackedReader {
  fn drop(&mut self) {
    if let Some(on_drop) = self.on_drop.take() {
      on_drop();
    }
  }
}

/// A content stream over `data`.
pub fn stream_of(data: &[u8]) -> ContentStream {
  Box::pin(Cursor::new(data.to_vec()))
}

/// Records whether a wrapped stream has been dropped.
#[derive(Clone, Default)]
pub struct DropFlag(Arc<AtomicBool>);

impl DropFlag {
  pub fn wrap(&self, data: &[u8]) -> ContentStream {
    let flag = self.0.clone();
    Box::pin(TrackedReader {
      inner: Cursor::new(data.to_vec()),
      on_drop: Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
    })
  }

  pub fn dropped(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// A repository held in memory.
///
/// Counts calls and open streams so tests can check that nothing was
/// requested or that every stream was released.
pub struct MemoryRepository {
  name: String,
  tags: HashMap<String, Digest>,
  content: HashMap<Digest, (String, Vec<u8>)>,
  served: HashMap<Digest, Vec<u8>>,
  fail_blob_fetch: bool,
  requests: AtomicUsize,
  fetches: AtomicUsize,
  open: Arc<AtomicUsize>,
}

impl MemoryRepository {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      tags: HashMap::new(),
      content: HashMap::new(),
      served: HashMap::new(),
      fail_blob_fetch: false,
      requests: AtomicUsize::new(0),
      fetches: AtomicUsize::new(0),
      open: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Store `template` as a blob and tag a manifest pointing at it.
  pub fn with_artifact(mut self, tag: &str, template: &[u8]) -> Self {
    self
      .content
      .insert(sha256_of(template), (TEMPLATE_MEDIA_TYPE.to_string(), template.to_vec()));
    let manifest = manifest_for(template);
    self.with_manifest_bytes(tag, manifest)
  }

  /// Tag raw manifest bytes, whatever they contain.
  pub fn with_manifest(self, tag: &str, manifest: &[u8]) -> Self {
    self.with_manifest_bytes(tag, manifest.to_vec())
  }

  fn with_manifest_bytes(mut self, tag: &str, manifest: Vec<u8>) -> Self {
    let digest = sha256_of(&manifest);
    self.tags.insert(tag.to_string(), digest.clone());
    self.content.insert(digest, (OCI_MANIFEST_MEDIA_TYPE.to_string(), manifest));
    self
  }

  /// Fail every non-manifest fetch with a transport error.
  pub fn failing_blob_fetch(mut self) -> Self {
    self.fail_blob_fetch = true;
    self
  }

  /// Serve `bytes` instead of the stored content for `digest`.
  pub fn corrupt_blob(mut self, digest: &Digest, bytes: &[u8]) -> Self {
    self.served.insert(digest.clone(), bytes.to_vec());
    self
  }

  /// Streams handed out and not yet dropped.
  pub fn open_streams(&self) -> usize {
    self.open.load(Ordering::SeqCst)
  }

  pub fn fetch_count(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }

  /// Calls to any [`Repository`] method.
  pub fn request_count(&self) -> usize {
    self.requests.load(Ordering::SeqCst)
  }

  fn not_found(&self, reference: &str) -> RegistryError {
    RegistryError::NotFound {
      repository: self.name.clone(),
      reference: reference.to_string(),
    }
  }
}

#[async_trait]
impl Repository for MemoryRepository {
  fn name(&self) -> &str {
    &self.name
  }

  async fn resolve(&self, reference: &str) -> Result<Descriptor, RegistryError> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    let digest = self.tags.get(reference).ok_or_else(|| self.not_found(reference))?;
    let (media_type, bytes) = &self.content[digest];
    Ok(Descriptor {
      media_type: media_type.clone(),
      digest: digest.clone(),
      size: bytes.len() as u64,
    })
  }

  async fn fetch(&self, descriptor: &Descriptor) -> Result<ContentStream, RegistryError> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    self.fetches.fetch_add(1, Ordering::SeqCst);

    let is_manifest = MANIFEST_MEDIA_TYPES.contains(&descriptor.media_type.as_str());
    if self.fail_blob_fetch && !is_manifest {
      return Err(RegistryError::transport(
        format!("memory://{}/blobs/{}", self.name, descriptor.digest),
        io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
      ));
    }

    let bytes = match self.served.get(&descriptor.digest) {
      Some(bytes) => bytes.clone(),
      None => {
        let (_, bytes) = self
          .content
          .get(&descriptor.digest)
          .ok_or_else(|| self.not_found(&descriptor.digest.to_string()))?;
        bytes.clone()
      }
    };

    let open = self.open.clone();
    open.fetch_add(1, Ordering::SeqCst);
    Ok(Box::pin(TrackedReader {
      inner: Cursor::new(bytes),
      on_drop: Some(Box::new(move || {
        open.fetch_sub(1, Ordering::SeqCst);
      })),
    }))
  }

  async fn resolve_blob(&self, digest: &Digest) -> Result<Descriptor, RegistryError> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    let (media_type, bytes) = self
      .content
      .get(digest)
      .ok_or_else(|| self.not_found(&digest.to_string()))?;
    Ok(Descriptor {
      media_type: media_type.clone(),
      digest: digest.clone(),
      size: bytes.len() as u64,
    })
  }
}

/// A registry made of [`MemoryRepository`] values.
#[derive(Default)]
pub struct MemoryRegistry {
  repositories: HashMap<String, Arc<MemoryRepository>>,
  calls: AtomicUsize,
}

impl MemoryRegistry {
  pub fn with_repository(mut self, repo: Arc<MemoryRepository>) -> Self {
    self.repositories.insert(repo.name.clone(), repo);
    self
  }

  pub fn repository_calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl RegistryClient for MemoryRegistry {
  fn repository(&self, name: &str) -> Result<Arc<dyn Repository>, RegistryError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match self.repositories.get(name) {
      Some(repo) => Ok(repo.clone()),
      None => Err(RegistryError::InvalidRepository {
        name: name.to_string(),
        reason: "unknown repository".to_string(),
      }),
    }
  }
}

/// Always returns the same deployment name.
pub struct FixedNames(String);

impl FixedNames {
  pub fn new(name: &str) -> Self {
    Self(name.to_string())
  }
}

impl NameGenerator for FixedNames {
  fn next_name(&self) -> String {
    self.0.clone()
  }
}

#[derive(Clone)]
enum StubOutcome {
  Finish(DeploymentResult),
  Reject(u16),
  Never,
}

/// Deployment backend with a scripted outcome. Records every submission.
pub struct StubBackend {
  outcome: StubOutcome,
  fail_result: bool,
  accept_delay: Option<Duration>,
  requests: Mutex<Vec<DeploymentRequest>>,
}

impl StubBackend {
  fn with_outcome(outcome: StubOutcome) -> Self {
    Self {
      outcome,
      fail_result: false,
      accept_delay: None,
      requests: Mutex::new(Vec::new()),
    }
  }

  /// Finishes `Succeeded` with `ids` as output resources.
  pub fn succeeding(ids: &[&str]) -> Self {
    Self::with_outcome(StubOutcome::Finish(DeploymentResult {
      provisioning_state: ProvisioningState::Succeeded,
      output_resources: ids.iter().map(|id| ResourceReference { id: id.to_string() }).collect(),
      error: None,
    }))
  }

  /// Finishes `Failed`, optionally with backend error detail.
  pub fn failing(detail: Option<ErrorDetail>) -> Self {
    Self::with_outcome(StubOutcome::Finish(DeploymentResult {
      provisioning_state: ProvisioningState::Failed,
      output_resources: vec![],
      error: detail,
    }))
  }

  /// Rejects the submission with an HTTP status.
  pub fn rejecting(status: u16) -> Self {
    Self::with_outcome(StubOutcome::Reject(status))
  }

  /// Accepts the submission and never reaches a terminal state.
  pub fn never_finishing() -> Self {
    Self::with_outcome(StubOutcome::Never)
  }

  /// Fail result retrieval after a successful wait.
  pub fn failing_result(mut self) -> Self {
    self.fail_result = true;
    self
  }

  /// Record the submission, then take `delay` before answering it.
  pub fn slow_to_accept(mut self, delay: Duration) -> Self {
    self.accept_delay = Some(delay);
    self
  }

  pub fn requests(&self) -> Vec<DeploymentRequest> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl DeploymentBackend for StubBackend {
  async fn create_or_update(&self, request: &DeploymentRequest) -> Result<Box<dyn DeploymentOperation>, BackendError> {
    self.requests.lock().unwrap().push(request.clone());
    if let Some(delay) = self.accept_delay {
      tokio::time::sleep(delay).await;
    }
    if let StubOutcome::Reject(status) = self.outcome {
      return Err(BackendError::Status {
        url: format!("stub://deployments/{}", request.name),
        status,
        detail: None,
      });
    }
    Ok(Box::new(StubOperation {
      name: request.name.clone(),
      outcome: self.outcome.clone(),
      fail_result: self.fail_result,
    }))
  }
}

struct StubOperation {
  name: String,
  outcome: StubOutcome,
  fail_result: bool,
}

#[async_trait]
impl DeploymentOperation for StubOperation {
  fn name(&self) -> &str {
    &self.name
  }

  async fn wait_for_completion(&mut self) -> Result<ProvisioningState, BackendError> {
    match &self.outcome {
      StubOutcome::Finish(result) => Ok(result.provisioning_state.clone()),
      StubOutcome::Never | StubOutcome::Reject(_) => std::future::pending().await,
    }
  }

  async fn result(&mut self) -> Result<DeploymentResult, BackendError> {
    if self.fail_result {
      return Err(BackendError::transport(
        format!("stub://deployments/{}", self.name),
        io::Error::new(io::ErrorKind::TimedOut, "read timed out"),
      ));
    }
    match &self.outcome {
      StubOutcome::Finish(result) => Ok(result.clone()),
      StubOutcome::Never | StubOutcome::Reject(_) => Err(BackendError::NotTerminal {
        name: self.name.clone(),
        state: ProvisioningState::Running,
      }),
    }
  }
}
