//! Content-addressable artifact registry access.
//!
//! The engine only needs three registry primitives: resolve a tag to a
//! manifest descriptor, resolve a digest to a blob descriptor, and fetch the
//! content behind a descriptor. They are expressed as the [`Repository`] trait
//! so the engine can run against [`RemoteRegistry`] or an in-memory fake.

pub mod blob;
pub mod content;
pub mod manifest;
pub mod remote;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use blob::fetch_blob;
pub use content::{ContentStream, read_all};
pub use manifest::{ManifestDecodeError, ManifestError, first_layer_digest, resolve_layer_digest};
pub use remote::{RemoteRegistry, RemoteRepository};
pub use types::{Descriptor, Digest, DigestError, RegistryError};

/// A single repository within a registry.
#[async_trait]
pub trait Repository: Send + Sync {
  /// Repository name as given to [`RegistryClient::repository`].
  fn name(&self) -> &str;

  /// Resolve a tag (or manifest digest) to its manifest descriptor.
  async fn resolve(&self, reference: &str) -> Result<Descriptor, RegistryError>;

  /// Open the content stream behind a descriptor.
  async fn fetch(&self, descriptor: &Descriptor) -> Result<ContentStream, RegistryError>;

  /// Resolve a blob digest to its descriptor.
  async fn resolve_blob(&self, digest: &Digest) -> Result<Descriptor, RegistryError>;
}

/// Hands out repository handles. Handles may share a connection pool.
pub trait RegistryClient: Send + Sync {
  fn repository(&self, name: &str) -> Result<Arc<dyn Repository>, RegistryError>;
}
