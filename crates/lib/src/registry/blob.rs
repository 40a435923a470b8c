//! Blob download by digest.

use tracing::debug;

use super::Repository;
use super::content::read_all;
use super::types::{Digest, RegistryError};

/// Download the blob addressed by `digest`.
///
/// Integrity is checked by [`read_all`] against the resolved descriptor; the
/// returned bytes are not hashed again here.
pub async fn fetch_blob(repo: &dyn Repository, digest: &Digest) -> Result<Vec<u8>, RegistryError> {
  let descriptor = repo.resolve_blob(digest).await?;
  debug!(repository = repo.name(), %digest, size = descriptor.size, "resolved blob");

  let stream = repo.fetch(&descriptor).await?;
  read_all(stream, &descriptor).await
}
