//! Manifest resolution.
//!
//! A recipe artifact is a manifest whose first layer is the template blob.
//! The manifest is handled as an untyped JSON document; only the path
//! `layers[0].digest` is required, and each way that path can be missing has
//! its own named failure.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::Repository;
use super::content::read_all;
use super::types::{Digest, DigestError, RegistryError};
use crate::consts::MAX_MANIFEST_BYTES;

/// Why a manifest could not yield a layer digest.
#[derive(Debug, Error)]
pub enum ManifestDecodeError {
  #[error("manifest is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("manifest is not a JSON object")]
  NotAnObject,

  #[error("manifest has no 'layers' array")]
  MissingLayers,

  #[error("manifest 'layers' array is empty")]
  NoLayers,

  #[error("first manifest layer is not an object")]
  LayerNotAnObject,

  #[error("first manifest layer has no string 'digest'")]
  MissingDigest,

  #[error("first manifest layer has an invalid digest: {0}")]
  InvalidDigest(#[from] DigestError),
}

/// Errors from [`resolve_layer_digest`].
#[derive(Debug, Error)]
pub enum ManifestError {
  /// The registry could not produce the manifest.
  #[error(transparent)]
  Registry(#[from] RegistryError),

  /// The manifest was fetched but is malformed. Re-fetching will not help.
  #[error("failed to decode manifest {digest}: {source}")]
  Decode {
    digest: Digest,
    #[source]
    source: ManifestDecodeError,
  },
}

/// Resolve `tag` to a manifest and return the digest of its first layer.
pub async fn resolve_layer_digest(repo: &dyn Repository, tag: &str) -> Result<Digest, ManifestError> {
  let descriptor = repo.resolve(tag).await?;
  debug!(repository = repo.name(), tag, digest = %descriptor.digest, "resolved manifest");

  if descriptor.size > MAX_MANIFEST_BYTES {
    return Err(
      RegistryError::TooLarge {
        reference: descriptor.digest.to_string(),
        limit: MAX_MANIFEST_BYTES,
      }
      .into(),
    );
  }

  let stream = repo.fetch(&descriptor).await?;
  let manifest = read_all(stream, &descriptor).await?;

  first_layer_digest(&manifest).map_err(|source| ManifestError::Decode {
    digest: descriptor.digest,
    source,
  })
}

/// Extract `layers[0].digest` from raw manifest bytes.
pub fn first_layer_digest(manifest: &[u8]) -> Result<Digest, ManifestDecodeError> {
  let document: Value = serde_json::from_slice(manifest)?;
  let object = document.as_object().ok_or(ManifestDecodeError::NotAnObject)?;

  let layers = object
    .get("layers")
    .and_then(Value::as_array)
    .ok_or(ManifestDecodeError::MissingLayers)?;
  let layer = layers.first().ok_or(ManifestDecodeError::NoLayers)?;
  let layer = layer.as_object().ok_or(ManifestDecodeError::LayerNotAnObject)?;

  let digest = layer
    .get("digest")
    .and_then(Value::as_str)
    .ok_or(ManifestDecodeError::MissingDigest)?;

  Ok(Digest::parse(digest)?)
}
