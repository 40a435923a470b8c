//! Types for registry content addressing.
//!
//! This module defines digests, descriptors and the error type shared by every
//! registry operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::{ContentHasher, HashAlgorithm};

/// A digest string that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid digest '{digest}': {reason}")]
pub struct DigestError {
  pub digest: String,
  pub reason: &'static str,
}

/// A validated `algorithm:hex` content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
  algorithm: HashAlgorithm,
  encoded: String,
}

impl Digest {
  /// Parse and validate a digest such as `sha256:abcd...`.
  pub fn parse(input: &str) -> Result<Self, DigestError> {
    let invalid = |reason| DigestError {
      digest: input.to_string(),
      reason,
    };

    let (algorithm, encoded) = input.split_once(':').ok_or_else(|| invalid("missing ':' separator"))?;
    let algorithm = HashAlgorithm::from_name(algorithm).ok_or_else(|| invalid("unsupported algorithm"))?;

    if encoded.len() != algorithm.hex_len() {
      return Err(invalid("wrong length for algorithm"));
    }
    if !encoded.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
      return Err(invalid("not lowercase hex"));
    }

    Ok(Self {
      algorithm,
      encoded: encoded.to_string(),
    })
  }

  /// Compute the digest of `data` with the given algorithm.
  pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
    let mut hasher = ContentHasher::new(algorithm);
    hasher.update(data);
    Self::from_hasher(hasher)
  }

  /// Finish an incremental hash into a digest.
  pub fn from_hasher(hasher: ContentHasher) -> Self {
    Self {
      algorithm: hasher.algorithm(),
      encoded: hasher.finalize_hex(),
    }
  }

  pub fn algorithm(&self) -> HashAlgorithm {
    self.algorithm
  }

  /// The hex part after the colon.
  pub fn encoded(&self) -> &str {
    &self.encoded
  }
}

impl fmt::Display for Digest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.algorithm, self.encoded)
  }
}

impl FromStr for Digest {
  type Err = DigestError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for Digest {
  type Error = DigestError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<Digest> for String {
  fn from(value: Digest) -> Self {
    value.to_string()
  }
}

/// Identifies a manifest or blob in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
  pub media_type: String,
  pub digest: Digest,
  pub size: u64,
}

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// The repository name could not be turned into a registry address.
  #[error("invalid repository '{name}': {reason}")]
  InvalidRepository { name: String, reason: String },

  /// The configured registry endpoint is not a URL.
  #[error("invalid registry endpoint '{endpoint}': {reason}")]
  InvalidEndpoint { endpoint: String, reason: String },

  /// The request never produced a response.
  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The registry answered with an unexpected status.
  #[error("{url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  /// The tag or digest does not exist in the repository.
  #[error("'{reference}' not found in repository '{repository}'")]
  NotFound { repository: String, reference: String },

  /// A header needed to build a descriptor was absent or unreadable.
  #[error("response from {url} has no usable '{header}' header")]
  MissingHeader { url: String, header: &'static str },

  #[error(transparent)]
  Digest(#[from] DigestError),

  /// Content exceeded the size allowed for its kind. `reference` is the tag
  /// or digest the content was requested by.
  #[error("content for '{reference}' exceeds {limit} bytes")]
  TooLarge { reference: String, limit: u64 },

  /// Content length differed from the descriptor.
  #[error("size mismatch for {digest}: expected {expected} bytes, got {actual}")]
  SizeMismatch { digest: Digest, expected: u64, actual: u64 },

  /// Content hash differed from the descriptor.
  #[error("digest mismatch: expected {expected}, got {actual}")]
  DigestMismatch { expected: Digest, actual: Digest },

  /// The content stream failed part way through.
  #[error("failed to read content for {digest}: {source}")]
  Read {
    digest: Digest,
    #[source]
    source: std::io::Error,
  },
}

impl RegistryError {
  pub fn transport(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Transport {
      url: url.into(),
      source: Box::new(source),
    }
  }

  /// Whether repeating the same request might succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Transport { .. } | Self::Read { .. } => true,
      Self::Status { status, .. } => *status == 429 || *status >= 500,
      _ => false,
    }
  }
}
