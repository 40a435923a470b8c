//! Hashing utilities for content verification.
//!
//! This module provides:
//! - `HashAlgorithm`: the digest algorithms a registry may address content by
//! - `ContentHasher`: incremental hashing while a stream is read

use std::fmt;

use sha2::{Digest as _, Sha256, Sha512};

/// Digest algorithm named by the `algorithm` part of an `algorithm:hex` digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
  Sha256,
  Sha512,
}

impl HashAlgorithm {
  /// Parse the algorithm component of a digest.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "sha256" => Some(Self::Sha256),
      "sha512" => Some(Self::Sha512),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Sha256 => "sha256",
      Self::Sha512 => "sha512",
    }
  }

  /// Number of lowercase hex characters in an encoded hash.
  pub fn hex_len(self) -> usize {
    match self {
      Self::Sha256 => 64,
      Self::Sha512 => 128,
    }
  }
}

impl fmt::Display for HashAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Incremental hasher over one of the supported algorithms.
pub enum ContentHasher {
  Sha256(Sha256),
  Sha512(Sha512),
}

impl ContentHasher {
  pub fn new(algorithm: HashAlgorithm) -> Self {
    match algorithm {
      HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
      HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
    }
  }

  pub fn algorithm(&self) -> HashAlgorithm {
    match self {
      Self::Sha256(_) => HashAlgorithm::Sha256,
      Self::Sha512(_) => HashAlgorithm::Sha512,
    }
  }

  pub fn update(&mut self, data: &[u8]) {
    match self {
      Self::Sha256(h) => h.update(data),
      Self::Sha512(h) => h.update(data),
    }
  }

  /// Consume the hasher and return the lowercase hex encoding.
  pub fn finalize_hex(self) -> String {
    match self {
      Self::Sha256(h) => hex::encode(h.finalize()),
      Self::Sha512(h) => hex::encode(h.finalize()),
    }
  }
}
