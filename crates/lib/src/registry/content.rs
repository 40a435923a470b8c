//! Content streams and verified reads.

use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::types::{Descriptor, Digest, RegistryError};
use crate::util::hash::ContentHasher;

/// A streamed manifest or blob body.
///
/// The stream is an owned value: dropping it releases the underlying
/// connection, so every exit path of a reader closes it.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

const CHUNK_SIZE: usize = 16 * 1024;

/// Read a stream to the end, verifying it against its descriptor.
///
/// Fails if the stream yields more or fewer bytes than `descriptor.size`, or if
/// the bytes do not hash to `descriptor.digest`. The stream is consumed and
/// dropped before this returns, whatever the outcome.
pub async fn read_all(mut stream: ContentStream, descriptor: &Descriptor) -> Result<Vec<u8>, RegistryError> {
  let expected = descriptor.size;
  let mut hasher = ContentHasher::new(descriptor.digest.algorithm());
  let mut content = Vec::with_capacity(expected.min(CHUNK_SIZE as u64 * 64) as usize);
  let mut chunk = vec![0u8; CHUNK_SIZE];

  loop {
    let n = stream.read(&mut chunk).await.map_err(|source| RegistryError::Read {
      digest: descriptor.digest.clone(),
      source,
    })?;
    if n == 0 {
      break;
    }
    if content.len() as u64 + n as u64 > expected {
      return Err(RegistryError::SizeMismatch {
        digest: descriptor.digest.clone(),
        expected,
        actual: content.len() as u64 + n as u64,
      });
    }
    hasher.update(&chunk[..n]);
    content.extend_from_slice(&chunk[..n]);
  }

  if content.len() as u64 != expected {
    return Err(RegistryError::SizeMismatch {
      digest: descriptor.digest.clone(),
      expected,
      actual: content.len() as u64,
    });
  }

  let actual = Digest::from_hasher(hasher);
  if actual != descriptor.digest {
    return Err(RegistryError::DigestMismatch {
      expected: descriptor.digest.clone(),
      actual,
    });
  }

  Ok(content)
}
