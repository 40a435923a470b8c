//! Template reference parsing.
//!
//! A recipe is addressed by a single `repository:tag` string such as
//! `myregistry.example/recipes/rabbitmq:v1`. The string is split on its first
//! colon. References whose repository part carries a colon of its own (a
//! `host:port` registry address) end up with an invalid tag and are rejected
//! instead of being reinterpreted.

use std::fmt;

use thiserror::Error;

use crate::consts::MAX_TAG_LEN;

/// Errors produced while parsing a template reference or repository name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
  #[error("template reference cannot be empty")]
  Empty,

  #[error("template reference '{0}' must have the form 'repository:tag'")]
  MissingTag(String),

  #[error("template reference '{0}' has an empty repository")]
  EmptyRepository(String),

  #[error("template reference '{0}' has an empty tag")]
  EmptyTag(String),

  #[error("template reference '{reference}' has invalid tag '{tag}' (registry addresses with a port are not supported)")]
  InvalidTag { reference: String, tag: String },

  #[error("repository '{0}' must have the form 'registry-host/path'")]
  MissingRegistryHost(String),

  #[error("repository '{name}' has invalid path component '{component}'")]
  InvalidPathComponent { name: String, component: String },
}

/// A parsed `repository:tag` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateReference {
  pub repository: String,
  pub tag: String,
}

impl TemplateReference {
  /// Parse a reference, splitting on the first colon.
  pub fn parse(input: &str) -> Result<Self, ReferenceError> {
    if input.is_empty() {
      return Err(ReferenceError::Empty);
    }

    let (repository, tag) = input
      .split_once(':')
      .ok_or_else(|| ReferenceError::MissingTag(input.to_string()))?;

    if repository.is_empty() {
      return Err(ReferenceError::EmptyRepository(input.to_string()));
    }
    if tag.is_empty() {
      return Err(ReferenceError::EmptyTag(input.to_string()));
    }
    if !is_valid_tag(tag) {
      return Err(ReferenceError::InvalidTag {
        reference: input.to_string(),
        tag: tag.to_string(),
      });
    }

    Ok(Self {
      repository: repository.to_string(),
      tag: tag.to_string(),
    })
  }
}

impl fmt::Display for TemplateReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.repository, self.tag)
  }
}

/// Parse a reference string. Pure: the same input always yields the same result.
pub fn parse_reference(input: &str) -> Result<TemplateReference, ReferenceError> {
  TemplateReference::parse(input)
}

/// OCI distribution tag grammar: `[A-Za-z0-9_][A-Za-z0-9._-]{0,127}`.
fn is_valid_tag(tag: &str) -> bool {
  let mut chars = tag.chars();
  let Some(first) = chars.next() else {
    return false;
  };
  tag.len() <= MAX_TAG_LEN
    && (first.is_ascii_alphanumeric() || first == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// A repository split into the registry host and the path within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName {
  pub host: String,
  pub path: String,
}

impl RepositoryName {
  /// Split `myregistry.example/recipes/rabbitmq` into host and path.
  pub fn parse(name: &str) -> Result<Self, ReferenceError> {
    let (host, path) = name
      .split_once('/')
      .filter(|(host, path)| !host.is_empty() && !path.is_empty())
      .ok_or_else(|| ReferenceError::MissingRegistryHost(name.to_string()))?;

    for component in path.split('/') {
      if !is_valid_path_component(component) {
        return Err(ReferenceError::InvalidPathComponent {
          name: name.to_string(),
          component: component.to_string(),
        });
      }
    }

    Ok(Self {
      host: host.to_string(),
      path: path.to_string(),
    })
  }
}

impl fmt::Display for RepositoryName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.host, self.path)
  }
}

/// Path components are lowercase alphanumerics joined by single separators.
fn is_valid_path_component(component: &str) -> bool {
  let bytes = component.as_bytes();
  let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
    return false;
  };
  let is_alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
  is_alnum(first)
    && is_alnum(last)
    && bytes.iter().all(|b| is_alnum(b) || matches!(b, b'.' | b'_' | b'-'))
}
