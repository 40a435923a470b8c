//! Implementation of the `recipekit parse` command.

use anyhow::{Context, Result};
use serde::Serialize;

use recipekit_lib::reference::{RepositoryName, parse_reference};

use crate::output::{OutputFormat, print_field, print_json};

#[derive(Serialize)]
struct ParsedReference {
  repository: String,
  tag: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  registry: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  path: Option<String>,
}

/// Print the parts of a reference. Makes no network calls.
pub fn cmd_parse(reference: &str, output: OutputFormat) -> Result<()> {
  let parsed = parse_reference(reference).context("Invalid recipe reference")?;
  let name = RepositoryName::parse(&parsed.repository).ok();

  let parsed = ParsedReference {
    registry: name.as_ref().map(|n| n.host.clone()),
    path: name.map(|n| n.path),
    repository: parsed.repository,
    tag: parsed.tag,
  };

  if output.is_json() {
    return print_json(&parsed);
  }

  print_field("repository", &parsed.repository);
  print_field("tag", &parsed.tag);
  if let (Some(registry), Some(path)) = (&parsed.registry, &parsed.path) {
    print_field("registry", registry);
    print_field("path", path);
  }
  Ok(())
}
