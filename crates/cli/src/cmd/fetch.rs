//! Implementation of the `recipekit fetch` command.

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::print_json;

use super::{build_engine, cancel_on_ctrl_c};

/// Fetch and decode a recipe, then print the template as JSON.
pub fn cmd_fetch(reference: &str, config_path: Option<&Path>) -> Result<()> {
  let engine = build_engine(config_path)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let template = rt
    .block_on(async {
      let cancel = cancel_on_ctrl_c();
      engine.fetch_recipe(reference, &cancel).await
    })
    .with_context(|| format!("Failed to fetch {reference}"))?;

  print_json(&template)
}
