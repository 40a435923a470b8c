//! Implementation of the `recipekit deploy` command.
//!
//! Fetches the recipe, deploys it into the given resource group and prints
//! the output resource IDs.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::output::{OutputFormat, format_elapsed, print_json, print_resources, print_success};

use super::{build_engine, cancel_on_ctrl_c};

pub struct DeployArgs {
  pub reference: String,
  pub subscription: String,
  pub resource_group: String,
  pub timeout: Option<Duration>,
  pub output: OutputFormat,
}

#[derive(Serialize)]
struct DeployOutput<'a> {
  reference: &'a str,
  subscription: &'a str,
  resource_group: &'a str,
  resources: Vec<String>,
}

/// Execute the deploy command.
///
/// `--timeout` overrides `deployment.timeout_secs` from the configuration.
/// Ctrl-C cancels the registry fetches, the submission and the wait. A
/// deployment request that was already sent is not withdrawn.
pub fn cmd_deploy(args: &DeployArgs, config_path: Option<&Path>) -> Result<()> {
  let mut engine = build_engine(config_path)?;
  if args.timeout.is_some() {
    engine = engine.with_wait_timeout(args.timeout);
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  let resources = rt
    .block_on(async {
      let cancel = cancel_on_ctrl_c();
      engine
        .deploy_recipe(&args.reference, &args.subscription, &args.resource_group, &cancel)
        .await
    })
    .with_context(|| format!("Failed to deploy {}", args.reference))?;

  if args.output.is_json() {
    return print_json(&DeployOutput {
      reference: &args.reference,
      subscription: &args.subscription,
      resource_group: &args.resource_group,
      resources,
    });
  }

  print_success(&format!(
    "Deployed {} to {} in {}",
    args.reference,
    args.resource_group,
    format_elapsed(started.elapsed())
  ));
  print_resources(&resources);
  Ok(())
}
