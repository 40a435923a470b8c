mod deploy;
mod fetch;
mod parse;

pub use deploy::{DeployArgs, cmd_deploy};
pub use fetch::cmd_fetch;
pub use parse::cmd_parse;

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use recipekit_lib::RecipeEngine;
use recipekit_lib::config::{Credentials, EngineConfig};

/// Load configuration and build an engine from it.
fn build_engine(config_path: Option<&Path>) -> Result<RecipeEngine> {
  let config = EngineConfig::load(config_path).context("Failed to load configuration")?;
  RecipeEngine::from_config(&config, &Credentials::from_env()).context("Failed to create recipe engine")
}

/// A token cancelled on Ctrl-C. Must be called inside a runtime.
fn cancel_on_ctrl_c() -> CancellationToken {
  let token = CancellationToken::new();
  let trigger = token.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling");
      trigger.cancel();
    }
  });
  token
}
