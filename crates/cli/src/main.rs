mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{DeployArgs, cmd_deploy, cmd_fetch, cmd_parse};
use crate::output::{OutputFormat, print_error};

/// recipekit - fetch infrastructure recipes from an OCI registry and deploy them
#[derive(Parser)]
#[command(name = "recipekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Configuration file (defaults to $RECIPEKIT_CONFIG)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch a recipe and deploy it into a resource group
  Deploy {
    /// Recipe reference, e.g. myregistry.example/recipes/rabbitmq:v1
    reference: String,

    /// Subscription to deploy into
    #[arg(long)]
    subscription: String,

    /// Resource group to deploy into
    #[arg(long)]
    resource_group: String,

    /// Give up waiting for the deployment after this long (e.g. 90s, 15m)
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Fetch a recipe and print its template
  Fetch {
    /// Recipe reference
    reference: String,
  },

  /// Parse a recipe reference without contacting the registry
  Parse {
    /// Recipe reference
    reference: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

/// A non-zero duration such as `90s` or `1m 30s 500ms`.
fn parse_timeout(value: &str) -> Result<Duration, String> {
  let timeout = humantime::parse_duration(value).map_err(|err| err.to_string())?;
  if timeout.is_zero() {
    return Err("timeout must be greater than zero".to_string());
  }
  Ok(timeout)
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cli.config.as_deref();
  let result = match cli.command {
    Commands::Deploy {
      reference,
      subscription,
      resource_group,
      timeout,
      output,
    } => cmd_deploy(
      &DeployArgs {
        reference,
        subscription,
        resource_group,
        timeout,
        output,
      },
      config,
    ),
    Commands::Fetch { reference } => cmd_fetch(&reference, config),
    Commands::Parse { reference, output } => cmd_parse(&reference, output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&err);
      ExitCode::FAILURE
    }
  }
}
