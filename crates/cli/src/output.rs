//! Terminal and JSON output for recipekit commands.
//!
//! Status lines go to stdout, errors to stderr. Colors are only applied when
//! the stream supports them.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const RESOURCE: &str = "→";
}

/// Elapsed time rounded to milliseconds, e.g. `1m 5s 20ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
  let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

/// Print an error and each of its causes on its own line.
pub fn print_error(err: &anyhow::Error) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    err.if_supports_color(Stream::Stderr, |s| s.red())
  );
  for cause in err.chain().skip(1) {
    eprintln!(
      "  {} {}",
      "caused by:".if_supports_color(Stream::Stderr, |s| s.dimmed()),
      cause
    );
  }
}

pub fn print_field(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// List deployment output resource IDs, one per line.
pub fn print_resources(ids: &[String]) {
  if ids.is_empty() {
    print_info("No output resources");
    return;
  }
  for id in ids {
    println!(
      "  {} {}",
      symbols::RESOURCE.if_supports_color(Stream::Stdout, |s| s.cyan()),
      id
    );
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")?;
  println!("{json}");
  Ok(())
}
