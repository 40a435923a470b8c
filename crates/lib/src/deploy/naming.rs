//! Deployment name generation.

use chrono::Utc;
use uuid::Uuid;

use crate::config::NamingStrategy;
use crate::consts::DEPLOYMENT_NAME_PREFIX;

/// Produces a fresh deployment name per call.
pub trait NameGenerator: Send + Sync {
  fn next_name(&self) -> String;
}

/// `recipe<unix-nanoseconds>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampNames;

impl NameGenerator for TimestampNames {
  fn next_name(&self) -> String {
    let now = Utc::now();
    // Out of range only after the year 2262.
    let nanos = now
      .timestamp_nanos_opt()
      .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
    format!("{DEPLOYMENT_NAME_PREFIX}{nanos}")
  }
}

/// `recipe<uuid-v4-simple>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidNames;

impl NameGenerator for UuidNames {
  fn next_name(&self) -> String {
    format!("{DEPLOYMENT_NAME_PREFIX}{}", Uuid::new_v4().simple())
  }
}

impl NamingStrategy {
  pub fn generator(self) -> Box<dyn NameGenerator> {
    match self {
      Self::Timestamp => Box::new(TimestampNames),
      Self::Uuid => Box::new(UuidNames),
    }
  }
}
