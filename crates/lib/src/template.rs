//! Recipe template decoding.
//!
//! A template is an ordered JSON object. No schema is applied here; the
//! deployment backend is the authority on what a template may contain.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from [`decode_template`].
#[derive(Debug, Error)]
pub enum TemplateDecodeError {
  #[error("template is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("template must be a JSON object, found {0}")]
  NotAnObject(&'static str),
}

/// A decoded recipe template. Key order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeTemplate(Map<String, Value>);

impl RecipeTemplate {
  pub fn as_map(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn into_map(self) -> Map<String, Value> {
    self.0
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<Map<String, Value>> for RecipeTemplate {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}

/// Decode template bytes into a [`RecipeTemplate`].
pub fn decode_template(bytes: &[u8]) -> Result<RecipeTemplate, TemplateDecodeError> {
  match serde_json::from_slice(bytes)? {
    Value::Object(map) => Ok(RecipeTemplate(map)),
    other => Err(TemplateDecodeError::NotAnObject(json_kind(&other))),
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
