//! Tests for `recipekit fetch`.

use mockito::Matcher;
use predicates::prelude::*;
use serde_json::json;

use super::common::TestEnv;

#[test]
fn prints_template_in_document_order() {
  let mut env = TestEnv::new();
  let template = json!({
    "$schema": "https://schema.example/deploymentTemplate.json#",
    "contentVersion": "1.0.0.0",
    "resources": [{"type": "Microsoft.Cache/redis", "name": "cache"}]
  });
  env.publish("recipes/redis", "v2", &template);
  let put = env.server.mock("PUT", Matcher::Any).expect(0).create();

  let output = env
    .recipekit_cmd()
    .args(["fetch", "myregistry.example/recipes/redis:v2"])
    .output()
    .unwrap();
  assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

  let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(printed, template);
  let keys: Vec<_> = printed.as_object().unwrap().keys().cloned().collect();
  assert_eq!(keys, ["$schema", "contentVersion", "resources"]);
  put.assert();
}

#[test]
fn manifest_without_layers_fails() {
  let mut env = TestEnv::new();
  env
    .server
    .mock("GET", "/v2/recipes/redis/manifests/v2")
    .with_header("content-type", "application/vnd.oci.image.manifest.v1+json")
    .with_body(r#"{"schemaVersion":2,"layers":[]}"#)
    .create();
  env
    .server
    .mock("GET", Matcher::Regex(r"^/v2/recipes/redis/manifests/sha256:".to_string()))
    .with_header("content-type", "application/vnd.oci.image.manifest.v1+json")
    .with_body(r#"{"schemaVersion":2,"layers":[]}"#)
    .create();

  env
    .recipekit_cmd()
    .args(["fetch", "myregistry.example/recipes/redis:v2"])
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("is malformed"));
}

#[test]
fn registry_token_is_sent_as_bearer() {
  let mut env = TestEnv::new();
  env
    .server
    .mock("GET", "/v2/recipes/redis/manifests/v2")
    .match_header("authorization", "Bearer registry-secret")
    .with_status(404)
    .create();

  env
    .recipekit_cmd()
    .env("RECIPEKIT_REGISTRY_TOKEN", "registry-secret")
    .args(["fetch", "myregistry.example/recipes/redis:v2"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}
