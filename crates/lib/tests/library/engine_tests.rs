//! Tests for `RecipeEngine` built from configuration.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use recipekit_lib::config::{Credentials, DeploymentConfig, EngineConfig, NamingStrategy, RegistryConfig};
use recipekit_lib::registry::Digest;
use recipekit_lib::util::hash::HashAlgorithm;
use recipekit_lib::{RecipeEngine, RecipeError, RecipeHandler, Stage};

const REFERENCE: &str = "myregistry.example/recipes/rabbitmq:v1";
const DEPLOYMENT_PATH: &str =
  r"^/subscriptions/sub-1/resourcegroups/rg-1/providers/Microsoft\.Resources/deployments/recipe[0-9a-f]{32}";

fn sha256_of(data: &[u8]) -> Digest {
  Digest::compute(HashAlgorithm::Sha256, data)
}

fn engine_for(server: &ServerGuard) -> RecipeEngine {
  let config = EngineConfig {
    registry: RegistryConfig {
      endpoint: Some(server.url()),
      ..RegistryConfig::default()
    },
    deployment: DeploymentConfig {
      endpoint: server.url(),
      poll_interval_secs: 1,
      naming: NamingStrategy::Uuid,
      ..DeploymentConfig::default()
    },
  };
  let credentials = Credentials {
    registry_token: Some("registry-token".to_string()),
    arm_token: Some("arm-token".to_string()),
  };
  RecipeEngine::from_config(&config, &credentials).unwrap()
}

/// Serve `template` as the single layer of `recipes/rabbitmq:v1`.
async fn publish(server: &mut ServerGuard, template: &Value) {
  let layer = template.to_string().into_bytes();
  let layer_digest = sha256_of(&layer);
  let manifest = json!({
    "schemaVersion": 2,
    "layers": [{"mediaType": "application/json", "digest": layer_digest.to_string(), "size": layer.len()}],
  })
  .to_string()
  .into_bytes();
  let manifest_digest = sha256_of(&manifest);

  for path in ["/v2/recipes/rabbitmq/manifests/v1".to_string(), format!("/v2/recipes/rabbitmq/manifests/{manifest_digest}")] {
    server
      .mock("GET", path.as_str())
      .match_header("authorization", "Bearer registry-token")
      .with_header("content-type", "application/vnd.oci.image.manifest.v1+json")
      .with_body(&manifest)
      .create_async()
      .await;
  }
  for method in ["HEAD", "GET"] {
    server
      .mock(method, format!("/v2/recipes/rabbitmq/blobs/{layer_digest}").as_str())
      .match_header("authorization", "Bearer registry-token")
      .with_body(&layer)
      .create_async()
      .await;
  }
}

#[tokio::test]
async fn deploys_recipe_end_to_end() {
  let mut server = Server::new_async().await;
  let template = json!({"resources": [{"type": "Microsoft.ServiceBus/namespaces"}]});
  publish(&mut server, &template).await;
  let put = server
    .mock("PUT", Matcher::Regex(DEPLOYMENT_PATH.to_string()))
    .match_header("authorization", "Bearer arm-token")
    .match_body(Matcher::PartialJson(json!({"properties": {"template": template}})))
    .with_status(201)
    .with_body(r#"{"properties":{"provisioningState":"Accepted"}}"#)
    .create_async()
    .await;
  let get = server
    .mock("GET", Matcher::Regex(DEPLOYMENT_PATH.to_string()))
    .with_body(r#"{"properties":{"provisioningState":"Succeeded","outputResources":[{"id":"/ns/mq"}]}}"#)
    .create_async()
    .await;

  let engine = engine_for(&server);
  let resources = engine
    .deploy_recipe(REFERENCE, "sub-1", "rg-1", &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(resources, vec!["/ns/mq".to_string()]);
  put.assert_async().await;
  get.assert_async().await;
}

#[tokio::test]
async fn handler_trait_object_deploys() {
  let mut server = Server::new_async().await;
  publish(&mut server, &json!({"resources": []})).await;
  server
    .mock("PUT", Matcher::Regex(DEPLOYMENT_PATH.to_string()))
    .with_status(200)
    .with_body(r#"{"properties":{"provisioningState":"Succeeded","outputResources":[]}}"#)
    .create_async()
    .await;

  let handler: Box<dyn RecipeHandler> = Box::new(engine_for(&server));
  let resources = handler
    .deploy_recipe(REFERENCE, "sub-1", "rg-1", &CancellationToken::new())
    .await
    .unwrap();
  assert!(resources.is_empty());
}

#[tokio::test]
async fn fetch_recipe_returns_template() {
  let mut server = Server::new_async().await;
  let template = json!({"parameters": {}, "resources": []});
  publish(&mut server, &template).await;

  let engine = engine_for(&server);
  let fetched = engine.fetch_recipe(REFERENCE, &CancellationToken::new()).await.unwrap();
  assert_eq!(Value::Object(fetched.into_map()), template);
}

#[tokio::test]
async fn failed_deployment_surfaces_name_and_detail() {
  let mut server = Server::new_async().await;
  publish(&mut server, &json!({"resources": []})).await;
  server
    .mock("PUT", Matcher::Regex(DEPLOYMENT_PATH.to_string()))
    .with_status(201)
    .with_body(r#"{"properties":{"provisioningState":"Failed","error":{"code":"Conflict","message":"busy"}}}"#)
    .create_async()
    .await;

  let engine = engine_for(&server);
  let err = engine
    .deploy_recipe(REFERENCE, "sub-1", "rg-1", &CancellationToken::new())
    .await
    .unwrap_err();

  let RecipeError::DeploymentFailed(failed) = &err else {
    panic!("expected DeploymentFailed, got {err:?}");
  };
  assert!(failed.name.starts_with("recipe"));
  assert_eq!(failed.detail.as_ref().map(|d| d.code.as_str()), Some("Conflict"));
  assert_eq!(err.stage(), Stage::ExtractOutputs);
}

#[tokio::test]
async fn cancelled_before_start_makes_no_requests() {
  let mut server = Server::new_async().await;
  let any = server.mock("GET", Matcher::Any).expect(0).create_async().await;

  let cancel = CancellationToken::new();
  cancel.cancel();
  let err = engine_for(&server)
    .deploy_recipe(REFERENCE, "sub-1", "rg-1", &cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, RecipeError::Cancelled { deployment: None, .. }));
  any.assert_async().await;
}

#[tokio::test]
async fn tampered_layer_is_rejected_before_deploying() {
  let mut server = Server::new_async().await;
  let layer = br#"{"resources":[]}"#;
  let digest = sha256_of(layer);
  let manifest = json!({
    "schemaVersion": 2,
    "layers": [{"mediaType": "application/json", "digest": digest.to_string(), "size": layer.len()}],
  })
  .to_string();
  server
    .mock("GET", Matcher::Regex(r"^/v2/recipes/rabbitmq/manifests/".to_string()))
    .with_body(&manifest)
    .create_async()
    .await;
  server
    .mock("HEAD", format!("/v2/recipes/rabbitmq/blobs/{digest}").as_str())
    .with_body(layer)
    .create_async()
    .await;
  server
    .mock("GET", format!("/v2/recipes/rabbitmq/blobs/{digest}").as_str())
    .with_body(br#"{"resources":[1]}"#)
    .create_async()
    .await;
  let put = server.mock("PUT", Matcher::Any).expect(0).create_async().await;

  let err = engine_for(&server)
    .deploy_recipe(REFERENCE, "sub-1", "rg-1", &CancellationToken::new())
    .await
    .unwrap_err();

  assert_eq!(err.stage(), Stage::FetchTemplate);
  put.assert_async().await;
}
