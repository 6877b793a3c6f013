//! Admission webhook tests driven through the axum router

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use serving::webhook::{router, WebhookState};
use serving::InferenceServicesConfig;
use tower::ServiceExt;

const PREDICTORS: &str = r#"
tensorflow:
  image: tensorflow/serving
  defaultImageVersion: "1.14.0"
  defaultGpuImageVersion: "1.14.0-gpu"
torchserve:
  image: pytorch/torchserve
  defaultImageVersion: "0.4"
  defaultGpuImageVersion: "0.4-gpu"
pytorch:
  image: gcr.io/kfserving/pytorchserver
  defaultImageVersion: v0.4.0
  defaultGpuImageVersion: v0.4.0-gpu
sklearn:
  image: gcr.io/kfserving/sklearnserver
  defaultImageVersion: v0.4.0
xgboost:
  image: gcr.io/kfserving/xgbserver
  defaultImageVersion: v0.4.0
onnx:
  image: mcr.microsoft.com/onnxruntime/server
  defaultImageVersion: v1.0.0
triton:
  image: nvcr.io/nvidia/tritonserver
  defaultImageVersion: 19.10-py3
"#;

fn app() -> Router {
    let config: InferenceServicesConfig = PREDICTORS.parse().unwrap();
    router(Arc::new(WebhookState::new(config)))
}

fn review(operation: &str, predictor: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "serving.kubeflow.org", "version": "v1alpha2", "kind": "InferenceService"},
            "resource": {"group": "serving.kubeflow.org", "version": "v1alpha2", "resource": "inferenceservices"},
            "name": "mnist",
            "namespace": "default",
            "operation": operation,
            "userInfo": {"username": "admin"},
            "object": {
                "apiVersion": "serving.kubeflow.org/v1alpha2",
                "kind": "InferenceService",
                "metadata": {"name": "mnist", "namespace": "default"},
                "spec": {"default": {"predictor": predictor}}
            },
            "oldObject": null,
            "dryRun": false,
            "options": null
        }
    })
}

async fn post(uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Decode the JSON patch carried as raw bytes in an admission response
fn patch_ops(response: &Value) -> Vec<Value> {
    let bytes: Vec<u8> = serde_json::from_value(response["patch"].clone()).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn ready_endpoint_lists_frameworks() {
    let response = app()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["configValid"], true);
    assert_eq!(body["frameworks"].as_array().map(Vec::len), Some(7));
}

#[tokio::test]
async fn mutate_returns_json_patch() {
    let body = review(
        "CREATE",
        json!({"torchserve": {"storageUri": "gs://kfserving-examples/models/torchserve/image_classifier"}}),
    );
    let (status, reply) = post("/mutate", &body).await;

    assert_eq!(status, StatusCode::OK);
    let response = &reply["response"];
    assert_eq!(response["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
    assert_eq!(response["allowed"], true);
    assert_eq!(response["patchType"], "JSONPatch");

    let ops = patch_ops(response);
    assert!(ops.contains(&json!({
        "op": "add",
        "path": "/spec/default/predictor/torchserve/runtimeVersion",
        "value": "0.4"
    })));
    assert!(ops
        .iter()
        .any(|op| op["path"] == "/spec/default/predictor/torchserve/resources"));
}

#[tokio::test]
async fn mutate_selects_gpu_runtime_for_gpu_predictor() {
    let body = review(
        "CREATE",
        json!({"torchserve": {
            "storageUri": "gs://models/mnist",
            "resources": {"limits": {"nvidia.com/gpu": "1"}}
        }}),
    );
    let (_, reply) = post("/mutate", &body).await;

    let ops = patch_ops(&reply["response"]);
    assert!(ops.contains(&json!({
        "op": "add",
        "path": "/spec/default/predictor/torchserve/runtimeVersion",
        "value": "0.4-gpu"
    })));
}

#[tokio::test]
async fn mutate_allows_delete_without_patch() {
    let body = review("DELETE", json!({"torchserve": {"storageUri": "gs://models/mnist"}}));
    let (_, reply) = post("/mutate", &body).await;

    assert_eq!(reply["response"]["allowed"], true);
    assert!(reply["response"].get("patch").is_none());
}

#[tokio::test]
async fn validate_allows_consistent_predictor() {
    let body = review(
        "CREATE",
        json!({"torchserve": {
            "storageUri": "gs://models/mnist",
            "runtimeVersion": "0.4-gpu",
            "resources": {"limits": {"nvidia.com/gpu": "1"}}
        }}),
    );
    let (_, reply) = post("/validate", &body).await;
    assert_eq!(reply["response"]["allowed"], true);
}

#[tokio::test]
async fn validate_denies_gpu_tag_without_gpu_resources() {
    let body = review(
        "CREATE",
        json!({"torchserve": {
            "storageUri": "gs://models/mnist",
            "runtimeVersion": "0.4-gpu"
        }}),
    );
    let (status, reply) = post("/validate", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["allowed"], false);
    assert!(reply.to_string().contains(
        "TorchServe RuntimeVersion is GPU enabled but GPU resources are not requested."
    ));
}

#[tokio::test]
async fn validate_denies_multiple_predictors() {
    let body = review(
        "UPDATE",
        json!({
            "sklearn": {"storageUri": "gs://models/iris"},
            "xgboost": {"storageUri": "gs://models/iris"}
        }),
    );
    let (_, reply) = post("/validate", &body).await;
    assert_eq!(reply["response"]["allowed"], false);
}

#[tokio::test]
async fn validate_denies_undecodable_object() {
    let body = review("CREATE", json!({"onnx": {"storageUri": 42}}));
    let (_, reply) = post("/validate", &body).await;

    assert_eq!(reply["response"]["allowed"], false);
    assert!(reply.to_string().contains("failed to decode InferenceService"));
}
