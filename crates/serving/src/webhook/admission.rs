//! InferenceService Admission Handlers
//!
//! `/mutate` runs the predictor defaulting pass and answers with a JSON patch;
//! `/validate` runs predictor and object validation and denies with the
//! validation message. Both share the same registry and never touch the API
//! server.

use std::sync::Arc;

use axum::{extract::State, Json};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
};
use tracing::{debug, error, info, warn};

use super::WebhookState;
use crate::config::InferenceServicesConfig;
use crate::crds::InferenceService;
use crate::error::{Error, Result};

/// Decode the admitted object into the typed CRD
fn decode(object: &DynamicObject) -> Result<InferenceService> {
    let value = serde_json::to_value(object)?;
    Ok(serde_json::from_value(value)?)
}

/// JSON patch that brings `object` to its defaulted form.
///
/// The defaulted spec is merged onto the raw object before diffing so fields
/// this version of the CRD does not know about are carried through untouched.
pub fn defaulting_patch(
    object: &DynamicObject,
    config: &InferenceServicesConfig,
) -> Result<json_patch::Patch> {
    let original = serde_json::to_value(object)?;
    let mut isvc: InferenceService = serde_json::from_value(original.clone())?;
    isvc.apply_defaults(config);

    let mut defaulted = original.clone();
    if let Some(spec) = defaulted.get_mut("spec") {
        json_patch::merge(spec, &serde_json::to_value(&isvc.spec)?);
    }

    Ok(json_patch::diff(&original, &defaulted))
}

/// Handle mutating admission review for InferenceServices
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(mutate(&req, &state.config).into_review())
}

/// Handle validating admission review for InferenceServices
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(validate(&req, &state.config).into_review())
}

/// Default a single InferenceService admission request
pub fn mutate(
    request: &AdmissionRequest<DynamicObject>,
    config: &InferenceServicesConfig,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let Some(object) = admitted_object(request) else {
        return response;
    };

    let patch = match defaulting_patch(object, config) {
        Ok(patch) => patch,
        Err(e) => {
            warn!(uid = %request.uid, name = %request.name, error = %e, "Failed to default InferenceService");
            return response.deny(denial(&e));
        }
    };

    info!(
        uid = %request.uid,
        name = %request.name,
        patch_ops = patch.0.len(),
        "Defaulted InferenceService"
    );

    match response.clone().with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to serialize patch");
            response.deny(format!("patch serialization error: {e}"))
        }
    }
}

/// Validate a single InferenceService admission request.
///
/// Validation runs on the defaulted object so the outcome does not depend on
/// whether the mutating webhook ran first.
pub fn validate(
    request: &AdmissionRequest<DynamicObject>,
    config: &InferenceServicesConfig,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let Some(object) = admitted_object(request) else {
        return response;
    };

    match admit(object, config) {
        Ok(_) => {
            debug!(uid = %request.uid, name = %request.name, "InferenceService is valid");
            response
        }
        Err(e) if e.is_user_error() => {
            info!(uid = %request.uid, name = %request.name, reason = %e, "Rejected InferenceService");
            response.deny(denial(&e))
        }
        Err(e) => {
            error!(uid = %request.uid, name = %request.name, error = %e, "Failed to admit InferenceService");
            response.deny(denial(&e))
        }
    }
}

/// Decode, default and validate the admitted object
fn admit(object: &DynamicObject, config: &InferenceServicesConfig) -> Result<InferenceService> {
    let mut isvc = decode(object)?;
    isvc.apply_defaults(config);
    isvc.validate(config)?;
    Ok(isvc)
}

/// Message returned to the API client for a rejected object
fn denial(error: &Error) -> String {
    match error {
        Error::Serialization(e) => format!("failed to decode InferenceService: {e}"),
        other => other.to_string(),
    }
}

/// Object to admit, or `None` when there is nothing to default or validate
fn admitted_object(request: &AdmissionRequest<DynamicObject>) -> Option<&DynamicObject> {
    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        debug!(uid = %request.uid, operation = ?request.operation, "Nothing to admit");
        return None;
    }
    let object = request.object.as_ref();
    if object.is_none() {
        debug!(uid = %request.uid, "No object in request, allowing unchanged");
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use serde_json::json;

    fn object(predictor: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "serving.kubeflow.org/v1alpha2",
            "kind": "InferenceService",
            "metadata": {"name": "flowers", "namespace": "default"},
            "spec": {
                "default": {"predictor": predictor},
                "transformer": {"custom": {"image": "example/transformer"}}
            }
        }))
        .unwrap()
    }

    fn ops(patch: &json_patch::Patch) -> Vec<serde_json::Value> {
        serde_json::from_value(serde_json::to_value(patch).unwrap()).unwrap()
    }

    #[test]
    fn patch_adds_runtime_version_and_resources() {
        let config = test_config();
        let obj = object(json!({"torchserve": {"storageUri": "gs://models/mnist"}}));

        let patch = defaulting_patch(&obj, &config).unwrap();
        let ops = ops(&patch);

        assert!(ops.contains(&json!({
            "op": "add",
            "path": "/spec/default/predictor/torchserve/runtimeVersion",
            "value": "0.4"
        })));
        assert!(ops.iter().any(|op| op["path"]
            .as_str()
            .is_some_and(|path| path.starts_with("/spec/default/predictor/torchserve/resources"))));
    }

    #[test]
    fn patch_never_removes_unknown_fields() {
        let config = test_config();
        let obj = object(json!({"sklearn": {"storageUri": "gs://models/iris"}}));

        let patch = defaulting_patch(&obj, &config).unwrap();
        assert!(ops(&patch).iter().all(|op| op["op"] != "remove"));
    }

    #[test]
    fn defaulted_object_produces_empty_patch() {
        let config = test_config();
        let obj = object(json!({"torchserve": {
            "storageUri": "gs://models/mnist",
            "runtimeVersion": "0.4",
            "resources": {
                "requests": {"cpu": "1", "memory": "2Gi"},
                "limits": {"cpu": "1", "memory": "2Gi"}
            }
        }}));

        let patch = defaulting_patch(&obj, &config).unwrap();
        assert!(patch.0.is_empty());
    }

    #[test]
    fn admit_reports_rejections_as_user_errors() {
        let config = test_config();

        let mismatched = object(json!({"torchserve": {
            "storageUri": "gs://models/mnist",
            "runtimeVersion": "0.4-gpu"
        }}));
        let err = admit(&mismatched, &config).unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(
            denial(&err),
            "TorchServe RuntimeVersion is GPU enabled but GPU resources are not requested."
        );

        let malformed = object(json!({"onnx": {"storageUri": 42}}));
        let err = admit(&malformed, &config).unwrap_err();
        assert!(err.is_user_error());
        assert!(denial(&err).starts_with("failed to decode InferenceService: "));
    }

    #[test]
    fn admit_returns_the_defaulted_object() {
        let config = test_config();
        let obj = object(json!({"sklearn": {"storageUri": "gs://models/iris"}}));

        let isvc = admit(&obj, &config).unwrap();
        let sklearn = isvc.spec.default.predictor.sklearn.unwrap();
        assert_eq!(sklearn.runtime_version, "v0.4.0");
    }

    #[test]
    fn undecodable_object_is_an_error() {
        let config = test_config();
        let obj = object(json!({"torchserve": {"runtimeVersion": 4}}));
        assert!(defaulting_patch(&obj, &config).is_err());
    }
}
