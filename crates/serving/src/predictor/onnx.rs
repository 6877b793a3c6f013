//! ONNX Runtime server predictor

use super::{default_runtime_version, flag, serving_container, Predictor};
use crate::config::{Framework, InferenceServicesConfig};
use crate::constants::{
    DEFAULT_MODEL_LOCAL_MOUNT_PATH, INFERENCE_SERVICE_DEFAULT_GRPC_PORT,
    INFERENCE_SERVICE_DEFAULT_HTTP_PORT,
};
use crate::error::ValidationError;
use crate::resources::set_resource_requirement_defaults;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name the storage initializer gives the downloaded model
pub const ONNX_MODEL_FILE_NAME: &str = "model.onnx";

pub const ONNX_FILE_EXTENSION: &str = ".onnx";

/// ONNX predictor specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ONNXSpec {
    /// Location of the `.onnx` model file
    #[serde(rename = "storageUri")]
    pub storage_uri: String,

    #[serde(default, rename = "runtimeVersion", skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Predictor for ONNXSpec {
    fn framework(&self) -> Framework {
        Framework::ONNX
    }

    fn get_storage_uri(&self) -> &str {
        &self.storage_uri
    }

    fn get_resource_requirements(&self) -> &ResourceRequirements {
        &self.resources
    }

    fn get_resource_requirements_mut(&mut self) -> &mut ResourceRequirements {
        &mut self.resources
    }

    fn get_container(
        &self,
        _model_name: &str,
        _parallelism: i32,
        config: &InferenceServicesConfig,
    ) -> Container {
        let args = vec![
            flag(
                "--model_path",
                format!("{DEFAULT_MODEL_LOCAL_MOUNT_PATH}/{ONNX_MODEL_FILE_NAME}"),
            ),
            flag("--http_port", INFERENCE_SERVICE_DEFAULT_HTTP_PORT),
            flag("--grpc_port", INFERENCE_SERVICE_DEFAULT_GRPC_PORT),
        ];

        serving_container(
            config.predictor(self.framework()),
            &self.runtime_version,
            args,
            &self.resources,
        )
    }

    fn apply_defaults(&mut self, config: &InferenceServicesConfig) {
        let framework = self.framework();
        default_runtime_version(
            framework,
            &mut self.runtime_version,
            &self.resources,
            config.predictor(framework),
        );
        set_resource_requirement_defaults(&mut self.resources);
    }

    fn validate(&self, _config: &InferenceServicesConfig) -> Result<(), ValidationError> {
        let extension = Path::new(&self.storage_uri)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        if extension != ONNX_FILE_EXTENSION {
            return Err(ValidationError::InvalidStorageUriExtension {
                expected: ONNX_FILE_EXTENSION.to_string(),
                actual: extension,
            });
        }
        Ok(())
    }
}
