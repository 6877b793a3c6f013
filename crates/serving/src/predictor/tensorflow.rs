//! TensorFlow Serving predictor

use super::{default_runtime_version, flag, serving_container, validate_gpu_runtime, Predictor};
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

pub const TENSORFLOW_ENTRYPOINT_COMMAND: &str = "/usr/bin/tensorflow_model_server";

/// TensorFlow Serving predictor specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct TensorflowSpec {
    /// Location of the SavedModel directory
    #[serde(rename = "storageUri")]
    pub storage_uri: String,

    /// TensorFlow Serving image tag; defaulted from the registry when empty
    #[serde(default, rename = "runtimeVersion", skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Predictor for TensorflowSpec {
    fn framework(&self) -> Framework {
        Framework::Tensorflow
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
        model_name: &str,
        _parallelism: i32,
        config: &InferenceServicesConfig,
    ) -> Container {
        let args = vec![
            flag("--port", INFERENCE_SERVICE_DEFAULT_GRPC_PORT),
            flag("--rest_api_port", INFERENCE_SERVICE_DEFAULT_HTTP_PORT),
            flag("--model_name", model_name),
            flag("--model_base_path", DEFAULT_MODEL_LOCAL_MOUNT_PATH),
        ];

        Container {
            command: Some(vec![TENSORFLOW_ENTRYPOINT_COMMAND.to_string()]),
            ..serving_container(
                config.predictor(self.framework()),
                &self.runtime_version,
                args,
                &self.resources,
            )
        }
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
        validate_gpu_runtime(self.framework(), &self.runtime_version, &self.resources)
    }
}
