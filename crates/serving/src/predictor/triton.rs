//! NVIDIA Triton inference server predictor
//!
//! Triton only ships GPU builds, so there is no `-gpu` tag convention to
//! enforce and no separate GPU default.

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

/// Triton predictor specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct TritonSpec {
    /// Location of the Triton model repository
    #[serde(rename = "storageUri")]
    pub storage_uri: String,

    #[serde(default, rename = "runtimeVersion", skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Predictor for TritonSpec {
    fn framework(&self) -> Framework {
        Framework::Triton
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
            "trtserver".to_string(),
            flag("--model-store", DEFAULT_MODEL_LOCAL_MOUNT_PATH),
            flag("--allow-poll-model-repository", false),
            flag("--allow-grpc", true),
            flag("--allow-http", true),
            flag("--grpc-port", INFERENCE_SERVICE_DEFAULT_GRPC_PORT),
            flag("--http-port", INFERENCE_SERVICE_DEFAULT_HTTP_PORT),
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
        Ok(())
    }
}
