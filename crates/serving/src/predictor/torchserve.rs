//! TorchServe predictor
//!
//! Runs the `torchserve` launcher against a model store and a serving
//! properties file, both laid out under the model mount by the storage
//! initializer.

use super::{default_runtime_version, flag, serving_container, validate_gpu_runtime, Predictor};
use crate::config::{Framework, InferenceServicesConfig};
use crate::constants::DEFAULT_MODEL_LOCAL_MOUNT_PATH;
use crate::error::ValidationError;
use crate::resources::set_resource_requirement_defaults;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// TorchServe predictor specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct TorchServeSpec {
    /// Location of the model archive store and config
    #[serde(rename = "storageUri")]
    pub storage_uri: String,

    /// TorchServe image tag; defaulted from the registry when empty
    #[serde(default, rename = "runtimeVersion", skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,

    /// Compute resources for the serving container
    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Predictor for TorchServeSpec {
    fn framework(&self) -> Framework {
        Framework::TorchServe
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
        // No --workers flag: TorchServe sizes its worker pool from config.properties
        let args = vec![
            "torchserve".to_string(),
            "--start".to_string(),
            flag(
                "--model-store",
                format!("{DEFAULT_MODEL_LOCAL_MOUNT_PATH}/model-store"),
            ),
            flag(
                "--ts-config",
                format!("{DEFAULT_MODEL_LOCAL_MOUNT_PATH}/config/config.properties"),
            ),
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
        validate_gpu_runtime(self.framework(), &self.runtime_version, &self.resources)
    }
}
