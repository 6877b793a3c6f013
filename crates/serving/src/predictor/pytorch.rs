//! PyTorch predictor served by the python model server

use super::{default_runtime_version, flag, serving_container, validate_gpu_runtime, Predictor};
use crate::config::{Framework, InferenceServicesConfig};
use crate::constants::{
    ARGUMENT_HTTP_PORT, ARGUMENT_MODEL_CLASS_NAME, ARGUMENT_MODEL_DIR, ARGUMENT_MODEL_NAME,
    ARGUMENT_WORKERS, DEFAULT_MODEL_LOCAL_MOUNT_PATH, INFERENCE_SERVICE_DEFAULT_HTTP_PORT,
};
use crate::error::ValidationError;
use crate::resources::{is_gpu_enabled, set_resource_requirement_defaults};
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Class the server instantiates when `modelClassName` is unset
pub const DEFAULT_PYTORCH_MODEL_CLASS_NAME: &str = "PyTorchModel";

/// PyTorch predictor specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PyTorchSpec {
    /// Location of the model state dict and `model.py`
    #[serde(rename = "storageUri")]
    pub storage_uri: String,

    /// Python class defined in `model.py` that holds the network
    #[serde(default, rename = "modelClassName", skip_serializing_if = "String::is_empty")]
    pub model_class_name: String,

    #[serde(default, rename = "runtimeVersion", skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Predictor for PyTorchSpec {
    fn framework(&self) -> Framework {
        Framework::PyTorch
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
        parallelism: i32,
        config: &InferenceServicesConfig,
    ) -> Container {
        let mut args = vec![
            flag(ARGUMENT_MODEL_NAME, model_name),
            flag(ARGUMENT_MODEL_CLASS_NAME, &self.model_class_name),
            flag(ARGUMENT_MODEL_DIR, DEFAULT_MODEL_LOCAL_MOUNT_PATH),
            flag(ARGUMENT_HTTP_PORT, INFERENCE_SERVICE_DEFAULT_HTTP_PORT),
        ];
        // a single worker owns the GPU
        if is_gpu_enabled(&self.resources) {
            args.push(flag(ARGUMENT_WORKERS, 1));
        } else if parallelism != 0 {
            args.push(flag(ARGUMENT_WORKERS, parallelism));
        }

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
        if self.model_class_name.is_empty() {
            self.model_class_name = DEFAULT_PYTORCH_MODEL_CLASS_NAME.to_string();
        }
        set_resource_requirement_defaults(&mut self.resources);
    }

    fn validate(&self, _config: &InferenceServicesConfig) -> Result<(), ValidationError> {
        validate_gpu_runtime(self.framework(), &self.runtime_version, &self.resources)
    }
}
