//! XGBoost predictor served by the python model server

use super::{default_runtime_version, flag, serving_container, Predictor};
use crate::config::{Framework, InferenceServicesConfig};
use crate::constants::{
    ARGUMENT_HTTP_PORT, ARGUMENT_MODEL_DIR, ARGUMENT_MODEL_NAME, ARGUMENT_WORKERS,
    DEFAULT_MODEL_LOCAL_MOUNT_PATH, INFERENCE_SERVICE_DEFAULT_HTTP_PORT,
};
use crate::error::ValidationError;
use crate::resources::set_resource_requirement_defaults;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const ARGUMENT_NTHREAD: &str = "--nthread";

/// XGBoost predictor specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct XGBoostSpec {
    /// Location of the saved booster
    #[serde(rename = "storageUri")]
    pub storage_uri: String,

    /// Number of threads the booster uses for prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nthread: Option<i32>,

    #[serde(default, rename = "runtimeVersion", skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Predictor for XGBoostSpec {
    fn framework(&self) -> Framework {
        Framework::XGBoost
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
            flag(ARGUMENT_MODEL_DIR, DEFAULT_MODEL_LOCAL_MOUNT_PATH),
            flag(ARGUMENT_HTTP_PORT, INFERENCE_SERVICE_DEFAULT_HTTP_PORT),
        ];
        if let Some(nthread) = self.nthread.filter(|n| *n != 0) {
            args.push(flag(ARGUMENT_NTHREAD, nthread));
        }
        if parallelism != 0 {
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
        set_resource_requirement_defaults(&mut self.resources);
    }

    fn validate(&self, _config: &InferenceServicesConfig) -> Result<(), ValidationError> {
        Ok(())
    }
}
