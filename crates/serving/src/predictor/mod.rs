//! Predictor Trait System
//!
//! Every serving framework implements [`Predictor`]. Callers hold a
//! `&dyn Predictor` picked out of the `InferenceService` and never branch on
//! the framework: defaulting, validation and container assembly all go
//! through the trait.

use crate::config::{Framework, InferenceServicesConfig, PredictorConfig};
use crate::constants::{GPU_IMAGE_SUFFIX, INFERENCE_SERVICE_CONTAINER_NAME};
use crate::error::ValidationError;
use crate::resources::is_gpu_enabled;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use std::fmt::Debug;
use tracing::{debug, instrument};

pub mod onnx;
pub mod pytorch;
pub mod sklearn;
pub mod tensorflow;
pub mod torchserve;
pub mod triton;
pub mod xgboost;

pub use onnx::ONNXSpec;
pub use pytorch::PyTorchSpec;
pub use sklearn::SKLearnSpec;
pub use tensorflow::TensorflowSpec;
pub use torchserve::TorchServeSpec;
pub use triton::TritonSpec;
pub use xgboost::XGBoostSpec;

/// Framework-specific serving contract
pub trait Predictor: Send + Sync + Debug {
    /// Registry key of the framework this predictor serves with
    fn framework(&self) -> Framework;

    /// Location of the model artifacts, returned verbatim
    fn get_storage_uri(&self) -> &str;

    /// Live view of the predictor's resource requirements
    fn get_resource_requirements(&self) -> &ResourceRequirements;

    /// Mutable access to the predictor's resource requirements
    fn get_resource_requirements_mut(&mut self) -> &mut ResourceRequirements;

    /// Build the serving container.
    ///
    /// Pure: depends only on the predictor fields, the parameters and the
    /// registry. Call after `apply_defaults` so the image tag is
    /// populated.
    fn get_container(
        &self,
        model_name: &str,
        parallelism: i32,
        config: &InferenceServicesConfig,
    ) -> Container;

    /// Fill unset fields with framework-aware defaults. Idempotent.
    fn apply_defaults(&mut self, config: &InferenceServicesConfig);

    /// Check framework-specific invariants without mutating the predictor
    fn validate(&self, config: &InferenceServicesConfig) -> Result<(), ValidationError>;
}

/// Default, validate and build the container for a predictor in one go.
///
/// This is the admission/reconcile sequence: the predictor is defaulted in place,
/// so the caller sees the same values the container was built from.
#[instrument(skip(predictor, config), fields(framework = %predictor.framework()))]
pub fn compile(
    predictor: &mut dyn Predictor,
    model_name: &str,
    parallelism: i32,
    config: &InferenceServicesConfig,
) -> Result<Container, ValidationError> {
    predictor.apply_defaults(config);
    predictor.validate(config)?;
    let container = predictor.get_container(model_name, parallelism, config);
    debug!(image = ?container.image, "Compiled predictor container");
    Ok(container)
}

/// Set `runtime_version` from the registry when it is empty.
pub(crate) fn default_runtime_version(
    framework: Framework,
    runtime_version: &mut String,
    resources: &ResourceRequirements,
    entry: &PredictorConfig,
) {
    if !runtime_version.is_empty() {
        return;
    }

    let gpu = is_gpu_enabled(resources);
    *runtime_version = entry.default_version(gpu).to_string();
    debug!(
        framework = %framework.key(),
        gpu,
        runtime_version = %runtime_version,
        "Defaulted predictor runtime version"
    );
}

/// GPU resources and the `-gpu` image tag convention must agree.
pub(crate) fn validate_gpu_runtime(
    framework: Framework,
    runtime_version: &str,
    resources: &ResourceRequirements,
) -> Result<(), ValidationError> {
    let gpu_requested = is_gpu_enabled(resources);
    let gpu_tagged = runtime_version.contains(GPU_IMAGE_SUFFIX);

    match (gpu_requested, gpu_tagged) {
        (true, false) => Err(ValidationError::RuntimeIncludesGpu { framework }),
        (false, true) => Err(ValidationError::RuntimeExcludesGpu { framework }),
        _ => Ok(()),
    }
}

/// `--flag=value`
pub(crate) fn flag(name: &str, value: impl std::fmt::Display) -> String {
    format!("{name}={value}")
}

/// The serving container with the fields every framework shares.
pub(crate) fn serving_container(
    entry: &PredictorConfig,
    runtime_version: &str,
    args: Vec<String>,
    resources: &ResourceRequirements,
) -> Container {
    Container {
        name: INFERENCE_SERVICE_CONTAINER_NAME.to_string(),
        image: Some(format!("{}:{}", entry.container_image, runtime_version)),
        args: Some(args),
        resources: Some(resources.clone()),
        ..Default::default()
    }
}
