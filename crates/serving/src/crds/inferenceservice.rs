//! `InferenceService` Custom Resource Definition

use crate::config::{Framework, InferenceServicesConfig};
use crate::error::ValidationError;
use crate::predictor::{
    Predictor, ONNXSpec, PyTorchSpec, SKLearnSpec, TensorflowSpec, TorchServeSpec, TritonSpec,
    XGBoostSpec,
};
use k8s_openapi::api::core::v1::Container;
use kube::{CustomResource, ResourceExt};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, instrument};

/// DNS-1035 label, the format Knative requires for service names
const DNS1035_LABEL_FMT: &str = "^[a-z]([-a-z0-9]*[a-z0-9])?$";

fn dns1035_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DNS1035_LABEL_FMT).expect("DNS-1035 pattern is valid"))
}

/// `InferenceService` CRD: serve a model behind a default and an optional canary endpoint
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "serving.kubeflow.org",
    version = "v1alpha2",
    kind = "InferenceService"
)]
#[kube(namespaced)]
#[kube(status = "InferenceServiceStatus")]
#[kube(derive = "PartialEq")]
#[kube(shortname = "isvc")]
#[kube(printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.url"}"#)]
#[kube(printcolumn = r#"{"name":"Default Traffic","type":"integer","jsonPath":".status.traffic"}"#)]
#[kube(printcolumn = r#"{"name":"Canary Traffic","type":"integer","jsonPath":".status.canaryTraffic"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct InferenceServiceSpec {
    /// Endpoint receiving the remainder of the traffic
    pub default: EndpointSpec,

    /// Optional endpoint for rolling out a new model version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<EndpointSpec>,

    /// Percentage of traffic routed to the canary endpoint
    #[serde(
        default,
        rename = "canaryTrafficPercent",
        skip_serializing_if = "Option::is_none"
    )]
    pub canary_traffic_percent: Option<i32>,
}

/// One serving endpoint of an `InferenceService`
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct EndpointSpec {
    pub predictor: PredictorSpec,
}

/// Predictor block: exactly one framework field must be set
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PredictorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensorflow: Option<TensorflowSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torchserve: Option<TorchServeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pytorch: Option<PyTorchSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sklearn: Option<SKLearnSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xgboost: Option<XGBoostSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onnx: Option<ONNXSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triton: Option<TritonSpec>,

    #[serde(flatten)]
    pub deployment: DeploymentSpec,
}

/// Deployment knobs shared by every framework
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct DeploymentSpec {
    /// `ServiceAccount` used to pull model artifacts
    #[serde(
        default,
        rename = "serviceAccountName",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_account_name: Option<String>,

    /// Concurrent requests each replica should handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i32>,

    #[serde(default, rename = "minReplicas", skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    #[serde(default, rename = "maxReplicas", skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
}

/// Status of the `InferenceService`
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct InferenceServiceStatus {
    /// URL the service is reachable at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Percentage of traffic served by the default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<i32>,

    /// Percentage of traffic served by the canary endpoint
    #[serde(default, rename = "canaryTraffic", skip_serializing_if = "Option::is_none")]
    pub canary_traffic: Option<i32>,
}

/// Serving containers compiled for each endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledEndpoints {
    pub default: Container,
    pub canary: Option<Container>,
}

fn framework_list() -> String {
    Framework::ALL
        .iter()
        .map(|framework| framework.key())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PredictorSpec {
    /// Every populated framework field
    fn predictors(&self) -> Vec<&dyn Predictor> {
        [
            self.tensorflow.as_ref().map(|p| p as &dyn Predictor),
            self.torchserve.as_ref().map(|p| p as &dyn Predictor),
            self.pytorch.as_ref().map(|p| p as &dyn Predictor),
            self.sklearn.as_ref().map(|p| p as &dyn Predictor),
            self.xgboost.as_ref().map(|p| p as &dyn Predictor),
            self.onnx.as_ref().map(|p| p as &dyn Predictor),
            self.triton.as_ref().map(|p| p as &dyn Predictor),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn predictors_mut(&mut self) -> Vec<&mut dyn Predictor> {
        let Self {
            tensorflow,
            torchserve,
            pytorch,
            sklearn,
            xgboost,
            onnx,
            triton,
            deployment: _,
        } = self;

        [
            tensorflow.as_mut().map(|p| p as &mut dyn Predictor),
            torchserve.as_mut().map(|p| p as &mut dyn Predictor),
            pytorch.as_mut().map(|p| p as &mut dyn Predictor),
            sklearn.as_mut().map(|p| p as &mut dyn Predictor),
            xgboost.as_mut().map(|p| p as &mut dyn Predictor),
            onnx.as_mut().map(|p| p as &mut dyn Predictor),
            triton.as_mut().map(|p| p as &mut dyn Predictor),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn exactly_one<P>(
        mut predictors: Vec<P>,
        framework: impl Fn(&P) -> Framework,
    ) -> Result<P, ValidationError> {
        match predictors.len() {
            1 => Ok(predictors.remove(0)),
            0 => Err(ValidationError::NoPredictor {
                frameworks: framework_list(),
            }),
            _ => Err(ValidationError::MultiplePredictors {
                frameworks: framework_list(),
                specified: predictors
                    .iter()
                    .map(|p| framework(p).key())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// The single populated predictor
    pub fn get_predictor(&self) -> Result<&dyn Predictor, ValidationError> {
        Self::exactly_one(self.predictors(), |p| p.framework())
    }

    /// The single populated predictor, mutably
    pub fn get_predictor_mut(&mut self) -> Result<&mut dyn Predictor, ValidationError> {
        Self::exactly_one(self.predictors_mut(), |p| p.framework())
    }

    /// Default the populated predictor. A malformed block is left for
    /// `validate` to reject.
    pub fn apply_defaults(&mut self, config: &InferenceServicesConfig) {
        if let Ok(predictor) = self.get_predictor_mut() {
            predictor.apply_defaults(config);
        }
    }

    pub fn validate(&self, config: &InferenceServicesConfig) -> Result<(), ValidationError> {
        self.get_predictor()?.validate(config)?;
        self.deployment.validate()
    }

    /// Build the serving container, validating first
    pub fn get_container(
        &self,
        model_name: &str,
        config: &InferenceServicesConfig,
    ) -> Result<Container, ValidationError> {
        self.validate(config)?;
        let parallelism = self.deployment.parallelism.unwrap_or(0);
        Ok(self
            .get_predictor()?
            .get_container(model_name, parallelism, config))
    }
}

impl DeploymentSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(parallelism) = self.parallelism.filter(|p| *p < 0) {
            return Err(ValidationError::InvalidParallelism(parallelism));
        }

        let min = self.min_replicas.unwrap_or(0);
        let max = self.max_replicas.unwrap_or(0);
        if min < 0 {
            return Err(ValidationError::InvalidReplicas(
                "MinReplicas cannot be less than 0.".to_string(),
            ));
        }
        if max < 0 {
            return Err(ValidationError::InvalidReplicas(
                "MaxReplicas cannot be less than 0.".to_string(),
            ));
        }
        // maxReplicas of 0 means "no upper bound"
        if max != 0 && min > max {
            return Err(ValidationError::InvalidReplicas(
                "MinReplicas cannot be greater than MaxReplicas.".to_string(),
            ));
        }
        Ok(())
    }
}

impl EndpointSpec {
    pub fn apply_defaults(&mut self, config: &InferenceServicesConfig) {
        self.predictor.apply_defaults(config);
    }

    pub fn validate(&self, config: &InferenceServicesConfig) -> Result<(), ValidationError> {
        self.predictor.validate(config)
    }
}

impl InferenceService {
    /// Default every endpoint's predictor in place
    #[instrument(skip(self, config), fields(name = %self.name_any()))]
    pub fn apply_defaults(&mut self, config: &InferenceServicesConfig) {
        self.spec.default.apply_defaults(config);
        if let Some(canary) = self.spec.canary.as_mut() {
            canary.apply_defaults(config);
        }
        debug!("Applied InferenceService defaults");
    }

    /// Check object-level invariants and every endpoint's predictor
    pub fn validate(&self, config: &InferenceServicesConfig) -> Result<(), ValidationError> {
        let name = self.name_any();
        if !dns1035_label().is_match(&name) {
            return Err(ValidationError::InvalidName { name });
        }

        if let Some(percent) = self.spec.canary_traffic_percent {
            if !(0..=100).contains(&percent) {
                return Err(ValidationError::InvalidCanaryTrafficPercent(percent));
            }
            if self.spec.canary.is_none() && percent != 0 {
                return Err(ValidationError::CanaryTrafficWithoutCanary);
            }
        }

        self.spec.default.validate(config)?;
        if let Some(canary) = &self.spec.canary {
            canary.validate(config)?;
        }
        Ok(())
    }

    /// Default, validate and build the containers for every endpoint.
    ///
    /// The model name passed to the servers is the object's name.
    pub fn compile(
        &mut self,
        config: &InferenceServicesConfig,
    ) -> Result<CompiledEndpoints, ValidationError> {
        self.apply_defaults(config);
        self.validate(config)?;

        let name = self.name_any();
        let default = self.spec.default.predictor.get_container(&name, config)?;
        let canary = self
            .spec
            .canary
            .as_ref()
            .map(|canary| canary.predictor.get_container(&name, config))
            .transpose()?;

        Ok(CompiledEndpoints { default, canary })
    }
}
