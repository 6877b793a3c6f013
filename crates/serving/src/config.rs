//! Framework Config Registry
//!
//! Maps every supported serving framework to its image repository and default
//! image tags. The registry is loaded once at startup (from a mounted
//! `ConfigMap` file or straight from the cluster), validated, and then shared
//! read-only by every predictor operation.

use crate::constants::{INFERENCE_SERVICE_CONFIG_MAP_NAME, PREDICTOR_CONFIG_KEY_NAME};
use crate::error::ConfigurationError;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::Api, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Supported serving frameworks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// TensorFlow Serving
    Tensorflow,
    /// TorchServe (the `torchserve` launcher with a model store)
    TorchServe,
    /// Python PyTorch model server
    PyTorch,
    /// Python scikit-learn model server
    SKLearn,
    /// Python XGBoost model server
    XGBoost,
    /// ONNX Runtime server
    ONNX,
    /// NVIDIA Triton inference server
    Triton,
}

impl Framework {
    /// Every framework, in the order they appear in `PredictorSpec`
    pub const ALL: [Framework; 7] = [
        Framework::Tensorflow,
        Framework::TorchServe,
        Framework::PyTorch,
        Framework::SKLearn,
        Framework::XGBoost,
        Framework::ONNX,
        Framework::Triton,
    ];

    /// Registry and CRD key for this framework
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Framework::Tensorflow => "tensorflow",
            Framework::TorchServe => "torchserve",
            Framework::PyTorch => "pytorch",
            Framework::SKLearn => "sklearn",
            Framework::XGBoost => "xgboost",
            Framework::ONNX => "onnx",
            Framework::Triton => "triton",
        }
    }

    /// Whether the framework publishes separate GPU images tagged with `-gpu`
    #[must_use]
    pub fn has_gpu_images(self) -> bool {
        matches!(
            self,
            Framework::Tensorflow | Framework::TorchServe | Framework::PyTorch
        )
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Tensorflow => write!(f, "Tensorflow"),
            Framework::TorchServe => write!(f, "TorchServe"),
            Framework::PyTorch => write!(f, "PyTorch"),
            Framework::SKLearn => write!(f, "SKLearn"),
            Framework::XGBoost => write!(f, "XGBoost"),
            Framework::ONNX => write!(f, "ONNX"),
            Framework::Triton => write!(f, "Triton"),
        }
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Framework::ALL
            .into_iter()
            .find(|framework| framework.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported framework '{s}'"))
    }
}

/// Image configuration for one framework
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredictorConfig {
    /// Image repository without tag (e.g. "pytorch/torchserve")
    #[serde(rename = "image")]
    pub container_image: String,

    /// Tag used when the predictor leaves `runtimeVersion` empty
    #[serde(rename = "defaultImageVersion")]
    pub default_image_version: String,

    /// Tag used instead when the predictor requests GPU resources
    #[serde(default, rename = "defaultGpuImageVersion")]
    pub default_gpu_image_version: String,
}

impl PredictorConfig {
    /// Pick the default tag for a predictor, honoring GPU images when present
    #[must_use]
    pub fn default_version(&self, gpu: bool) -> &str {
        if gpu && !self.default_gpu_image_version.is_empty() {
            &self.default_gpu_image_version
        } else {
            &self.default_image_version
        }
    }
}

/// Per-framework predictor configuration.
///
/// One field per framework so that a lookup can never miss; a table missing a
/// framework is rejected while deserializing instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    try_from = "BTreeMap<String, PredictorConfig>",
    into = "BTreeMap<String, PredictorConfig>"
)]
pub struct PredictorsConfig {
    pub tensorflow: PredictorConfig,
    pub torchserve: PredictorConfig,
    pub pytorch: PredictorConfig,
    pub sklearn: PredictorConfig,
    pub xgboost: PredictorConfig,
    pub onnx: PredictorConfig,
    pub triton: PredictorConfig,
}

impl PredictorsConfig {
    #[must_use]
    pub fn get(&self, framework: Framework) -> &PredictorConfig {
        match framework {
            Framework::Tensorflow => &self.tensorflow,
            Framework::TorchServe => &self.torchserve,
            Framework::PyTorch => &self.pytorch,
            Framework::SKLearn => &self.sklearn,
            Framework::XGBoost => &self.xgboost,
            Framework::ONNX => &self.onnx,
            Framework::Triton => &self.triton,
        }
    }
}

impl TryFrom<BTreeMap<String, PredictorConfig>> for PredictorsConfig {
    type Error = ConfigurationError;

    fn try_from(mut table: BTreeMap<String, PredictorConfig>) -> Result<Self, Self::Error> {
        let mut take = |framework: Framework| {
            table
                .remove(framework.key())
                .ok_or(ConfigurationError::MissingFramework { framework })
        };

        let predictors = Self {
            tensorflow: take(Framework::Tensorflow)?,
            torchserve: take(Framework::TorchServe)?,
            pytorch: take(Framework::PyTorch)?,
            sklearn: take(Framework::SKLearn)?,
            xgboost: take(Framework::XGBoost)?,
            onnx: take(Framework::ONNX)?,
            triton: take(Framework::Triton)?,
        };

        for unknown in table.keys() {
            warn!(framework = %unknown, "Ignoring configuration for unsupported framework");
        }

        Ok(predictors)
    }
}

impl From<PredictorsConfig> for BTreeMap<String, PredictorConfig> {
    fn from(predictors: PredictorsConfig) -> Self {
        Framework::ALL
            .into_iter()
            .map(|framework| {
                (
                    framework.key().to_string(),
                    predictors.get(framework).clone(),
                )
            })
            .collect()
    }
}

/// Process-wide serving configuration, built once and shared read-only.
///
/// Every way of obtaining one goes through [`InferenceServicesConfig::new`],
/// deserialization included, so an instance always carries usable defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "RawInferenceServicesConfig")]
pub struct InferenceServicesConfig {
    predictors: PredictorsConfig,
}

/// Unvalidated wire form of [`InferenceServicesConfig`]
#[derive(Deserialize)]
struct RawInferenceServicesConfig {
    predictors: PredictorsConfig,
}

impl TryFrom<RawInferenceServicesConfig> for InferenceServicesConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawInferenceServicesConfig) -> Result<Self, Self::Error> {
        Self::new(raw.predictors)
    }
}

impl InferenceServicesConfig {
    /// Build a registry from an already-parsed predictor table, validating it
    pub fn new(predictors: PredictorsConfig) -> Result<Self, ConfigurationError> {
        let config = Self { predictors };
        config.validate()?;
        Ok(config)
    }

    /// The full per-framework table
    #[must_use]
    pub fn predictors(&self) -> &PredictorsConfig {
        &self.predictors
    }

    /// Parse a JSON `predictors` table
    pub fn from_json(s: &str) -> Result<Self, ConfigurationError> {
        let table: BTreeMap<String, PredictorConfig> =
            serde_json::from_str(s).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::new(PredictorsConfig::try_from(table)?)
    }

    /// Parse a YAML `predictors` table. JSON is accepted since it is valid YAML.
    pub fn from_yaml(s: &str) -> Result<Self, ConfigurationError> {
        let table: BTreeMap<String, PredictorConfig> =
            serde_yaml::from_str(s).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::new(PredictorsConfig::try_from(table)?)
    }

    /// Configuration for a framework; total by construction
    #[must_use]
    pub fn predictor(&self, framework: Framework) -> &PredictorConfig {
        self.predictors.get(framework)
    }

    /// Check that every framework carries the values defaulting relies on
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for framework in Framework::ALL {
            let entry = self.predictor(framework);

            if entry.container_image.trim().is_empty() {
                return Err(ConfigurationError::MissingDefault {
                    framework,
                    field: "image",
                });
            }
            if entry.default_image_version.trim().is_empty() {
                return Err(ConfigurationError::MissingDefault {
                    framework,
                    field: "defaultImageVersion",
                });
            }
            if framework.has_gpu_images() && entry.default_gpu_image_version.trim().is_empty() {
                return Err(ConfigurationError::MissingDefault {
                    framework,
                    field: "defaultGpuImageVersion",
                });
            }
        }
        Ok(())
    }

    /// Load configuration from a mounted `ConfigMap` key file (JSON or YAML)
    pub fn from_mounted_file(config_path: &str) -> Result<Self, ConfigurationError> {
        let config_str =
            std::fs::read_to_string(config_path).map_err(|source| ConfigurationError::Io {
                path: config_path.to_string(),
                source,
            })?;

        let config: Self = config_str.parse()?;
        info!("Loaded predictor configuration from {}", config_path);
        Ok(config)
    }

    /// Load configuration from the data of an already-fetched `ConfigMap`
    pub fn from_configmap_data(cm: &ConfigMap) -> Result<Self, ConfigurationError> {
        let predictors = cm
            .data
            .as_ref()
            .and_then(|data| data.get(PREDICTOR_CONFIG_KEY_NAME))
            .ok_or_else(|| ConfigurationError::MissingKey {
                key: PREDICTOR_CONFIG_KEY_NAME.to_string(),
            })?;

        predictors.parse()
    }

    /// Load configuration from a `ConfigMap` through the API server
    pub async fn from_configmap(
        client: &Client,
        namespace: &str,
        name: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.unwrap_or(INFERENCE_SERVICE_CONFIG_MAP_NAME);
        debug!(namespace = %namespace, name = %name, "Fetching predictor configuration ConfigMap");

        let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
        let cm = api.get(name).await?;

        let config = Self::from_configmap_data(&cm)?;
        info!("Loaded predictor configuration from ConfigMap {}/{}", namespace, name);
        Ok(config)
    }
}

impl FromStr for InferenceServicesConfig {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PREDICTORS_JSON: &str = r#"{
        "tensorflow": {
            "image": "tensorflow/serving",
            "defaultImageVersion": "1.14.0",
            "defaultGpuImageVersion": "1.14.0-gpu"
        },
        "torchserve": {
            "image": "pytorch/torchserve",
            "defaultImageVersion": "0.4",
            "defaultGpuImageVersion": "0.4-gpu"
        },
        "pytorch": {
            "image": "gcr.io/kfserving/pytorchserver",
            "defaultImageVersion": "v0.4.0",
            "defaultGpuImageVersion": "v0.4.0-gpu"
        },
        "sklearn": {
            "image": "gcr.io/kfserving/sklearnserver",
            "defaultImageVersion": "v0.4.0"
        },
        "xgboost": {
            "image": "gcr.io/kfserving/xgbserver",
            "defaultImageVersion": "v0.4.0"
        },
        "onnx": {
            "image": "mcr.microsoft.com/onnxruntime/server",
            "defaultImageVersion": "v1.0.0"
        },
        "triton": {
            "image": "nvcr.io/nvidia/tritonserver",
            "defaultImageVersion": "19.10-py3"
        }
    }"#;

    pub(crate) fn test_config() -> InferenceServicesConfig {
        PREDICTORS_JSON.parse().expect("fixture config should parse")
    }

    #[test]
    fn parses_every_framework() {
        let config = test_config();
        assert_eq!(
            config.predictor(Framework::TorchServe).container_image,
            "pytorch/torchserve"
        );
        assert_eq!(
            config.predictor(Framework::TorchServe).default_gpu_image_version,
            "0.4-gpu"
        );
        assert_eq!(
            config.predictor(Framework::SKLearn).default_gpu_image_version,
            ""
        );
    }

    #[test]
    fn yaml_tables_are_accepted() {
        let yaml = r"
tensorflow: {image: tf, defaultImageVersion: '1', defaultGpuImageVersion: 1-gpu}
torchserve: {image: ts, defaultImageVersion: '0.4', defaultGpuImageVersion: 0.4-gpu}
pytorch: {image: pt, defaultImageVersion: v1, defaultGpuImageVersion: v1-gpu}
sklearn: {image: sk, defaultImageVersion: v1}
xgboost: {image: xgb, defaultImageVersion: v1}
onnx: {image: onnx, defaultImageVersion: v1}
triton: {image: triton, defaultImageVersion: '20.03'}
";
        let config: InferenceServicesConfig = yaml.parse().unwrap();
        assert_eq!(config.predictor(Framework::Triton).default_image_version, "20.03");
    }

    #[test]
    fn missing_framework_is_a_configuration_error() {
        let mut table: BTreeMap<String, PredictorConfig> =
            serde_json::from_str(PREDICTORS_JSON).unwrap();
        table.remove("torchserve");

        let err = PredictorsConfig::try_from(table).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingFramework {
                framework: Framework::TorchServe
            }
        ));
        assert!(err.to_string().contains("'torchserve'"));
    }

    #[test]
    fn missing_gpu_default_is_rejected_for_gpu_frameworks() {
        let mut config = test_config();
        config.predictors.torchserve.default_gpu_image_version.clear();

        match config.validate() {
            Err(ConfigurationError::MissingDefault { framework, field }) => {
                assert_eq!(framework, Framework::TorchServe);
                assert_eq!(field, "defaultGpuImageVersion");
            }
            other => panic!("expected MissingDefault, got {other:?}"),
        }
    }

    #[test]
    fn missing_image_is_rejected() {
        let mut config = test_config();
        config.predictors.onnx.container_image = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingDefault { field: "image", .. })
        ));
    }

    #[test]
    fn unknown_frameworks_are_ignored() {
        let mut table: BTreeMap<String, PredictorConfig> =
            serde_json::from_str(PREDICTORS_JSON).unwrap();
        table.insert("lightgbm".to_string(), PredictorConfig::default());
        assert!(PredictorsConfig::try_from(table).is_ok());
    }

    #[test]
    fn configmap_data_is_read_from_predictors_key() {
        let cm = ConfigMap {
            data: Some(BTreeMap::from([(
                "predictors".to_string(),
                PREDICTORS_JSON.to_string(),
            )])),
            ..Default::default()
        };
        let config = InferenceServicesConfig::from_configmap_data(&cm).unwrap();
        assert_eq!(config, test_config());

        let err = InferenceServicesConfig::from_configmap_data(&ConfigMap::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingKey { .. }));
    }

    #[test]
    fn round_trips_through_serde() {
        let config = test_config();
        let json = serde_json::to_string(&config.predictors).unwrap();
        let parsed: PredictorsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config.predictors);
    }

    fn wrapped(predictors: &str) -> String {
        format!(r#"{{"predictors": {predictors}}}"#)
    }

    #[test]
    fn deserializing_the_registry_validates_it() {
        let config: InferenceServicesConfig =
            serde_json::from_str(&wrapped(PREDICTORS_JSON)).unwrap();
        assert_eq!(config, test_config());

        let mut table: BTreeMap<String, PredictorConfig> =
            serde_json::from_str(PREDICTORS_JSON).unwrap();
        table.get_mut("torchserve").unwrap().default_image_version.clear();
        let incomplete = wrapped(&serde_json::to_string(&table).unwrap());

        let err = serde_json::from_str::<InferenceServicesConfig>(&incomplete).unwrap_err();
        assert!(err.to_string().contains("defaultImageVersion"), "{err}");
    }

    #[test]
    fn deserializing_rejects_missing_gpu_default() {
        let mut table: BTreeMap<String, PredictorConfig> =
            serde_json::from_str(PREDICTORS_JSON).unwrap();
        table.get_mut("pytorch").unwrap().default_gpu_image_version.clear();
        let incomplete = wrapped(&serde_json::to_string(&table).unwrap());

        assert!(serde_json::from_str::<InferenceServicesConfig>(&incomplete).is_err());
    }

    #[test]
    fn serialized_registry_loads_back() {
        let config = test_config();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: InferenceServicesConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn json_and_yaml_loaders_agree() {
        let from_json = InferenceServicesConfig::from_json(PREDICTORS_JSON).unwrap();
        let from_yaml = InferenceServicesConfig::from_yaml(PREDICTORS_JSON).unwrap();
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.predictors(), test_config().predictors());

        let err = InferenceServicesConfig::from_json("tensorflow: {image: tf}").unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn loaders_reject_incomplete_tables() {
        let mut table: BTreeMap<String, PredictorConfig> =
            serde_json::from_str(PREDICTORS_JSON).unwrap();
        table.get_mut("sklearn").unwrap().default_image_version.clear();
        let json = serde_json::to_string(&table).unwrap();

        assert!(matches!(
            InferenceServicesConfig::from_json(&json),
            Err(ConfigurationError::MissingDefault {
                framework: Framework::SKLearn,
                field: "defaultImageVersion"
            })
        ));
        assert!(InferenceServicesConfig::from_yaml(&json).is_err());
    }

    #[test]
    fn framework_names() {
        assert_eq!(Framework::TorchServe.to_string(), "TorchServe");
        assert_eq!(Framework::TorchServe.key(), "torchserve");
        assert_eq!("XGBoost".parse::<Framework>(), Ok(Framework::XGBoost));
        assert!("caffe".parse::<Framework>().is_err());
    }

    #[test]
    fn default_version_prefers_gpu_tag_only_when_present() {
        let config = test_config();
        assert_eq!(config.predictor(Framework::TorchServe).default_version(true), "0.4-gpu");
        assert_eq!(config.predictor(Framework::TorchServe).default_version(false), "0.4");
        assert_eq!(config.predictor(Framework::SKLearn).default_version(true), "v0.4.0");
    }
}
