//! Well-known names, paths and flags shared by every predictor framework.
//!
//! These values are part of the contract with the serving images and the
//! deployment template, so they must not change without both sides moving.

/// Name of the container slot the predictor runs in.
pub const INFERENCE_SERVICE_CONTAINER_NAME: &str = "kfserving-container";

/// Root under which the storage initializer mounts downloaded model artifacts.
pub const DEFAULT_MODEL_LOCAL_MOUNT_PATH: &str = "/mnt/models";

/// Default HTTP port exposed by the serving container.
pub const INFERENCE_SERVICE_DEFAULT_HTTP_PORT: &str = "8080";

/// Default gRPC port exposed by frameworks that serve gRPC.
pub const INFERENCE_SERVICE_DEFAULT_GRPC_PORT: &str = "9000";

/// Image tag marker for GPU-capable serving images.
pub const GPU_IMAGE_SUFFIX: &str = "-gpu";

// Command-line flags understood by the python model servers
pub const ARGUMENT_MODEL_NAME: &str = "--model_name";
pub const ARGUMENT_MODEL_DIR: &str = "--model_dir";
pub const ARGUMENT_MODEL_CLASS_NAME: &str = "--model_class_name";
pub const ARGUMENT_HTTP_PORT: &str = "--http_port";
pub const ARGUMENT_WORKERS: &str = "--workers";

/// Name of the `ConfigMap` holding the framework registry.
pub const INFERENCE_SERVICE_CONFIG_MAP_NAME: &str = "inferenceservice-config";

/// Key inside the `ConfigMap` that carries the predictor table.
pub const PREDICTOR_CONFIG_KEY_NAME: &str = "predictors";
