/*
 * 5D Labs Model Serving - Predictor Defaulting and Validation Core
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Model serving core library
//!
//! This crate turns a declarative `InferenceService` predictor ("serve this model
//! with framework X") into a runnable container, applying framework-aware defaults
//! and enforcing framework-specific invariants along the way. It also ships the
//! admission webhook handlers that drive the predictor contract on admission.

pub mod config;
pub mod constants;
pub mod crds;
pub mod error;
pub mod predictor;
pub mod resources;
pub mod webhook;

// Re-export commonly used types
pub use config::{Framework, InferenceServicesConfig, PredictorConfig};
pub use crds::{EndpointSpec, InferenceService, InferenceServiceSpec, PredictorSpec};
pub use error::{ConfigurationError, Error, Result, ValidationError};
pub use predictor::Predictor;
pub use resources::{is_gpu_enabled, set_resource_requirement_defaults};
