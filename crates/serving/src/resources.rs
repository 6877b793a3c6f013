//! Resource requirement helpers shared by every predictor framework.
//!
//! Two pieces live here: the accelerator predicate that drives GPU image
//! selection and validation, and the defaulting pass that fills in CPU and
//! memory requests/limits the user left unset.

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Extended resource names that schedule dedicated accelerators.
pub const ACCELERATOR_RESOURCE_TYPES: &[&str] = &["nvidia.com/gpu", "amd.com/gpu"];

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";

/// Cluster-wide fallback applied to unset CPU requests and limits
pub const DEFAULT_CPU: &str = "1";

/// Cluster-wide fallback applied to unset memory requests and limits
pub const DEFAULT_MEMORY: &str = "2Gi";

/// Returns `true` when the requirements ask for at least one accelerator.
///
/// Both `requests` and `limits` are inspected; a key only counts when its
/// quantity parses to a strictly positive value, so `nvidia.com/gpu: 0` does
/// not select a GPU image.
#[must_use]
pub fn is_gpu_enabled(requirements: &ResourceRequirements) -> bool {
    [&requirements.requests, &requirements.limits]
        .into_iter()
        .flatten()
        .any(has_positive_accelerator)
}

fn has_positive_accelerator(list: &BTreeMap<String, Quantity>) -> bool {
    ACCELERATOR_RESOURCE_TYPES.iter().any(|name| {
        list.get(*name)
            .and_then(|quantity| parse_quantity(&quantity.0))
            .is_some_and(|value| value > 0.0)
    })
}

/// Fill unset CPU/memory requests and limits with the cluster defaults.
///
/// Each of the four fields is handled on its own: a field the caller set is
/// left untouched, and nothing is ever derived from a sibling field. Running
/// this twice is the same as running it once.
pub fn set_resource_requirement_defaults(requirements: &mut ResourceRequirements) {
    for list in [&mut requirements.requests, &mut requirements.limits] {
        let list = list.get_or_insert_with(BTreeMap::new);
        list.entry(RESOURCE_CPU.to_string())
            .or_insert_with(|| Quantity(DEFAULT_CPU.to_string()));
        list.entry(RESOURCE_MEMORY.to_string())
            .or_insert_with(|| Quantity(DEFAULT_MEMORY.to_string()));
    }
}

/// Parse a Kubernetes quantity string ("1", "500m", "2Gi", "1e3") into a
/// plain number. Returns `None` for anything that is not a valid quantity.
#[must_use]
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);
    let number: f64 = number.parse().ok()?;

    let multiplier = match suffix {
        "" => 1.0,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024_f64,
        "Mi" => 1024_f64.powi(2),
        "Gi" => 1024_f64.powi(3),
        "Ti" => 1024_f64.powi(4),
        "Pi" => 1024_f64.powi(5),
        "Ei" => 1024_f64.powi(6),
        exponent => {
            let digits = exponent
                .strip_prefix('e')
                .or_else(|| exponent.strip_prefix('E'))?;
            10_f64.powi(digits.parse::<i32>().ok()?)
        }
    };

    Some(number * multiplier)
}
