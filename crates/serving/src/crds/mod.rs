pub mod inferenceservice;

pub use inferenceservice::*;
