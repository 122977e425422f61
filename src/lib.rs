pub mod aligner;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod geometry;
pub mod grader;
pub mod guide;
pub mod metrics;
pub mod raster;
pub mod reference;
pub mod store;
// cmd and reports belong to the binary (main.rs).

pub use engine::{Engine, Evaluation};
pub use error::{GyResult, GyeolguError};
