//! Stored image post-processing.

mod optimizer;

pub use optimizer::{ImageOptimization, ImageOptimizer, OutputFormat};
