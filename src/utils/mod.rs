pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{decode_image, to_unit_tensor};
pub use metrics::Metrics;
