//! Face detection value objects

mod detection_set;

pub use detection_set::{BoundingBox, DetectionResult, DetectionSet, Point};
