//! Face detector adapters

mod noop;

pub use noop::NoOpDetector;
