//! Camera capture value objects

mod constraints;
mod frame;
mod status;

pub use constraints::{CaptureConstraints, FacingMode, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use frame::Frame;
pub use status::CameraStatus;
