//! Video frame value object

use std::sync::Arc;

/// A single RGB24 video frame, row-major.
///
/// Pixel data is shared, so the detection loop and the encoder can both hold
/// the current frame without copying it. Nothing mutates a frame after it is
/// published.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    index: u64,
}

impl Frame {
    /// Bytes per pixel for RGB24
    pub const CHANNELS: usize = 3;

    pub fn new(data: impl Into<Arc<[u8]>>, width: u32, height: u32, index: u64) -> Self {
        let data = data.into();
        debug_assert_eq!(
            data.len(),
            Self::byte_len(width, height),
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Expected buffer size for a frame of the given dimensions
    pub const fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sequence number within the stream, starting at 0
    pub fn index(&self) -> u64 {
        self.index
    }
}
