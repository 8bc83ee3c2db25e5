//! Detection results for a single detection cycle.
//!
//! All coordinates are in the source frame's native pixel space. Scaling to a
//! display surface is left to whoever renders the overlay.

use std::sync::Arc;

/// A 2D point in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face box, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Index within the cycle that produced it
    pub id: usize,
    pub bounding_box: BoundingBox,
    pub landmarks: Vec<Point>,
}

/// The complete output of one detection cycle.
///
/// Backed by a shared slice so publishing a set to many readers never copies
/// the faces, and a published set can never be mutated in place.
#[derive(Debug, Clone, Default)]
pub struct DetectionSet {
    faces: Arc<[DetectionResult]>,
    cycle: u64,
}

impl DetectionSet {
    /// Build a set from detector output, assigning ids in output order.
    pub fn from_detections<I>(detections: I) -> Self
    where
        I: IntoIterator<Item = (BoundingBox, Vec<Point>)>,
    {
        let faces: Vec<DetectionResult> = detections
            .into_iter()
            .enumerate()
            .map(|(id, (bounding_box, landmarks))| DetectionResult {
                id,
                bounding_box,
                landmarks,
            })
            .collect();

        Self {
            faces: faces.into(),
            cycle: 0,
        }
    }

    /// An empty set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stamp the set with the cycle number that produced it
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn faces(&self) -> &[DetectionResult] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Detection cycle that produced this set (0 before the first cycle)
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// "1 Face" / "3 Faces"
    pub fn face_count_label(&self) -> String {
        let count = self.len();
        if count == 1 {
            "1 Face".to_string()
        } else {
            format!("{} Faces", count)
        }
    }
}

impl PartialEq for DetectionSet {
    fn eq(&self, other: &Self) -> bool {
        self.cycle == other.cycle && self.faces[..] == other.faces[..]
    }
}
