use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in TLBR format.
///
/// Detectors report corners directly, so the corners are stored as-is and
/// the centroid is derived from them without a width/height round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left x coordinate
    pub x1: f32,
    /// Top-left y coordinate
    pub y1: f32,
    /// Bottom-right x coordinate
    pub x2: f32,
    /// Bottom-right y coordinate
    pub y2: f32,
}

impl Rect {
    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Integer centre of the box, truncated toward zero.
    #[inline]
    pub fn centroid(&self) -> Centroid {
        let cx = (self.x1 as f64 + self.x2 as f64) / 2.0;
        let cy = (self.y1 as f64 + self.y2 as f64) / 2.0;
        Centroid::new(cx as i32, cy as i32)
    }
}

/// Tracked position of an object: the integer centre of its last box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Centroid {
    pub x: i32,
    pub y: i32,
}

impl Centroid {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn to_point(self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }

    /// Euclidean distance between two centroids.
    #[inline]
    pub fn distance(&self, other: &Centroid) -> f64 {
        nalgebra::distance(&self.to_point(), &other.to_point())
    }
}
