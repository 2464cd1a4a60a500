//! Trait for per-camera detection feeds.

use crate::tracker::Detection;

/// Trait for object detection feeds.
///
/// Implement this trait to connect one camera's detector to the pipeline.
/// Each call yields the boxes of the camera's current frame.
///
/// # Example
///
/// ```ignore
/// use roadscout::Detection;
/// use roadscout::integration::DetectionSource;
///
/// struct MyCamera {
///     // Capture handle and model here
/// }
///
/// impl DetectionSource for MyCamera {
///     type Error = std::io::Error;
///
///     fn detect(&mut self) -> Result<Vec<Detection>, Self::Error> {
///         // Grab a frame, run inference and return the boxes
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for read or inference failures.
    type Error;

    /// Read the next frame and return its detections.
    ///
    /// An error drops this camera from the current tick only.
    fn detect(&mut self) -> Result<Vec<Detection>, Self::Error>;

    /// Whether the feed has ended; no further frames will be requested.
    fn is_finished(&self) -> bool {
        false
    }
}
