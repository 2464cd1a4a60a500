use crate::tracker::Detection;

/// Admission rule applied to raw detections before tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFilter {
    pub conf_threshold: f32,
    /// Classes of interest; empty admits every class
    pub classes: Vec<i64>,
}

impl DetectionFilter {
    pub fn new(conf_threshold: f32, classes: Vec<i64>) -> Self {
        Self {
            conf_threshold,
            classes,
        }
    }

    /// Admit everything.
    pub fn pass_all() -> Self {
        Self::new(0.0, Vec::new())
    }

    pub fn admits(&self, detection: &Detection) -> bool {
        detection.confidence >= self.conf_threshold
            && (self.classes.is_empty() || self.classes.contains(&detection.class_id))
    }

    pub fn apply(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        detections.retain(|d| self.admits(d));
        detections
    }
}
