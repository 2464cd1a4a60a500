//! Settings file.
//!
//! Settings are read once at startup from a JSON document. Required values
//! that are missing or out of range abort startup; only the optional values
//! below fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::aggregation::DEFAULT_UPDATE_INTERVAL_SECS;
use crate::coordinator::{CoordinatorConfig, IdNamespace, TrackingMode};
use crate::error::{Error, Result};
use crate::integration::DetectionFilter;
use crate::tracker::TrackerConfig;

/// COCO class ids for car and truck.
pub const DEFAULT_VEHICLE_CLASSES: [i64; 2] = [2, 7];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub detection: DetectionSettings,
    pub tracking: TrackingSettings,
    #[serde(default)]
    pub update: UpdateSettings,
    pub camera: CameraSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Minimum detector confidence
    pub conf_threshold: f32,
    /// Class ids of interest; empty admits every class
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Passed through to an external tracker
    pub max_age: u32,
    /// Passed through to an external tracker
    pub min_hits: u32,
    /// Passed through to an external tracker
    pub iou_threshold: f32,
    #[serde(default)]
    pub mode: TrackingMode,
    #[serde(default = "default_max_disappeared")]
    pub max_disappeared: u32,
    #[serde(default)]
    pub id_namespace: IdNamespace,
    /// `null` keeps a stalled camera's objects indefinitely
    #[serde(default = "default_stale_camera_ticks")]
    pub stale_camera_ticks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Seconds between reports. Anything but a positive integer falls back
    /// to the default instead of failing.
    #[serde(
        default = "default_update_interval",
        deserialize_with = "lenient_update_interval"
    )]
    pub update_interval: u64,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Tick rate of the processing loop
    pub fps: u32,
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub report_file: PathBuf,
    #[serde(default = "default_identity_file")]
    pub identity_file: PathBuf,
}

/// Tuning for an external SORT-style tracker that pre-tracks boxes in
/// `external` mode. The crate carries these values for callers that run
/// that tracker; the centroid tracker ignores them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalTrackerParams {
    pub max_age: u32,
    pub min_hits: u32,
    pub iou_threshold: f32,
}

fn default_classes() -> Vec<i64> {
    DEFAULT_VEHICLE_CLASSES.to_vec()
}

fn default_max_disappeared() -> u32 {
    TrackerConfig::default().max_disappeared
}

fn default_stale_camera_ticks() -> Option<u32> {
    Some(default_max_disappeared())
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_SECS
}

fn lenient_update_interval<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value.as_u64() {
        Some(secs) if secs > 0 => Ok(secs),
        _ => {
            warn!(
                value = %value,
                fallback = DEFAULT_UPDATE_INTERVAL_SECS,
                "invalid update.update_interval, using default"
            );
            Ok(DEFAULT_UPDATE_INTERVAL_SECS)
        }
    }
}

fn default_capture_timeout_ms() -> u64 {
    1000
}

fn default_identity_file() -> PathBuf {
    PathBuf::from("vehicle_ids.json")
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| Error::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json, path)
    }

    /// Parse and validate a settings document; `origin` is only used in
    /// error messages.
    pub fn parse(json: &str, origin: &Path) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|source| Error::SettingsParse {
                path: origin.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let conf = self.detection.conf_threshold;
        if !(0.0..=1.0).contains(&conf) {
            return Err(invalid("detection.conf_threshold", format!("{conf} is outside 0..=1")));
        }
        let iou = self.tracking.iou_threshold;
        if !(0.0..=1.0).contains(&iou) {
            return Err(invalid("tracking.iou_threshold", format!("{iou} is outside 0..=1")));
        }
        if self.camera.fps == 0 {
            return Err(invalid("camera.fps", "must be at least 1".to_string()));
        }
        if self.camera.capture_timeout_ms == 0 {
            return Err(invalid("camera.capture_timeout_ms", "must be at least 1".to_string()));
        }
        if self.export.report_file.as_os_str().is_empty() {
            return Err(invalid("export.report_file", "must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            mode: self.tracking.mode,
            namespace: self.tracking.id_namespace,
            tracker: TrackerConfig {
                max_disappeared: self.tracking.max_disappeared,
            },
            stale_camera_ticks: self.tracking.stale_camera_ticks,
        }
    }

    pub fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter::new(self.detection.conf_threshold, self.detection.classes.clone())
    }

    pub fn external_tracker(&self) -> ExternalTrackerParams {
        ExternalTrackerParams {
            max_age: self.tracking.max_age,
            min_hits: self.tracking.min_hits,
            iou_threshold: self.tracking.iou_threshold,
        }
    }

    /// External tracker tuning, only when boxes are expected pre-tracked.
    pub fn external_tracker_params(&self) -> Option<ExternalTrackerParams> {
        (self.tracking.mode == TrackingMode::External).then(|| self.external_tracker())
    }

    /// Minimum time between two ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.camera.fps as f64)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.camera.capture_timeout_ms)
    }
}

fn invalid(field: &'static str, reason: String) -> Error {
    Error::InvalidSetting { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "detection": { "conf_threshold": 0.5 },
        "tracking": { "max_age": 30, "min_hits": 3, "iou_threshold": 0.3 },
        "camera": { "fps": 5 },
        "export": { "report_file": "traffic.csv" }
    }"#;

    fn parse(json: &str) -> Result<Settings> {
        Settings::parse(json, Path::new("settings.json"))
    }

    #[test]
    fn test_defaults_fill_optional_values() {
        let settings = parse(MINIMAL).unwrap();
        assert_eq!(settings.update.update_interval, 10);
        assert_eq!(settings.detection.classes, vec![2, 7]);
        assert_eq!(settings.tracking.max_disappeared, 50);
        assert_eq!(settings.tracking.stale_camera_ticks, Some(50));
        assert_eq!(settings.tracking.mode, TrackingMode::Centroid);
        assert_eq!(settings.tracking.id_namespace, IdNamespace::PerCamera);
        assert_eq!(settings.export.identity_file, PathBuf::from("vehicle_ids.json"));
        assert_eq!(settings.frame_interval(), Duration::from_millis(200));
        assert_eq!(settings.external_tracker_params(), None);
    }

    #[test]
    fn test_missing_required_value_fails() {
        let json = MINIMAL.replace(r#""fps": 5"#, r#""capture_timeout_ms": 10"#);
        assert!(matches!(parse(&json), Err(Error::SettingsParse { .. })));
    }

    #[test]
    fn test_out_of_range_value_fails() {
        let json = MINIMAL.replace("0.5", "1.5");
        assert!(matches!(
            parse(&json),
            Err(Error::InvalidSetting { field: "detection.conf_threshold", .. })
        ));

        let json = MINIMAL.replace(r#""fps": 5"#, r#""fps": 0"#);
        assert!(matches!(parse(&json), Err(Error::InvalidSetting { field: "camera.fps", .. })));
    }

    #[test]
    fn test_explicit_sections() {
        let json = r#"{
            "detection": { "conf_threshold": 0.4, "classes": [] },
            "tracking": {
                "max_age": 1, "min_hits": 1, "iou_threshold": 0.5,
                "mode": "external", "id_namespace": "shared", "stale_camera_ticks": null
            },
            "update": { "update_interval": 30 },
            "camera": { "fps": 15 },
            "export": { "report_file": "out.csv", "identity_file": "ids.json" }
        }"#;
        let settings = parse(json).unwrap();
        let coordinator = settings.coordinator_config();
        assert_eq!(coordinator.mode, TrackingMode::External);
        assert_eq!(coordinator.namespace, IdNamespace::Shared);
        assert_eq!(coordinator.stale_camera_ticks, None);
        assert_eq!(settings.external_tracker().max_age, 1);
        assert_eq!(
            settings.external_tracker_params(),
            Some(ExternalTrackerParams {
                max_age: 1,
                min_hits: 1,
                iou_threshold: 0.5,
            })
        );
        assert_eq!(settings.update.update_interval, 30);
    }

    #[test]
    fn test_bad_update_interval_falls_back() {
        for bad in [r#"0"#, r#""soon""#, r#"-5"#, r#"2.5"#] {
            let json = MINIMAL.replace(
                r#""camera": { "fps": 5 },"#,
                &format!(r#""camera": {{ "fps": 5 }}, "update": {{ "update_interval": {bad} }},"#),
            );
            let settings = parse(&json).unwrap();
            assert_eq!(settings.update.update_interval, 10, "input {bad}");
        }
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load("/nonexistent/roadscout/settings.json").unwrap_err();
        assert!(matches!(err, Error::SettingsIo { .. }));
    }
}
