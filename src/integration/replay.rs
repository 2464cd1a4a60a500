//! Recorded detections played back as camera feeds.
//!
//! The input is JSON lines, one camera frame per line:
//!
//! ```text
//! {"camera": 0, "frame": 0, "detections": [{"x1": 10, "y1": 20, "x2": 60, "y2": 80, "confidence": 0.9, "class_id": 2}]}
//! {"camera": 1, "frame": 0, "detections": []}
//! ```
//!
//! `track_id` may be given per detection for pre-tracked boxes.

use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::integration::builder::DetectionBuilder;
use crate::integration::detector::DetectionSource;
use crate::tracker::Detection;

#[derive(Debug, Deserialize)]
struct ReplayFrame {
    camera: usize,
    #[serde(default)]
    frame: u64,
    #[serde(default)]
    detections: Vec<ReplayBox>,
}

#[derive(Debug, Deserialize)]
struct ReplayBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    class_id: i64,
    #[serde(default)]
    track_id: Option<u64>,
}

impl From<ReplayBox> for Detection {
    fn from(b: ReplayBox) -> Self {
        DetectionBuilder::new()
            .tlbr(b.x1, b.y1, b.x2, b.y2)
            .confidence(b.confidence)
            .class_id(b.class_id)
            .track_id(b.track_id)
            .build()
    }
}

/// One camera's recorded frames, handed out in order.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    camera: usize,
    frames: VecDeque<Vec<Detection>>,
}

impl ReplaySource {
    pub fn new(camera: usize, frames: Vec<Vec<Detection>>) -> Self {
        Self {
            camera,
            frames: frames.into(),
        }
    }

    /// Read a recording and split it into one source per camera, each
    /// ordered by frame number.
    pub fn from_path(path: impl AsRef<Path>) -> Result<BTreeMap<usize, ReplaySource>> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<BTreeMap<usize, ReplaySource>> {
        let mut per_camera: BTreeMap<usize, Vec<(u64, Vec<Detection>)>> = BTreeMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: ReplayFrame = serde_json::from_str(&line).map_err(|source| Error::Replay {
                line: idx + 1,
                source,
            })?;
            let detections = frame.detections.into_iter().map(Detection::from).collect();
            per_camera
                .entry(frame.camera)
                .or_default()
                .push((frame.frame, detections));
        }

        Ok(per_camera
            .into_iter()
            .map(|(camera, mut frames)| {
                frames.sort_by_key(|(frame, _)| *frame);
                let frames = frames.into_iter().map(|(_, d)| d).collect();
                (camera, ReplaySource::new(camera, frames))
            })
            .collect())
    }

    pub fn camera(&self) -> usize {
        self.camera
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl DetectionSource for ReplaySource {
    type Error = Infallible;

    fn detect(&mut self) -> std::result::Result<Vec<Detection>, Self::Error> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }

    fn is_finished(&self) -> bool {
        self.frames.is_empty()
    }
}
