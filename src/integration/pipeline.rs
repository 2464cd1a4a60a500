//! TrafficPipeline: the per-tick loop from detections to reports.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::aggregation::{AggregatedRecord, Aggregator, unix_now};
use crate::config::Settings;
use crate::coordinator::{MultiCameraCoordinator, TickView};
use crate::identity::VehicleRegistry;
use crate::integration::capture::CaptureHub;
use crate::integration::filter::DetectionFilter;
use crate::integration::sink::ReportSink;
use crate::tracker::Detection;

/// Read-only copy of the pipeline state after a tick, for UIs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub tick: u64,
    pub timestamp: f64,
    /// Visible vehicles per camera that delivered a frame
    pub visible_per_camera: BTreeMap<usize, usize>,
    /// Vehicles with at least two sightings
    pub vehicles_with_direction: usize,
    /// Vehicles seen in the last hour as of the latest report
    pub active_vehicles: usize,
    /// Vehicles ever seen, including earlier runs
    pub known_vehicles: usize,
    pub last_report: Option<AggregatedRecord>,
}

/// Owns all tracking state and runs it one tick at a time.
pub struct TrafficPipeline<S: ReportSink> {
    filter: DetectionFilter,
    coordinator: MultiCameraCoordinator,
    registry: VehicleRegistry,
    aggregator: Aggregator,
    sink: S,
    snapshot: StatsSnapshot,
    observer: Option<Sender<StatsSnapshot>>,
}

impl<S: ReportSink> TrafficPipeline<S> {
    /// Build a pipeline from settings. `registry` carries the identities
    /// loaded at startup; `started_at` is the reference for the first report.
    pub fn new(settings: &Settings, registry: VehicleRegistry, sink: S, started_at: f64) -> Self {
        Self::from_parts(
            settings.detection_filter(),
            MultiCameraCoordinator::new(settings.coordinator_config()),
            registry,
            Aggregator::new(settings.update.update_interval, started_at),
            sink,
        )
    }

    pub fn from_parts(
        filter: DetectionFilter,
        coordinator: MultiCameraCoordinator,
        registry: VehicleRegistry,
        aggregator: Aggregator,
        sink: S,
    ) -> Self {
        let snapshot = StatsSnapshot {
            known_vehicles: registry.known_count(),
            active_vehicles: registry.active_count(),
            ..StatsSnapshot::default()
        };
        Self {
            filter,
            coordinator,
            registry,
            aggregator,
            sink,
            snapshot,
            observer: None,
        }
    }

    /// Publish a snapshot after every tick. Snapshots are dropped while the
    /// observer is behind.
    pub fn with_observer(mut self, observer: Sender<StatsSnapshot>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn snapshot(&self) -> &StatsSnapshot {
        &self.snapshot
    }

    pub fn coordinator(&self) -> &MultiCameraCoordinator {
        &self.coordinator
    }

    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Hand back the identity state for persisting at shutdown.
    pub fn into_registry(self) -> VehicleRegistry {
        self.registry
    }

    /// Process one tick. Returns the record emitted on this tick, if any.
    pub fn tick(
        &mut self,
        now: f64,
        frames: BTreeMap<usize, Vec<Detection>>,
    ) -> Option<AggregatedRecord> {
        let frames: BTreeMap<usize, Vec<Detection>> = frames
            .into_iter()
            .map(|(camera, detections)| (camera, self.filter.apply(detections)))
            .collect();

        let view = self.coordinator.update(now, &frames);
        for id in view.visible_ids() {
            if self.registry.observe(id, now) {
                debug!(%id, "new vehicle");
            }
        }

        let record = self.aggregator.record_tick(&view, &mut self.registry);
        if let Some(record) = &record {
            match self.sink.write(record) {
                Ok(()) => info!(
                    vehicles = record.interval_vehicle_count,
                    per_hour = record.total_vehicles_per_hour,
                    unique = record.unique_vehicles_per_hour,
                    "report written at {}",
                    record.formatted_timestamp()
                ),
                Err(e) => warn!(error = %e, "failed to write report"),
            }
        }

        self.update_snapshot(&view, record.as_ref());
        record
    }

    /// Tick at most once per `frame_interval` until `stop` is set or every
    /// camera has stopped. Returns the number of ticks processed.
    pub fn run(&mut self, hub: &mut CaptureHub, frame_interval: Duration, stop: &AtomicBool) -> u64 {
        let mut ticks = 0;
        let mut last_tick: Option<Instant> = None;

        while !stop.load(Ordering::Relaxed) {
            if hub.live_cameras() == 0 {
                info!("no cameras left, stopping");
                break;
            }
            if let Some(last) = last_tick {
                let elapsed = last.elapsed();
                if elapsed < frame_interval {
                    thread::sleep(frame_interval - elapsed);
                }
            }
            last_tick = Some(Instant::now());

            let frames = hub.collect();
            if frames.is_empty() {
                debug!("no frames to process");
                continue;
            }
            self.tick(unix_now(), frames);
            ticks += 1;
        }
        ticks
    }

    fn update_snapshot(&mut self, view: &TickView, record: Option<&AggregatedRecord>) {
        self.snapshot.tick += 1;
        self.snapshot.timestamp = view.timestamp;
        self.snapshot.visible_per_camera = view
            .current_vehicle_ids
            .iter()
            .map(|(&camera, ids)| (camera, ids.len()))
            .collect();
        self.snapshot.vehicles_with_direction = view.directions.len();
        self.snapshot.active_vehicles = self.registry.active_count();
        self.snapshot.known_vehicles = self.registry.known_count();
        if let Some(record) = record {
            self.snapshot.last_report = Some(record.clone());
        }

        if let Some(observer) = &self.observer {
            match observer.try_send(self.snapshot.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    debug!("snapshot observer went away");
                    self.observer = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::error::{Error, Result};
    use crate::integration::replay::ReplaySource;
    use crate::integration::sink::MemorySink;
    use crate::integration::detector::DetectionSource;
    use std::sync::Arc;

    fn pipeline() -> TrafficPipeline<MemorySink> {
        TrafficPipeline::from_parts(
            DetectionFilter::new(0.5, vec![2, 7]),
            MultiCameraCoordinator::new(CoordinatorConfig::default()),
            VehicleRegistry::new(),
            Aggregator::new(10, 0.0),
            MemorySink::new(),
        )
    }

    fn frame(camera: usize, detections: Vec<Detection>) -> BTreeMap<usize, Vec<Detection>> {
        [(camera, detections)].into_iter().collect()
    }

    #[test]
    fn test_filter_runs_before_tracking() {
        let mut pipeline = pipeline();
        pipeline.tick(
            1.0,
            frame(
                0,
                vec![
                    Detection::new(0.0, 0.0, 20.0, 20.0, 0.9, 2),
                    Detection::new(100.0, 0.0, 120.0, 20.0, 0.2, 2),
                    Detection::new(200.0, 0.0, 220.0, 20.0, 0.9, 0),
                ],
            ),
        );
        assert_eq!(pipeline.snapshot().visible_per_camera[&0], 1);
        assert_eq!(pipeline.registry().known_count(), 1);
    }

    #[test]
    fn test_report_goes_to_sink() {
        let mut pipeline = pipeline();
        let car = Detection::new(0.0, 0.0, 20.0, 20.0, 0.9, 2);
        for t in 1..=10 {
            pipeline.tick(t as f64, frame(0, vec![car.clone()]));
        }
        let records = pipeline.sink().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, 10.0);
        assert_eq!(records[0].interval_vehicle_count, 1);
        assert_eq!(records[0].unique_vehicles_per_hour, 1);
        assert_eq!(pipeline.snapshot().last_report.as_ref(), Some(&records[0]));
    }

    struct BrokenSink;

    impl ReportSink for BrokenSink {
        fn write(&mut self, _record: &AggregatedRecord) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn test_sink_failure_keeps_running() {
        let mut pipeline = TrafficPipeline::from_parts(
            DetectionFilter::pass_all(),
            MultiCameraCoordinator::new(CoordinatorConfig::default()),
            VehicleRegistry::new(),
            Aggregator::new(1, 0.0),
            BrokenSink,
        );
        assert!(pipeline.tick(5.0, frame(0, vec![])).is_some());
        assert!(pipeline.tick(6.0, frame(0, vec![])).is_some());
        assert_eq!(pipeline.snapshot().tick, 2);
    }

    #[test]
    fn test_observer_receives_snapshots() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut pipeline = pipeline().with_observer(tx);
        pipeline.tick(1.0, frame(0, vec![]));
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.visible_per_camera[&0], 0);
    }

    fn replay_hub(frames_per_camera: &[usize]) -> CaptureHub {
        let mut hub = CaptureHub::new(Duration::from_secs(5));
        for (camera, &count) in frames_per_camera.iter().enumerate() {
            let frames = vec![vec![Detection::new(0.0, 0.0, 20.0, 20.0, 0.9, 2)]; count];
            hub.spawn(camera, ReplaySource::new(camera, frames)).unwrap();
        }
        hub
    }

    #[test]
    fn test_run_ends_when_sources_are_exhausted() {
        let mut hub = replay_hub(&[3, 1]);
        let mut pipeline = pipeline();
        let stop = AtomicBool::new(false);

        // The pass after the last frames yields nothing and is not a tick.
        let ticks = pipeline.run(&mut hub, Duration::from_millis(1), &stop);
        assert_eq!(ticks, 3);
        assert_eq!(pipeline.snapshot().tick, 3);
        assert_eq!(hub.live_cameras(), 0);
        assert!(pipeline.registry().known_count() >= 2);
    }

    #[test]
    fn test_run_honours_preset_stop() {
        let mut hub = replay_hub(&[2]);
        let mut pipeline = pipeline();
        let stop = AtomicBool::new(true);
        assert_eq!(pipeline.run(&mut hub, Duration::from_millis(1), &stop), 0);
        assert_eq!(pipeline.snapshot().tick, 0);
    }

    struct Endless;

    impl DetectionSource for Endless {
        type Error = String;

        fn detect(&mut self) -> std::result::Result<Vec<Detection>, Self::Error> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_run_stops_when_flag_is_raised() {
        let mut hub = CaptureHub::new(Duration::from_secs(1));
        hub.spawn(0, Endless).unwrap();
        let mut pipeline = pipeline();

        let stop = Arc::new(AtomicBool::new(false));
        let raiser = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                stop.store(true, Ordering::Relaxed);
            })
        };

        let ticks = pipeline.run(&mut hub, Duration::from_millis(1), &stop);
        raiser.join().unwrap();
        assert!(ticks > 0);
        assert_eq!(hub.live_cameras(), 1);
    }
}
