use std::collections::{BTreeMap, HashSet};

use roadscout::coordinator::CoordinatorConfig;
use roadscout::integration::{DetectionFilter, MemorySink, TrafficPipeline};
use roadscout::tracker::TrackerConfig;
use roadscout::{
    Aggregator, CentroidTracker, Detection, IdNamespace, MultiCameraCoordinator, TrackingMode,
    VehicleId, VehicleRegistry,
};

fn car(cx: f32, cy: f32) -> Detection {
    Detection::new(cx - 20.0, cy - 15.0, cx + 20.0, cy + 15.0, 0.9, 2)
}

#[test]
fn test_basic_tracking() {
    let mut tracker = CentroidTracker::new(TrackerConfig { max_disappeared: 2 });

    // Frame 1: one car
    let objects = tracker.update(&[car(100.0, 100.0)]);
    assert_eq!(objects.len(), 1);
    let id = objects[0].id;

    // Frame 2: moved slightly
    let objects = tracker.update(&[car(106.0, 103.0)]);
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].id, id);

    // Frames 3-4: gone, but within the disappearance budget
    tracker.update(&[]);
    let objects = tracker.update(&[]);
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].disappeared_count, 2);

    // Frame 5: back nearby and keeps its ID
    let objects = tracker.update(&[car(110.0, 104.0)]);
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].id, id);
    assert_eq!(objects[0].disappeared_count, 0);
}

#[test]
fn test_absence_beyond_threshold_loses_id() {
    let mut tracker = CentroidTracker::new(TrackerConfig { max_disappeared: 3 });
    tracker.update(&[car(50.0, 50.0)]);
    for _ in 0..4 {
        tracker.update(&[]);
    }
    assert!(tracker.is_empty());

    let objects = tracker.update(&[car(50.0, 50.0)]);
    assert_eq!(objects[0].id, 1);
}

#[test]
fn test_deregistered_on_fifty_first_empty_tick() {
    let mut tracker = CentroidTracker::default();
    assert_eq!(tracker.config().max_disappeared, 50);
    tracker.update(&[car(50.0, 50.0)]);

    for _ in 0..50 {
        tracker.update(&[]);
    }
    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.objects()[0].disappeared_count, 50);

    tracker.update(&[]);
    assert!(tracker.is_empty());
}

#[test]
fn test_unmatched_misses_also_count_toward_threshold() {
    let mut tracker = CentroidTracker::new(TrackerConfig { max_disappeared: 1 });
    tracker.update(&[car(50.0, 50.0), car(400.0, 400.0)]);
    // Only the first car keeps being detected.
    tracker.update(&[car(52.0, 50.0)]);
    let objects = tracker.update(&[car(54.0, 50.0)]);
    let ids: Vec<u64> = objects.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![0]);
}

#[test]
fn test_live_ids_are_unique_under_churn() {
    let mut tracker = CentroidTracker::new(TrackerConfig { max_disappeared: 3 });
    let mut seen_ids = HashSet::new();
    let mut last_max = None;

    for tick in 0..200u32 {
        // Deterministic churn: a varying number of cars drifting right, some
        // overlapping, some frames empty.
        let count = (tick * 7 % 5) as usize;
        let detections: Vec<Detection> = (0..count)
            .map(|i| {
                let x = (i as f32 * 60.0 + tick as f32 * 3.0) % 640.0;
                let y = 100.0 + ((i + tick as usize) % 3) as f32 * 40.0;
                car(x, y)
            })
            .collect();
        let objects = tracker.update(&detections);

        let live: Vec<u64> = objects.iter().map(|o| o.id).collect();
        let unique: HashSet<u64> = live.iter().copied().collect();
        assert_eq!(unique.len(), live.len(), "duplicate live id at tick {tick}");

        for o in objects {
            if seen_ids.insert(o.id) {
                // Newly seen IDs always come from the increasing counter.
                if let Some(max) = last_max {
                    assert!(o.id > max);
                }
                last_max = Some(o.id);
            }
        }
    }
}

#[test]
fn test_cross_camera_direction_with_shared_ids() {
    let config = CoordinatorConfig {
        mode: TrackingMode::External,
        namespace: IdNamespace::Shared,
        ..CoordinatorConfig::default()
    };
    let mut coordinator = MultiCameraCoordinator::new(config);

    let frames: BTreeMap<usize, Vec<Detection>> =
        [(0, vec![car(100.0, 100.0).with_track_id(5)]), (1, vec![])]
            .into_iter()
            .collect();
    let view = coordinator.update(10.0, &frames);
    assert!(view.directions.is_empty());

    let frames: BTreeMap<usize, Vec<Detection>> =
        [(0, vec![]), (1, vec![car(300.0, 120.0).with_track_id(5)])]
            .into_iter()
            .collect();
    let view = coordinator.update(12.0, &frames);
    assert_eq!(view.directions[&VehicleId(5)], vec![0, 1]);
}

#[test]
fn test_end_to_end_reports() {
    let config = CoordinatorConfig {
        mode: TrackingMode::External,
        namespace: IdNamespace::Shared,
        ..CoordinatorConfig::default()
    };
    let mut pipeline = TrafficPipeline::from_parts(
        DetectionFilter::new(0.5, vec![2, 7]),
        MultiCameraCoordinator::new(config),
        VehicleRegistry::new(),
        Aggregator::new(10, 0.0),
        MemorySink::new(),
    );

    // Vehicle 5 drives from camera 0 to camera 1; vehicle 6 stays on camera 1.
    let plan: Vec<(f64, Vec<(usize, u64)>)> = vec![
        (2.0, vec![(0, 5), (1, 6)]),
        (6.0, vec![(1, 5), (1, 6)]),
        (10.0, vec![(1, 6)]),
    ];
    for (t, sightings) in plan {
        let mut frames: BTreeMap<usize, Vec<Detection>> =
            [(0, Vec::new()), (1, Vec::new())].into_iter().collect();
        for (camera, id) in sightings {
            frames
                .get_mut(&camera)
                .unwrap()
                .push(car(100.0 + id as f32 * 50.0, 100.0).with_track_id(id));
        }
        pipeline.tick(t, frames);
    }

    let records = pipeline.sink().records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.interval_vehicle_count, 1);
    assert_eq!(record.direction_counts["0 -> 1"], 1);
    assert_eq!(record.direction_counts["1 -> 1 -> 1"], 1);
    assert_eq!(record.total_vehicles_per_hour, 2);
    assert_eq!(record.unique_vehicles_per_hour, 2);
}
