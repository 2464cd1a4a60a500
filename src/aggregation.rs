//! One-hour sliding statistics and the reporting cadence.

mod report;
mod window;

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::debug;

use crate::coordinator::{TickView, direction_key};
use crate::identity::VehicleRegistry;

pub use report::AggregatedRecord;
pub use window::{HOUR_SECS, IntervalRecord, IntervalWindow};

/// Reporting cadence used when the settings do not name one.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

/// Accumulates ticks and emits an [`AggregatedRecord`] every
/// `update_interval` seconds.
#[derive(Debug, Clone)]
pub struct Aggregator {
    window: IntervalWindow,
    update_interval: f64,
    last_report_time: f64,
}

impl Aggregator {
    /// `started_at` counts as the last report, so the first record comes one
    /// interval after start.
    pub fn new(update_interval_secs: u64, started_at: f64) -> Self {
        Self {
            window: IntervalWindow::default(),
            update_interval: update_interval_secs as f64,
            last_report_time: started_at,
        }
    }

    pub fn window(&self) -> &IntervalWindow {
        &self.window
    }

    pub fn last_report_time(&self) -> f64 {
        self.last_report_time
    }

    pub fn is_due(&self, now: f64) -> bool {
        now - self.last_report_time >= self.update_interval
    }

    /// Add one tick and, when the cadence is due, build the report for it.
    ///
    /// The registry's last-seen times are pruned to the window before the
    /// unique count is taken.
    pub fn record_tick(
        &mut self,
        view: &TickView,
        registry: &mut VehicleRegistry,
    ) -> Option<AggregatedRecord> {
        let now = view.timestamp;
        self.window.push(IntervalRecord {
            timestamp: now,
            vehicle_directions: view.directions.clone(),
        });
        self.window.evict(now);

        if !self.is_due(now) {
            return None;
        }

        let pruned = registry.prune(now);
        if pruned > 0 {
            debug!(pruned, "expired last-seen entries");
        }

        let mut direction_counts = BTreeMap::new();
        for cameras in view.directions.values() {
            *direction_counts.entry(direction_key(cameras)).or_insert(0) += 1;
        }

        let record = AggregatedRecord {
            timestamp: now,
            interval_vehicle_count: view.interval_vehicle_count(),
            direction_counts,
            total_vehicles_per_hour: self.window.distinct_vehicles(),
            unique_vehicles_per_hour: registry.active_count(),
        };
        self.last_report_time = now;
        Some(record)
    }
}
