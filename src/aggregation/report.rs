use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

/// Statistics emitted once per reporting cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    /// Unix time in seconds of the tick that triggered the report
    pub timestamp: f64,
    /// Vehicles visible across all cameras on that tick
    pub interval_vehicle_count: usize,
    /// Camera sequence (`"0 -> 1"`) to number of vehicles on that tick
    pub direction_counts: BTreeMap<String, usize>,
    /// Distinct vehicles with a direction in the last hour
    pub total_vehicles_per_hour: usize,
    /// Distinct vehicles seen in the last hour
    pub unique_vehicles_per_hour: usize,
}

impl AggregatedRecord {
    /// `"0 -> 1: 2, 1 -> 0: 1"`, empty when no vehicle changed camera.
    pub fn direction_summary(&self) -> String {
        self.direction_counts
            .iter()
            .map(|(direction, count)| format!("{direction}: {count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn local_time(&self) -> Option<DateTime<Local>> {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        Local.timestamp_opt(secs as i64, nanos).single()
    }

    /// Local wall-clock time as `%Y-%m-%d %H:%M:%S`.
    pub fn formatted_timestamp(&self) -> String {
        match self.local_time() {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("{:.3}", self.timestamp),
        }
    }
}
