use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::coordinator::VehicleId;

/// Length of the statistics window in seconds.
pub const HOUR_SECS: f64 = 3600.0;

/// Directions observed during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub timestamp: f64,
    pub vehicle_directions: BTreeMap<VehicleId, Vec<usize>>,
}

/// Rolling window of [`IntervalRecord`]s.
///
/// A record is kept while `now - timestamp <= span`; eviction happens only
/// when [`IntervalWindow::evict`] is called.
#[derive(Debug, Clone)]
pub struct IntervalWindow {
    records: VecDeque<IntervalRecord>,
    span: f64,
}

impl Default for IntervalWindow {
    fn default() -> Self {
        Self::new(HOUR_SECS)
    }
}

impl IntervalWindow {
    pub fn new(span: f64) -> Self {
        Self {
            records: VecDeque::new(),
            span,
        }
    }

    pub fn span(&self) -> f64 {
        self.span
    }

    pub fn push(&mut self, record: IntervalRecord) {
        self.records.push_back(record);
    }

    /// Drop every record older than the window relative to `now`.
    pub fn evict(&mut self, now: f64) {
        let span = self.span;
        self.records.retain(|r| now - r.timestamp <= span);
    }

    pub fn records(&self) -> impl Iterator<Item = &IntervalRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct vehicles keyed in any retained record.
    pub fn distinct_vehicles(&self) -> usize {
        self.records
            .iter()
            .flat_map(|r| r.vehicle_directions.keys())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: f64, ids: &[u64]) -> IntervalRecord {
        IntervalRecord {
            timestamp,
            vehicle_directions: ids.iter().map(|&id| (VehicleId(id), vec![0, 1])).collect(),
        }
    }

    #[test]
    fn test_eviction_boundary() {
        let mut window = IntervalWindow::default();
        window.push(record(0.0, &[1]));
        window.push(record(100.0, &[2]));
        window.push(record(3601.0, &[3]));
        window.evict(3601.0);

        // 3601 - 0 > 3600 goes, 3601 - 100 = 3501 stays.
        let kept: Vec<f64> = window.records().map(|r| r.timestamp).collect();
        assert_eq!(kept, vec![100.0, 3601.0]);
    }

    #[test]
    fn test_retention_is_inclusive() {
        let mut window = IntervalWindow::default();
        window.push(record(0.0, &[1]));
        window.evict(3600.0);
        assert_eq!(window.len(), 1);
        window.evict(3600.5);
        assert!(window.is_empty());
    }

    #[test]
    fn test_distinct_vehicles_across_records() {
        let mut window = IntervalWindow::default();
        window.push(record(1.0, &[1, 2]));
        window.push(record(2.0, &[2, 3]));
        window.push(record(3.0, &[]));
        assert_eq!(window.distinct_vehicles(), 3);
    }
}
