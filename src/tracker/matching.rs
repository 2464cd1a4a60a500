//! Matching utilities for centroid tracking.

use ndarray::Array2;

use crate::tracker::rect::{Centroid, Rect};

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box in TLBR format (x1, y1, x2, y2)
    pub bbox: Rect,
    /// Detection confidence score
    pub confidence: f32,
    /// Detector class id (COCO numbering for the stock models)
    pub class_id: i64,
    /// Identity assigned by an external tracker, if the box is pre-tracked
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: i64) -> Self {
        Self {
            bbox: Rect::new(x1, y1, x2, y2),
            confidence,
            class_id,
            track_id: None,
        }
    }

    pub fn from_rect(bbox: Rect, confidence: f32, class_id: i64) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            track_id: None,
        }
    }

    /// Mark this box as already tracked under `track_id`.
    pub fn with_track_id(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }

    #[inline]
    pub fn centroid(&self) -> Centroid {
        self.bbox.centroid()
    }
}

/// Pairwise Euclidean distances, rows = tracked centroids, columns = inputs.
pub fn centroid_distance(tracked: &[Centroid], inputs: &[Centroid]) -> Array2<f64> {
    let mut dists = Array2::zeros((tracked.len(), inputs.len()));
    for (i, t) in tracked.iter().enumerate() {
        for (j, c) in inputs.iter().enumerate() {
            dists[[i, j]] = t.distance(c);
        }
    }
    dists
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    /// Matched (row, column) pairs in the order they were claimed
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Greedy row-wise assignment.
///
/// Every row is paired with its arg-min column (first minimum on ties). Rows
/// claim their column in ascending order of that minimum, stable on ties,
/// and a row or column that is already used is skipped. A row whose best
/// column was taken does not fall back to its second choice.
pub fn greedy_assignment(cost_matrix: &Array2<f64>) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_rows: vec![],
            unmatched_cols: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: vec![],
        };
    }

    let mut candidates: Vec<(usize, usize, f64)> = cost_matrix
        .outer_iter()
        .enumerate()
        .map(|(row, dists)| {
            let (col, min) = dists
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |best, (j, &d)| if d < best.1 { (j, d) } else { best });
            (row, col, min)
        })
        .collect();
    candidates.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut used_rows = vec![false; num_rows];
    let mut used_cols = vec![false; num_cols];
    let mut matches = Vec::new();

    for (row, col, _) in candidates {
        if used_rows[row] || used_cols[col] {
            continue;
        }
        used_rows[row] = true;
        used_cols[col] = true;
        matches.push((row, col));
    }

    let unmatched_rows = (0..num_rows).filter(|&r| !used_rows[r]).collect();
    let unmatched_cols = (0..num_cols).filter(|&c| !used_cols[c]).collect();

    AssignmentResult {
        matches,
        unmatched_rows,
        unmatched_cols,
    }
}
