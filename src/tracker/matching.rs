//! Matching utilities for multi-object tracking.

use crate::tracker::rect::{Rect, iou_batch};
use ndarray::Array2;
use thiserror::Error;

/// Errors reported by [`linear_assignment`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssignmentError {
    #[error("cost matrix entry ({row}, {col}) is not finite")]
    NonFiniteCost { row: usize, col: usize },

    #[error("assignment threshold {0} is not a number")]
    InvalidThreshold(f32),

    #[error("solver failed: {0}")]
    Solver(String),
}

impl From<lapjv::LapJVError> for AssignmentError {
    fn from(err: lapjv::LapJVError) -> Self {
        Self::Solver(err.to_string())
    }
}

/// Detection input for the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box in image pixels
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
}

impl Detection {
    /// Create a detection from a TLWH box `(x, y, w, h)`.
    pub fn new(x: f32, y: f32, width: f32, height: f32, score: f32) -> Self {
        Self {
            bbox: Rect::new(x, y, width, height),
            score,
        }
    }

    /// Create a detection from a TLBR box `(x1, y1, x2, y2)`.
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self { bbox, score }
    }
}

/// Compute IoU distance matrix (`1 - iou`) between tracks and detections.
///
/// If either side is empty the matrix is empty, but its shape still records
/// the length of the other side.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    let mut dists = iou_batch(track_boxes, det_boxes);
    dists.mapv_inplace(|iou| 1.0 - iou);
    dists
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    /// Matched `(row, col)` pairs, in row order.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
    /// Sum of the unpadded costs over `matches`.
    pub cost: f64,
}

impl AssignmentResult {
    fn all_unmatched(rows: usize, cols: usize) -> Self {
        Self {
            matches: Vec::new(),
            unmatched_tracks: (0..rows).collect(),
            unmatched_detections: (0..cols).collect(),
            cost: 0.0,
        }
    }
}

/// Solve the rectangular assignment for `cost_matrix`, keeping only pairs
/// whose cost does not exceed `thresh`.
///
/// Rows are tracks and columns are detections. Every row and column index
/// appears exactly once, either in `matches` or in the matching unmatched
/// list. Pass `f32::INFINITY` to disable the threshold.
pub fn linear_assignment(
    cost_matrix: &Array2<f32>,
    thresh: f32,
) -> Result<AssignmentResult, AssignmentError> {
    if thresh.is_nan() {
        return Err(AssignmentError::InvalidThreshold(thresh));
    }

    let (num_rows, num_cols) = cost_matrix.dim();
    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult::all_unmatched(num_rows, num_cols));
    }

    if let Some(((row, col), _)) = cost_matrix.indexed_iter().find(|(_, c)| !c.is_finite()) {
        return Err(AssignmentError::NonFiniteCost { row, col });
    }

    let extended = extend_cost(cost_matrix, thresh);
    let (row_to_col, _) = lapjv::lapjv(&extended)?;

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];
    let mut cost = 0.0;

    for (row_idx, &col_idx) in row_to_col.iter().take(num_rows).enumerate() {
        if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
            matches.push((row_idx, col_idx));
            unmatched_detections_mask[col_idx] = false;
            cost += f64::from(cost_matrix[[row_idx, col_idx]]);
        } else {
            unmatched_tracks.push(row_idx);
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    Ok(AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
        cost,
    })
}

/// Build the square problem handed to the solver.
///
/// The `m x n` costs sit in the top-left block. When padding is needed the
/// matrix grows to `(m + n) x (m + n)`: the bottom-right block is zero so
/// dummy rows and columns pair up for free, and the two off-diagonal blocks
/// hold `thresh / 2` (or `max + 1` without a finite threshold). Leaving a real
/// row and a real column both unmatched then costs exactly `thresh`, so a real
/// pair is only worth taking when its cost is below it.
fn extend_cost(cost_matrix: &Array2<f32>, thresh: f32) -> Array2<f64> {
    let (num_rows, num_cols) = cost_matrix.dim();
    let costs = cost_matrix.mapv(f64::from);

    if num_rows == num_cols && thresh.is_infinite() {
        return costs;
    }

    let pad = if thresh.is_finite() {
        f64::from(thresh) / 2.0
    } else {
        costs.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 1.0
    };

    let size = num_rows + num_cols;
    let mut extended = Array2::from_elem((size, size), pad);
    for i in num_rows..size {
        for j in num_cols..size {
            extended[[i, j]] = 0.0;
        }
    }
    for ((i, j), &c) in costs.indexed_iter() {
        extended[[i, j]] = c;
    }
    extended
}
