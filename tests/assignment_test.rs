use bytetrack_core::tracker::{AssignmentResult, linear_assignment};
use ndarray::Array2;

/// Deterministic pseudo-random costs in [0, 1).
fn cost_matrix(rows: usize, cols: usize, seed: u32) -> Array2<f32> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    Array2::from_shape_fn((rows, cols), |_| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (state >> 8) as f32 / (1u32 << 24) as f32
    })
}

/// Best value of `sum(cost - thresh)` over all partial matchings.
///
/// With a finite threshold the padded problem charges `thresh` for leaving a
/// row and a column apart, so this is the quantity the solver minimizes.
fn brute_force_partial(cost: &Array2<f32>, thresh: f32) -> f64 {
    fn search(cost: &Array2<f32>, thresh: f64, row: usize, used: &mut [bool], acc: f64, best: &mut f64) {
        if row == cost.nrows() {
            *best = best.min(acc);
            return;
        }
        search(cost, thresh, row + 1, used, acc, best);
        for col in 0..cost.ncols() {
            if !used[col] {
                used[col] = true;
                let gain = f64::from(cost[[row, col]]) - thresh;
                search(cost, thresh, row + 1, used, acc + gain, best);
                used[col] = false;
            }
        }
    }

    let mut best = 0.0;
    let mut used = vec![false; cost.ncols()];
    search(cost, f64::from(thresh), 0, &mut used, 0.0, &mut best);
    best
}

/// Cheapest matching that covers the smaller side completely.
fn brute_force_complete(cost: &Array2<f32>) -> f64 {
    fn search(cost: &Array2<f32>, row: usize, used: &mut [bool], left: usize, acc: f64, best: &mut f64) {
        if left == 0 {
            *best = best.min(acc);
            return;
        }
        if cost.nrows() - row < left {
            return;
        }
        if cost.nrows() - row > left {
            search(cost, row + 1, used, left, acc, best);
        }
        for col in 0..cost.ncols() {
            if !used[col] {
                used[col] = true;
                let c = f64::from(cost[[row, col]]);
                search(cost, row + 1, used, left - 1, acc + c, best);
                used[col] = false;
            }
        }
    }

    let mut best = f64::INFINITY;
    let mut used = vec![false; cost.ncols()];
    let size = cost.nrows().min(cost.ncols());
    search(cost, 0, &mut used, size, 0.0, &mut best);
    best
}

fn assert_partition(result: &AssignmentResult, rows: usize, cols: usize) {
    let mut row_seen = vec![0; rows];
    let mut col_seen = vec![0; cols];
    for &(r, c) in &result.matches {
        row_seen[r] += 1;
        col_seen[c] += 1;
    }
    for &r in &result.unmatched_tracks {
        row_seen[r] += 1;
    }
    for &c in &result.unmatched_detections {
        col_seen[c] += 1;
    }
    assert!(row_seen.iter().all(|&n| n == 1), "rows {row_seen:?}");
    assert!(col_seen.iter().all(|&n| n == 1), "cols {col_seen:?}");
}

#[test]
fn test_thresholded_assignment_is_optimal() {
    let thresh = 0.6;
    for rows in 1..=5 {
        for cols in 1..=5 {
            for seed in 0..8 {
                let cost = cost_matrix(rows, cols, seed * 31 + (rows * 7 + cols) as u32);
                let result = linear_assignment(&cost, thresh).unwrap();
                assert_partition(&result, rows, cols);

                let value: f64 = result
                    .matches
                    .iter()
                    .map(|&(r, c)| f64::from(cost[[r, c]]) - f64::from(thresh))
                    .sum();
                let best = brute_force_partial(&cost, thresh);
                assert!(
                    (value - best).abs() < 1e-5,
                    "{rows}x{cols} seed {seed}: got {value}, best {best}"
                );
                assert!(result.matches.iter().all(|&(r, c)| cost[[r, c]] <= thresh));
            }
        }
    }
}

#[test]
fn test_unbounded_assignment_is_optimal() {
    for rows in 1..=5 {
        for cols in 1..=5 {
            for seed in 0..8 {
                let cost = cost_matrix(rows, cols, seed * 17 + (rows * 5 + cols) as u32);
                let result = linear_assignment(&cost, f32::INFINITY).unwrap();
                assert_partition(&result, rows, cols);
                assert_eq!(result.matches.len(), rows.min(cols));

                let best = brute_force_complete(&cost);
                assert!(
                    (result.cost - best).abs() < 1e-5,
                    "{rows}x{cols} seed {seed}: got {}, best {best}",
                    result.cost
                );
            }
        }
    }
}

#[test]
fn test_ties_still_give_a_valid_assignment() {
    let cost = Array2::from_elem((4, 4), 0.25f32);
    let result = linear_assignment(&cost, 0.8).unwrap();
    assert_partition(&result, 4, 4);
    assert_eq!(result.matches.len(), 4);

    let cost = Array2::from_elem((3, 5), 0.9f32);
    let result = linear_assignment(&cost, 0.8).unwrap();
    assert!(result.matches.is_empty());
    assert_eq!(result.unmatched_tracks, vec![0, 1, 2]);
    assert_eq!(result.unmatched_detections, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_larger_square_problems_are_optimal() {
    for size in [6, 7] {
        for seed in 0..3 {
            let cost = cost_matrix(size, size, seed + size as u32 * 101);
            let result = linear_assignment(&cost, f32::INFINITY).unwrap();
            assert_partition(&result, size, size);
            assert_eq!(result.matches.len(), size);
            let best = brute_force_complete(&cost);
            assert!((result.cost - best).abs() < 1e-5, "{size}x{size} seed {seed}");
        }
    }
}

#[test]
fn test_integer_costs_with_many_ties() {
    // Costs drawn from a handful of values make the reduction phases hit
    // equal minima constantly.
    let cost = Array2::from_shape_fn((6, 6), |(i, j)| ((i * 3 + j * 5) % 4) as f32);
    let result = linear_assignment(&cost, f32::INFINITY).unwrap();
    assert_partition(&result, 6, 6);
    assert_eq!(result.cost, brute_force_complete(&cost));

    let result = linear_assignment(&cost, 1.5).unwrap();
    assert_partition(&result, 6, 6);
    let value: f64 = result
        .matches
        .iter()
        .map(|&(r, c)| f64::from(cost[[r, c]]) - 1.5)
        .sum();
    assert!((value - brute_force_partial(&cost, 1.5)).abs() < 1e-9);
}
