// scenarize_core/src/classify.rs

//! Turning-behavior classification from a trajectory's curvature profile.
//!
//! The signed curvature at every sample is estimated from finite differences
//! of the position sequence, clamped to zero for near-stationary samples and
//! smoothed with an iterated moving average before thresholding the extrema.

use nalgebra::Point2;

/// Curvatures for samples slower than this are clamped to zero, so creeping
/// or standing agents never register as turning.
pub const DEFAULT_MIN_VELOCITY: f64 = 1.0;

/// Minimum absolute smoothed curvature for a trajectory to count as a turn.
pub const DEFAULT_TURN_THRESHOLD: f64 = 0.03;

const SMOOTHING_ITERATIONS: usize = 2;
const SMOOTHING_HALF_WIDTH: usize = 13;

/// Turning behavior of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryClass {
    Left,
    Right,
    Straight,
    /// Contains both a left and a right turn.
    Both,
}

/// Classify a trajectory and return the smoothed curvature profile it was
/// classified from. Positive curvature is a left turn.
///
/// `positions` and `velocities` must be parallel, one entry per sample.
pub fn classify_trajectory(
    positions: &[Point2<f64>],
    velocities: &[f64],
    min_velocity: f64,
    turn_threshold: f64,
) -> (TrajectoryClass, Vec<f64>) {
    let mut c = curvature(positions);
    for (ci, v) in c.iter_mut().zip(velocities) {
        if v.abs() < min_velocity {
            *ci = 0.0;
        }
    }
    let c = smooth(&c, SMOOTHING_ITERATIONS, SMOOTHING_HALF_WIDTH);
    let class = classify_curvature(&c, turn_threshold);
    (class, c)
}

fn classify_curvature(c: &[f64], turn_threshold: f64) -> TrajectoryClass {
    let min_c = c.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_c = c.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let is_right_turn = min_c <= -turn_threshold;
    let is_left_turn = max_c >= turn_threshold;

    match (is_left_turn, is_right_turn) {
        (true, false) => TrajectoryClass::Left,
        (false, true) => TrajectoryClass::Right,
        (false, false) => TrajectoryClass::Straight,
        (true, true) => TrajectoryClass::Both,
    }
}

/// Earliest index attaining the maximum value. `None` for an empty slice.
pub(crate) fn argmax_first(values: &[f64]) -> Option<usize> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    values.iter().position(|v| *v == max)
}

/// Earliest index attaining the minimum value. `None` for an empty slice.
pub(crate) fn argmin_first(values: &[f64]) -> Option<usize> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    values.iter().position(|v| *v == min)
}

/// Signed curvature per sample: `-(a x v) / |v|^3` with finite-difference
/// velocity `v` and acceleration `a`, zero wherever `|v| = 0`.
pub(crate) fn curvature(positions: &[Point2<f64>]) -> Vec<f64> {
    let n = positions.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let xs: Vec<f64> = positions.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = positions.iter().map(|p| p.y).collect();

    let dx = gradient(&xs);
    let dy = gradient(&ys);
    let ddx = gradient(&dx);
    let ddy = gradient(&dy);

    (0..n)
        .map(|i| {
            let v_squared = dx[i] * dx[i] + dy[i] * dy[i];
            if v_squared > 0.0 {
                // 2-D cross product a x v, sign flipped so left turns are
                // positive.
                -(ddx[i] * dy[i] - ddy[i] * dx[i]) / v_squared.powf(1.5)
            } else {
                0.0
            }
        })
        .collect()
}

/// Central differences in the interior, one-sided at the boundaries.
fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let mut g = vec![0.0; n];
            g[0] = values[1] - values[0];
            g[n - 1] = values[n - 1] - values[n - 2];
            for i in 1..n - 1 {
                g[i] = (values[i + 1] - values[i - 1]) / 2.0;
            }
            g
        }
    }
}

/// Iterated symmetric moving average of width `2 * half_width + 1`. The
/// boundaries replicate the edge samples, so constant signals pass through
/// unchanged.
pub(crate) fn smooth(values: &[f64], iterations: usize, half_width: usize) -> Vec<f64> {
    if iterations == 0 || values.is_empty() {
        return values.to_vec();
    }
    let n = values.len() as isize;
    let w = half_width as isize;
    let size = (2 * w + 1) as f64;

    let mut current = values.to_vec();
    for _ in 0..iterations {
        let mut next = vec![0.0; values.len()];
        for i in 0..n {
            let mut acc = 0.0;
            for j in (i - w)..=(i + w) {
                acc += current[j.clamp(0, n - 1) as usize];
            }
            next[i as usize] = acc / size;
        }
        current = next;
    }
    current
}
