// scenarize_core/src/signal.rs

//! Turn-indicator activation intervals derived from the curvature profile.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::classify::{
    argmax_first, argmin_first, classify_trajectory, TrajectoryClass, DEFAULT_MIN_VELOCITY,
};
use crate::types::TimeStep;

/// Indicator activation padding in time steps: the first entry is how long the
/// indicator stays on before the turn apex, the second how long after.
pub const DEFAULT_BLINK_PADDING: [i64; 2] = [40, 30];

/// The indicator path uses a slightly lower turn threshold than plain
/// classification, so shallow but deliberate turns still blink.
pub const INDICATOR_TURN_THRESHOLD: f64 = 0.02;

/// Turn-indicator state of one agent at one time step. After conflict
/// resolution at most one indicator is ever active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalState {
    pub time_step: TimeStep,
    pub indicator_left: bool,
    pub indicator_right: bool,
}

/// An all-off signal series covering `first_step..=final_step`.
pub fn empty_signal_series(first_step: TimeStep, final_step: TimeStep) -> Vec<SignalState> {
    (first_step..=final_step)
        .map(|time_step| SignalState {
            time_step,
            indicator_left: false,
            indicator_right: false,
        })
        .collect()
}

/// Derive the indicator series for one trajectory.
///
/// The trajectory's sample `k` is taken to be at time step `first_step + k`.
/// For a single turn the indicator is active over the padded apex interval,
/// clipped to the series bounds. When the trajectory contains both a left and
/// a right turn, the two padded intervals are computed independently and
/// overlaps are resolved in favor of the temporally closer apex; exactly one
/// indicator survives at every overlapping step.
pub fn infer_indicators(
    positions: &[Point2<f64>],
    velocities: &[f64],
    blink_padding: [i64; 2],
    first_step: TimeStep,
    final_step: TimeStep,
    turn_threshold: f64,
) -> Vec<SignalState> {
    let (class, curvature) = classify_trajectory(
        positions,
        velocities,
        DEFAULT_MIN_VELOCITY,
        turn_threshold,
    );

    let (apex_left, apex_right) = match (argmax_first(&curvature), argmin_first(&curvature)) {
        (Some(max_idx), Some(min_idx)) => (
            first_step + max_idx as TimeStep,
            first_step + min_idx as TimeStep,
        ),
        _ => return empty_signal_series(first_step, final_step),
    };

    match class {
        TrajectoryClass::Straight => empty_signal_series(first_step, final_step),
        TrajectoryClass::Left | TrajectoryClass::Right => {
            let apex = if class == TrajectoryClass::Left {
                apex_left
            } else {
                apex_right
            };
            let start = first_step.max(apex - blink_padding[0]);
            let end = final_step.min(apex + blink_padding[1]);
            (first_step..=final_step)
                .map(|i| {
                    let active = start <= i && i <= end;
                    SignalState {
                        time_step: i,
                        indicator_left: class == TrajectoryClass::Left && active,
                        indicator_right: class == TrajectoryClass::Right && active,
                    }
                })
                .collect()
        }
        TrajectoryClass::Both => {
            let start_left = first_step.max(apex_left - blink_padding[0]);
            let end_left = final_step.min(apex_left + blink_padding[0]);
            let start_right = first_step.max(apex_right - blink_padding[1]);
            let end_right = final_step.min(apex_right + blink_padding[1]);
            (first_step..=final_step)
                .map(|i| {
                    let mut left = start_left <= i && i <= end_left;
                    let mut right = start_right <= i && i <= end_right;
                    if left && right {
                        left = (end_left > start_right && end_left - i > i - start_right)
                            || (i - start_left >= end_right - i);
                        right = !left;
                    }
                    SignalState {
                        time_step: i,
                        indicator_left: left,
                        indicator_right: right,
                    }
                })
                .collect()
        }
    }
}
