// scenarize_core/src/planning.rs

//! Planning-problem synthesis: ego selection, initial state and goal-region
//! geometry.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{OrientedBox, Polygon};
use crate::prototype::ScenarioPrototype;
use crate::types::{AgentId, AgentType, TimeStep};
use crate::window::EgoWindow;

/// Offset added to an ego's agent id to form its planning-problem id.
pub const PLANNING_PROBLEM_ID_OFFSET: u64 = 100_000;

/// Closed interval of admissible goal values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T: Copy + PartialOrd> Interval<T> {
    pub fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, value: T) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Admissible terminal positions of a planning problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalShape {
    /// A longitudinal section of the lane the ego ends on.
    Lane(Polygon),
    /// Fallback oriented box around the ego's final state.
    Box(OrientedBox),
}

impl GoalShape {
    pub fn area(&self) -> f64 {
        match self {
            GoalShape::Lane(polygon) => polygon.area(),
            GoalShape::Box(b) => b.area(),
        }
    }

    /// A representative point inside the shape.
    pub fn reference_point(&self) -> nalgebra::Point2<f64> {
        match self {
            GoalShape::Lane(polygon) => polygon.centroid(),
            GoalShape::Box(b) => b.center,
        }
    }
}

/// The admissible terminal state set of a planning problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRegion {
    pub position: GoalShape,
    /// Admissible final heading in radians.
    pub orientation: Interval<f64>,
    /// Admissible final velocity.
    pub velocity: Interval<f64>,
    /// Admissible final time step.
    pub time_steps: Interval<TimeStep>,
}

/// Initial kinematic state of a planning problem. Higher-order terms the
/// recording does not constrain are zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub time_step: TimeStep,
    pub position: nalgebra::Point2<f64>,
    pub orientation: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub yaw_rate: f64,
    pub slip_angle: f64,
}

/// One planning problem: where the ego starts and which terminal set it must
/// reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningProblem {
    pub id: u64,
    pub initial_state: InitialState,
    pub goal: GoalRegion,
}

/// Build planning problems for a window.
///
/// Returns the window along with the problems; when egos are removed from the
/// obstacle pool the returned window's attribute table is already reduced, so
/// ownership of the tables stays unambiguous.
pub trait PlanningProblemSynthesizer: Send {
    fn synthesize(
        &mut self,
        window: EgoWindow,
        prototype: &ScenarioPrototype,
    ) -> (EgoWindow, Vec<PlanningProblem>);
}

/// Synthesizer that never emits planning problems.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProblems;

impl PlanningProblemSynthesizer for NoProblems {
    fn synthesize(
        &mut self,
        window: EgoWindow,
        _prototype: &ScenarioPrototype,
    ) -> (EgoWindow, Vec<PlanningProblem>) {
        (window, Vec::new())
    }
}

/// Build one planning problem per designated ego.
///
/// The ego's first recorded state becomes the initial state, its final state
/// the center of the goal region. Goal intervals are centered on the final
/// state with configurable half ranges; the goal position is the lane section
/// around the final position, or an enlarged vehicle box when the section is
/// smaller. Egos whose final position is off any drivable surface are
/// skipped.
#[derive(Debug, Clone, Copy)]
pub struct EgoProblemSynthesizer {
    /// Keep the ego as a regular dynamic obstacle in the scenario.
    pub keep_ego: bool,
    pub orientation_half_range: f64,
    pub velocity_half_range: f64,
    pub time_step_half_range: TimeStep,
}

impl Default for EgoProblemSynthesizer {
    fn default() -> Self {
        Self {
            keep_ego: false,
            orientation_half_range: 0.2,
            velocity_half_range: 10.0,
            time_step_half_range: 25,
        }
    }
}

impl EgoProblemSynthesizer {
    pub fn new(keep_ego: bool) -> Self {
        Self {
            keep_ego,
            ..Self::default()
        }
    }
}

impl PlanningProblemSynthesizer for EgoProblemSynthesizer {
    fn synthesize(
        &mut self,
        mut ego_window: EgoWindow,
        prototype: &ScenarioPrototype,
    ) -> (EgoWindow, Vec<PlanningProblem>) {
        let mut problems = Vec::new();
        let mut consumed = Vec::new();
        let window_end = ego_window.window.end_step().unwrap_or(0);

        for ego in ego_window.ego_ids.clone() {
            let (Some(track), Some(meta)) = (
                ego_window.window.track(ego),
                ego_window.window.agent_meta(ego),
            ) else {
                continue;
            };
            if track.len() < 2 {
                continue;
            }
            let (_, first) = track.first();
            let (final_step, last) = track.last();

            let orientation = Interval::new(
                last.orientation - self.orientation_half_range,
                last.orientation + self.orientation_half_range,
            );
            let velocity = Interval::new(
                last.velocity - self.velocity_half_range,
                last.velocity + self.velocity_half_range,
            );
            let final_time_step = (final_step + self.time_step_half_range).min(window_end);
            let time_steps = Interval::new(0, final_time_step);

            let fallback = OrientedBox {
                center: last.position,
                length: meta.length + 2.0,
                width: (meta.width + 1.0).max(3.5),
                orientation: last.orientation,
            };

            let lanelet_ids = prototype.scene.find_lanelets_at(last.position);
            let Some(lanelet) = lanelet_ids
                .first()
                .and_then(|id| prototype.scene.lanelet(*id))
            else {
                debug!(ego = %ego, "final state is off the road, skipping ego candidate");
                continue;
            };

            // The goal region must never be smaller than the vehicle box.
            let position = match lanelet.cut_section(last.position, meta.length + 2.0) {
                Some(section) if section.area() >= fallback.area() => GoalShape::Lane(section),
                _ => GoalShape::Box(fallback),
            };

            problems.push(PlanningProblem {
                id: ego.0 as u64 + PLANNING_PROBLEM_ID_OFFSET,
                initial_state: InitialState {
                    time_step: 0,
                    position: first.position,
                    orientation: first.orientation,
                    velocity: first.velocity,
                    acceleration: first.acceleration.unwrap_or(0.0),
                    yaw_rate: 0.0,
                    slip_angle: 0.0,
                },
                goal: GoalRegion {
                    position,
                    orientation,
                    velocity,
                    time_steps,
                },
            });
            if !self.keep_ego {
                consumed.push(ego);
            }
        }

        for ego in consumed {
            ego_window.window.remove_meta(ego);
        }
        (ego_window, problems)
    }
}

/// Draw `num_problems` egos uniformly from the window's qualifying agents and
/// delegate to [`EgoProblemSynthesizer`]. Only agents of the designated role
/// with more than one sample qualify; when fewer than `num_problems` qualify,
/// no planning problems are emitted at all.
pub struct RandomEgoSynthesizer<R: Rng + Send> {
    inner: EgoProblemSynthesizer,
    num_problems: usize,
    role: AgentType,
    rng: R,
}

impl<R: Rng + Send> RandomEgoSynthesizer<R> {
    pub fn new(inner: EgoProblemSynthesizer, num_problems: usize, rng: R) -> Self {
        Self {
            inner,
            num_problems,
            role: AgentType::Car,
            rng,
        }
    }
}

impl<R: Rng + Send> PlanningProblemSynthesizer for RandomEgoSynthesizer<R> {
    fn synthesize(
        &mut self,
        ego_window: EgoWindow,
        prototype: &ScenarioPrototype,
    ) -> (EgoWindow, Vec<PlanningProblem>) {
        let candidates: Vec<AgentId> = ego_window
            .window
            .meta()
            .iter()
            .filter(|(id, meta)| {
                meta.agent_type == self.role
                    && ego_window.window.track(**id).map_or(false, |t| t.len() > 1)
            })
            .map(|(id, _)| *id)
            .collect();

        if candidates.len() < self.num_problems {
            debug!(
                available = candidates.len(),
                requested = self.num_problems,
                "not enough ego candidates, emitting no planning problems"
            );
            return (ego_window, Vec::new());
        }

        let egos: Vec<AgentId> = candidates
            .choose_multiple(&mut self.rng, self.num_problems)
            .copied()
            .collect();
        let window = EgoWindow::with_egos(ego_window.window, egos);
        self.inner.synthesize(window, prototype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::testing::straight_prototype;
    use crate::types::AgentId;
    use crate::window::testing::car_window;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// One car driving straight down the test lane, well inside the map.
    fn ego_window() -> EgoWindow {
        let window = car_window(&[(0, &[0, 1, 2, 3, 4])], 1.0);
        EgoWindow::with_egos(window, vec![AgentId(0)])
    }

    #[test]
    fn problems_are_anchored_at_first_and_final_state() {
        let prototype = straight_prototype(100.0);
        let mut synthesizer = EgoProblemSynthesizer::new(true);
        let (_, problems) = synthesizer.synthesize(ego_window(), &prototype);
        assert_eq!(problems.len(), 1);
        let problem = &problems[0];
        assert_eq!(problem.id, 100_000);
        assert_eq!(problem.initial_state.position.x, 0.0);
        assert_eq!(problem.initial_state.velocity, 1.0);
        assert_eq!(problem.initial_state.yaw_rate, 0.0);
        assert_eq!(problem.initial_state.slip_angle, 0.0);
        assert!(problem.goal.orientation.contains(0.0));
        assert!(problem.goal.velocity.contains(1.0));
        // Final track step 4 plus the default half range, within window end 4.
        assert_eq!(problem.goal.time_steps.end, 4);
    }

    #[test]
    fn keep_ego_retains_the_obstacle_row() {
        let prototype = straight_prototype(100.0);
        let mut synthesizer = EgoProblemSynthesizer::new(true);
        let (window, problems) = synthesizer.synthesize(ego_window(), &prototype);
        assert_eq!(problems.len(), 1);
        assert!(window.window.agent_meta(AgentId(0)).is_some());
    }

    #[test]
    fn removing_the_ego_reduces_the_attribute_table() {
        let prototype = straight_prototype(100.0);
        let mut synthesizer = EgoProblemSynthesizer::new(false);
        let (window, problems) = synthesizer.synthesize(ego_window(), &prototype);
        assert_eq!(problems.len(), 1);
        assert!(window.window.agent_meta(AgentId(0)).is_none());
        // The states stay; only the attribute row is gone.
        assert!(window.window.track(AgentId(0)).is_some());
    }

    #[test]
    fn off_road_final_state_skips_the_candidate() {
        // The lane ends at x = 3; the ego's final position x = 4 is off-road.
        let prototype = straight_prototype(3.0);
        let mut synthesizer = EgoProblemSynthesizer::new(false);
        let (window, problems) = synthesizer.synthesize(ego_window(), &prototype);
        assert!(problems.is_empty());
        // A skipped ego is never removed from the obstacle pool.
        assert!(window.window.agent_meta(AgentId(0)).is_some());
    }

    #[test]
    fn goal_region_is_never_smaller_than_the_vehicle_box() {
        let prototype = straight_prototype(100.0);
        let mut synthesizer = EgoProblemSynthesizer::new(true);
        let (_, problems) = synthesizer.synthesize(ego_window(), &prototype);
        let goal = &problems[0].goal;
        // Fallback box: (5 + 2) x max(2 + 1, 3.5).
        let fallback_area = 7.0 * 3.5;
        assert!(goal.position.area() >= fallback_area);
    }

    #[test]
    fn two_egos_make_two_problems() {
        let window = car_window(&[(0, &[0, 1, 2, 3]), (1, &[0, 1, 2, 3])], 1.0);
        let ego_window = EgoWindow::with_egos(window, vec![AgentId(0), AgentId(1)]);
        let prototype = straight_prototype(100.0);
        let mut synthesizer = EgoProblemSynthesizer::new(false);
        let (_, problems) = synthesizer.synthesize(ego_window, &prototype);
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].id, 100_000);
        assert_eq!(problems[1].id, 100_001);
    }

    #[test]
    fn random_synthesizer_requires_enough_candidates() {
        let window = car_window(&[(0, &[0, 1, 2]), (1, &[0, 1, 2])], 1.0);
        let prototype = straight_prototype(100.0);
        let rng = ChaCha8Rng::seed_from_u64(3);
        let mut synthesizer =
            RandomEgoSynthesizer::new(EgoProblemSynthesizer::new(false), 3, rng);
        let (_, problems) =
            synthesizer.synthesize(EgoWindow::new(window), &prototype);
        assert!(problems.is_empty());
    }

    #[test]
    fn random_synthesizer_samples_the_requested_count() {
        let window = car_window(&[(0, &[0, 1, 2]), (1, &[0, 1, 2]), (2, &[0, 1, 2])], 1.0);
        let prototype = straight_prototype(100.0);
        let rng = ChaCha8Rng::seed_from_u64(3);
        let mut synthesizer =
            RandomEgoSynthesizer::new(EgoProblemSynthesizer::new(false), 2, rng);
        let (window, problems) =
            synthesizer.synthesize(EgoWindow::new(window), &prototype);
        assert_eq!(problems.len(), 2);
        // Both consumed egos left the attribute table.
        assert_eq!(window.window.meta().len(), 1);
    }
}
