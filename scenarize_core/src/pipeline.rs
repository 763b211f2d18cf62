// scenarize_core/src/pipeline.rs

//! The producer / filter / consumer pipeline that turns window streams into
//! persisted scenarios.
//!
//! A [`Job`] carries everything one scenario needs, so jobs are the unit of
//! parallelism: no shared mutable state survives a job past consumption.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::planning::{PlanningProblem, PlanningProblemSynthesizer};
use crate::prototype::{PrototypeBuilder, ScenarioPrototype};
use crate::scenario::{
    DynamicObstacle, ObstacleShape, Scenario, ScenarioId, TimedState, OBSTACLE_ID_OFFSET,
};
use crate::scene::RecordingMeta;
use crate::signal::{
    empty_signal_series, infer_indicators, SignalState, DEFAULT_BLINK_PADDING,
    INDICATOR_TURN_THRESHOLD,
};
use crate::types::{AgentId, AgentMeta, AgentType, TimeStep};
use crate::window::{EgoWindow, Track, Window};
use crate::windowing::WindowStream;

/// The unit handed from producer to consumer: window tables, the scenario
/// prototype and the synthesized planning problems. Consumed exactly once.
#[derive(Debug, Clone)]
pub struct Job {
    pub window: Window,
    pub prototype: ScenarioPrototype,
    pub problems: Vec<PlanningProblem>,
}

/// Lazily builds jobs from a window stream.
///
/// Production is sequential and deterministic; an optional maximum bounds how
/// many jobs are produced (not how many are eventually written). Windows
/// whose map lookup fails are skipped and counted, never fatal to the stream.
pub struct JobProducer {
    prototype_builder: PrototypeBuilder,
    synthesizer: Box<dyn PlanningProblemSynthesizer>,
    windows: WindowStream,
    max_jobs: Option<usize>,
    produced: usize,
    skipped: usize,
}

impl JobProducer {
    pub fn new(
        prototype_builder: PrototypeBuilder,
        synthesizer: Box<dyn PlanningProblemSynthesizer>,
        windows: WindowStream,
        max_jobs: Option<usize>,
    ) -> Self {
        Self {
            prototype_builder,
            synthesizer,
            windows,
            max_jobs,
            produced: 0,
            skipped: 0,
        }
    }

    /// Windows dropped because their prototype could not be built.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for JobProducer {
    type Item = Job;

    fn next(&mut self) -> Option<Job> {
        loop {
            if let Some(max) = self.max_jobs {
                if self.produced >= max {
                    return None;
                }
            }
            let (ego_window, meta): (EgoWindow, RecordingMeta) = self.windows.next()?;
            let prototype = match self.prototype_builder.build(&ego_window.window, &meta) {
                Ok(prototype) => prototype,
                Err(err) => {
                    warn!(%err, location = %meta.location, "skipping window");
                    self.skipped += 1;
                    continue;
                }
            };
            let (ego_window, problems) = self.synthesizer.synthesize(ego_window, &prototype);
            self.produced += 1;
            return Some(Job {
                window: ego_window.window,
                prototype,
                problems,
            });
        }
    }
}

/// Job predicate; rejected jobs are dropped before consumption.
pub type JobFilter = Box<dyn Fn(&Job) -> bool + Send + Sync>;

pub fn accept_all() -> JobFilter {
    Box::new(|_| true)
}

/// Reject jobs whose planning-problem set is empty. Used when goal-directed
/// windows are expected (rolling and time-slice modes).
pub fn reject_empty_problems() -> JobFilter {
    Box::new(|job: &Job| !job.problems.is_empty())
}

/// How strictly planning problems must be routable on the static map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutabilityCheck {
    NoCheck,
    #[default]
    Strict,
}

/// Route-existence collaborator.
pub trait RouteOracle: Send + Sync {
    /// Number of route candidates from the problem's initial state to its
    /// goal region on the prototype's map.
    fn count_routes(&self, prototype: &ScenarioPrototype, problem: &PlanningProblem) -> usize;
}

/// Rejects jobs containing any planning problem without a route.
pub struct RoutabilityFilter {
    check: RoutabilityCheck,
    oracle: Arc<dyn RouteOracle>,
}

impl RoutabilityFilter {
    pub fn new(check: RoutabilityCheck, oracle: Arc<dyn RouteOracle>) -> Self {
        Self { check, oracle }
    }

    pub fn accepts(&self, job: &Job) -> bool {
        if self.check == RoutabilityCheck::NoCheck {
            return true;
        }
        for problem in &job.problems {
            if self.oracle.count_routes(&job.prototype, problem) == 0 {
                debug!(problem = problem.id, "planning problem is unroutable");
                return false;
            }
        }
        true
    }
}

/// Compose the standard filter chain: optionally require planning problems,
/// optionally require routability.
pub fn build_job_filter(
    expect_problems: bool,
    routability: Option<RoutabilityFilter>,
) -> JobFilter {
    let base: JobFilter = if expect_problems {
        reject_empty_problems()
    } else {
        accept_all()
    };
    match routability {
        Some(filter) => Box::new(move |job: &Job| base(job) && filter.accepts(job)),
        None => base,
    }
}

/// Persistence collaborator. Writing the same scenario twice overwrites,
/// never prompts.
pub trait ScenarioWriter: Send + Sync {
    fn write(&self, scenario: &Scenario, problems: &[PlanningProblem]) -> Result<()>;
}

/// What happened to one consumed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Written(ScenarioId),
    /// The materialized scenario had no dynamic obstacles; nothing was
    /// written.
    DroppedEmpty,
}

/// Materializes jobs into scenarios and hands them to the writer.
pub struct JobConsumer<W: ScenarioWriter> {
    writer: W,
    /// Renumber time steps so the scenario starts at zero.
    pub obstacles_start_at_zero: bool,
    /// Derive turn-indicator series from trajectory curvature.
    pub infer_turn_indicators: bool,
    pub blink_padding: [i64; 2],
}

impl<W: ScenarioWriter> JobConsumer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            obstacles_start_at_zero: false,
            infer_turn_indicators: false,
            blink_padding: DEFAULT_BLINK_PADDING,
        }
    }

    pub fn consume(&self, job: Job) -> Result<ConsumeOutcome> {
        let scenario = self.build_scenario(&job);
        if scenario.obstacles.is_empty() {
            // Nothing to write; the run continues as if the job never
            // existed.
            debug!(id = %scenario.id, "scenario has no dynamic obstacles, dropping");
            return Ok(ConsumeOutcome::DroppedEmpty);
        }
        self.writer.write(&scenario, &job.problems)?;
        Ok(ConsumeOutcome::Written(scenario.id))
    }

    fn build_scenario(&self, job: &Job) -> Scenario {
        let offset = if self.obstacles_start_at_zero {
            job.window.start_step().unwrap_or(0)
        } else {
            0
        };

        let mut obstacles = Vec::new();
        for (agent, meta) in job.window.meta() {
            let Some(track) = job.window.track(*agent) else {
                continue;
            };
            if track.len() < 2 {
                continue;
            }
            obstacles.push(self.build_obstacle(*agent, meta, track, offset));
        }

        let mut id = job.prototype.id.clone();
        id.cooperative = job.problems.len() > 1;
        Scenario {
            id,
            dt: job.prototype.dt,
            scene: job.prototype.scene.clone(),
            obstacles,
        }
    }

    fn build_obstacle(
        &self,
        agent: AgentId,
        meta: &AgentMeta,
        track: &Track,
        offset: TimeStep,
    ) -> DynamicObstacle {
        let shape = obstacle_shape(meta);
        let states: Vec<TimedState> = track
            .iter()
            .map(|(t, state)| TimedState {
                time_step: t - offset,
                state: *state,
            })
            .collect();
        let initial_state = states[0];
        let trajectory = states[1..].to_vec();
        let first_step = initial_state.time_step;
        let final_step = states[states.len() - 1].time_step;

        let signal_series = if self.infer_turn_indicators {
            self.signal_series(meta, track, first_step, final_step)
        } else {
            Vec::new()
        };

        DynamicObstacle {
            id: agent.0 as u64 + OBSTACLE_ID_OFFSET,
            agent_type: meta.agent_type,
            shape,
            initial_state,
            trajectory,
            signal_series,
        }
    }

    fn signal_series(
        &self,
        meta: &AgentMeta,
        track: &Track,
        first_step: TimeStep,
        final_step: TimeStep,
    ) -> Vec<SignalState> {
        if meta.agent_type.is_vehicle() {
            infer_indicators(
                &track.positions(),
                &track.velocities(),
                self.blink_padding,
                first_step,
                final_step,
                INDICATOR_TURN_THRESHOLD,
            )
        } else {
            empty_signal_series(first_step, final_step)
        }
    }
}

/// Role-specific obstacle footprints. Pedestrians and bicycles get fixed
/// surveyed shapes; everything else uses its recorded extents.
fn obstacle_shape(meta: &AgentMeta) -> ObstacleShape {
    match meta.agent_type {
        AgentType::Pedestrian => ObstacleShape::Circle { radius: 0.35 },
        AgentType::Bicycle => ObstacleShape::Rectangle {
            length: 1.8,
            width: 0.6,
        },
        _ => ObstacleShape::Rectangle {
            length: meta.length,
            width: meta.width,
        },
    }
}
