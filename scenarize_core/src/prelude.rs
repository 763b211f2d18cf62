// scenarize_core/src/prelude.rs

// --- Collaborator contracts (what adapters implement) ---
pub use crate::pipeline::{RouteOracle, ScenarioWriter};
pub use crate::prototype::{MetaScenarioBuilder, PrototypeBuilder};
pub use crate::scene::{RecordingSource, StaticSceneProvider};
pub use crate::windowing::WindowGenerator;

// --- Core data structures (the "nouns" of the pipeline) ---
pub use crate::error::{ConvertError, Result};
pub use crate::planning::PlanningProblem;
pub use crate::scenario::{DynamicObstacle, Scenario, ScenarioId};
pub use crate::scene::{RecordingMeta, StaticScene};
pub use crate::types::{AgentId, AgentMeta, AgentType, KinematicState, TimeStep};
pub use crate::window::{EgoWindow, Track, Window};

// --- Pipeline pieces (exported for drivers) ---
pub use crate::pipeline::{
    build_job_filter, ConsumeOutcome, Job, JobConsumer, JobProducer, RoutabilityCheck,
    RoutabilityFilter,
};
pub use crate::runner::{RunSummary, WorkerRunner};
pub use crate::windowing::GeneratorPolicy;
