// scenarize_core/src/scenario.rs

//! The persisted artifact: scenario identity, dynamic obstacles and the
//! assembled scenario handed to the persistence collaborator.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::scene::StaticScene;
use crate::signal::SignalState;
use crate::types::{AgentType, KinematicState, TimeStep};

/// Offset added to an agent id to form its dynamic-obstacle id, keeping
/// obstacle and planning-problem id ranges disjoint.
pub const OBSTACLE_ID_OFFSET: u64 = 10_000;

/// Structured scenario identifier.
///
/// Windows cut from the same map at different start or end times differ in
/// `configuration_id` or `prediction_id`, so their output files never clobber
/// each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioId {
    pub country: String,
    pub map_name: String,
    pub map_id: u32,
    /// Fixed to "T" for trajectory-backed scenarios.
    pub obstacle_behavior: String,
    /// Recording configuration id with the window's first time step appended
    /// decimally.
    pub configuration_id: u64,
    /// The window's last time step.
    pub prediction_id: TimeStep,
    /// More than one planning problem marks the scenario cooperative.
    pub cooperative: bool,
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cooperative {
            write!(f, "C-")?;
        }
        write!(
            f,
            "{}_{}-{}_{}_{}-{}",
            self.country,
            self.map_name,
            self.map_id,
            self.configuration_id,
            self.obstacle_behavior,
            self.prediction_id
        )
    }
}

/// Footprint of a dynamic obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObstacleShape {
    Rectangle { length: f64, width: f64 },
    Circle { radius: f64 },
}

/// One kinematic sample stamped with its scenario time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedState {
    pub time_step: TimeStep,
    #[serde(flatten)]
    pub state: KinematicState,
}

/// A traffic participant materialized into a scenario: shape, recorded
/// trajectory and (optionally) derived indicator signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObstacle {
    pub id: u64,
    pub agent_type: AgentType,
    pub shape: ObstacleShape,
    pub initial_state: TimedState,
    /// States after the initial one, in time order.
    pub trajectory: Vec<TimedState>,
    /// Indicator series covering the obstacle's whole lifetime; empty when
    /// indicator inference is disabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signal_series: Vec<SignalState>,
}

impl DynamicObstacle {
    pub fn final_time_step(&self) -> TimeStep {
        self.trajectory
            .last()
            .map(|s| s.time_step)
            .unwrap_or(self.initial_state.time_step)
    }
}

/// A complete scenario ready for persistence: static map plus dynamic
/// obstacles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    /// Sample interval in seconds.
    pub dt: f64,
    pub scene: Arc<StaticScene>,
    pub obstacles: Vec<DynamicObstacle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ScenarioId {
        ScenarioId {
            country: "DEU".into(),
            map_name: "TestStretch".into(),
            map_id: 1,
            obstacle_behavior: "T".into(),
            configuration_id: 2017,
            prediction_id: 352,
            cooperative: false,
        }
    }

    #[test]
    fn display_matches_the_naming_scheme() {
        assert_eq!(id().to_string(), "DEU_TestStretch-1_2017_T-352");
    }

    #[test]
    fn cooperative_ids_carry_the_prefix() {
        let mut id = id();
        id.cooperative = true;
        assert_eq!(id.to_string(), "C-DEU_TestStretch-1_2017_T-352");
    }
}
