// scenarize_core/src/types.rs

//! Core identifiers and per-agent state records shared by the whole pipeline.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Discrete sample index within a recording. Signed so that windows may be
/// renumbered (e.g. offset to start at zero) without wrapping.
pub type TimeStep = i64;

/// A unique, hashable identifier for one traffic participant within a
/// recording.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a traffic participant, as recorded by the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Car,
    Truck,
    Bus,
    Taxi,
    PriorityVehicle,
    Motorcycle,
    Bicycle,
    Pedestrian,
    Train,
    /// Anything the dataset labels that we do not model explicitly.
    Unknown,
}

impl AgentType {
    /// Roles that carry turn indicators. Only these get a derived signal
    /// series; everything else gets an all-off series.
    pub fn is_vehicle(&self) -> bool {
        matches!(
            self,
            AgentType::Car
                | AgentType::Truck
                | AgentType::Bus
                | AgentType::Taxi
                | AgentType::PriorityVehicle
                | AgentType::Motorcycle
        )
    }

    /// Map a raw dataset label onto a role. Labels are matched
    /// case-insensitively; composite labels like "truck_bus" resolve to the
    /// first matching role.
    pub fn from_raw(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        match label.as_str() {
            "car" | "van" => AgentType::Car,
            "truck" | "trailer" | "truck_bus" => AgentType::Truck,
            "bus" => AgentType::Bus,
            "taxi" => AgentType::Taxi,
            "priority_vehicle" => AgentType::PriorityVehicle,
            "motorcycle" | "motorbike" => AgentType::Motorcycle,
            "bicycle" | "cyclist" => AgentType::Bicycle,
            "pedestrian" => AgentType::Pedestrian,
            "train" | "tram" => AgentType::Train,
            _ => AgentType::Unknown,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentType::Car => "car",
            AgentType::Truck => "truck",
            AgentType::Bus => "bus",
            AgentType::Taxi => "taxi",
            AgentType::PriorityVehicle => "priority_vehicle",
            AgentType::Motorcycle => "motorcycle",
            AgentType::Bicycle => "bicycle",
            AgentType::Pedestrian => "pedestrian",
            AgentType::Train => "train",
            AgentType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// One recorded kinematic sample of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub position: Point2<f64>,
    /// Heading in radians, counter-clockwise from the x axis.
    pub orientation: f64,
    /// Signed speed along the heading, dataset units (typically m/s).
    pub velocity: f64,
    /// Longitudinal acceleration, if the dataset provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<f64>,
}

impl KinematicState {
    pub fn new(x: f64, y: f64, orientation: f64, velocity: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
            velocity,
            acceleration: None,
        }
    }
}

/// Static per-agent attributes, constant over a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMeta {
    pub agent_type: AgentType,
    /// Lateral extent in meters.
    pub width: f64,
    /// Longitudinal extent in meters.
    pub length: f64,
}
