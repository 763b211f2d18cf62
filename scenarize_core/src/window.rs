// scenarize_core/src/window.rs

//! Bounded slices of a recording.
//!
//! A [`Window`] is the unit everything downstream operates on: a table of
//! per-agent state sequences, a table of per-agent attributes and the sample
//! interval. Windows own their tables exclusively; every derived window is a
//! deep copy, so no generator ever observes a table mutated by a sibling.

use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::types::{AgentId, AgentMeta, KinematicState, TimeStep};

/// The state sequence of one agent, ordered by time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    points: Vec<(TimeStep, KinematicState)>,
}

impl Track {
    /// Build a track from time-ordered samples. Out-of-order input is
    /// rejected; adapters are expected to sort before constructing.
    pub fn new(points: Vec<(TimeStep, KinematicState)>) -> Result<Self> {
        if points.is_empty() {
            return Err(ConvertError::MalformedWindow(
                "track without samples".into(),
            ));
        }
        for pair in points.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(ConvertError::MalformedWindow(format!(
                    "track samples out of order: {} then {}",
                    pair[0].0, pair[1].0
                )));
            }
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TimeStep, KinematicState)> {
        self.points.iter()
    }

    pub fn first(&self) -> (TimeStep, &KinematicState) {
        let (t, s) = &self.points[0];
        (*t, s)
    }

    pub fn last(&self) -> (TimeStep, &KinematicState) {
        let (t, s) = self.points.last().expect("tracks are never empty");
        (*t, s)
    }

    pub fn start_step(&self) -> TimeStep {
        self.points[0].0
    }

    pub fn end_step(&self) -> TimeStep {
        self.points[self.points.len() - 1].0
    }

    /// Positions of all samples, in time order.
    pub fn positions(&self) -> Vec<Point2<f64>> {
        self.points.iter().map(|(_, s)| s.position).collect()
    }

    /// Velocity magnitudes of all samples, in time order.
    pub fn velocities(&self) -> Vec<f64> {
        self.points.iter().map(|(_, s)| s.velocity).collect()
    }

    /// The samples with `start <= t <= end`, or `None` if no sample falls
    /// inside the range.
    pub fn restricted(&self, start: TimeStep, end: TimeStep) -> Option<Track> {
        let points: Vec<_> = self
            .points
            .iter()
            .filter(|(t, _)| *t >= start && *t <= end)
            .cloned()
            .collect();
        if points.is_empty() {
            None
        } else {
            Some(Track { points })
        }
    }

    pub(crate) fn from_sorted_unchecked(points: Vec<(TimeStep, KinematicState)>) -> Self {
        Self { points }
    }
}

/// Contiguous subset of a recording: per-agent tracks, per-agent attributes
/// and the sample interval in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    tracks: BTreeMap<AgentId, Track>,
    meta: BTreeMap<AgentId, AgentMeta>,
    pub dt: f64,
}

impl Window {
    /// Every agent with states must carry an attribute row; attribute rows
    /// without states are dropped silently so callers can pass the full
    /// recording metadata table.
    pub fn new(
        tracks: BTreeMap<AgentId, Track>,
        mut meta: BTreeMap<AgentId, AgentMeta>,
        dt: f64,
    ) -> Result<Self> {
        if dt <= 0.0 {
            return Err(ConvertError::MalformedWindow(format!(
                "non-positive sample interval {dt}"
            )));
        }
        for id in tracks.keys() {
            if !meta.contains_key(id) {
                return Err(ConvertError::MalformedWindow(format!(
                    "agent {id} has states but no attribute row"
                )));
            }
        }
        meta.retain(|id, _| tracks.contains_key(id));
        Ok(Self { tracks, meta, dt })
    }

    pub fn tracks(&self) -> &BTreeMap<AgentId, Track> {
        &self.tracks
    }

    pub fn meta(&self) -> &BTreeMap<AgentId, AgentMeta> {
        &self.meta
    }

    pub fn track(&self, id: AgentId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn agent_meta(&self, id: AgentId) -> Option<&AgentMeta> {
        self.meta.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Lowest time step over all tracks.
    pub fn start_step(&self) -> Option<TimeStep> {
        self.tracks.values().map(Track::start_step).min()
    }

    /// Highest time step over all tracks.
    pub fn end_step(&self) -> Option<TimeStep> {
        self.tracks.values().map(Track::end_step).max()
    }

    /// All distinct time steps, ascending.
    pub fn time_steps(&self) -> Vec<TimeStep> {
        let mut steps: std::collections::BTreeSet<TimeStep> = std::collections::BTreeSet::new();
        for track in self.tracks.values() {
            steps.extend(track.iter().map(|(t, _)| *t));
        }
        steps.into_iter().collect()
    }

    /// The sub-window with `start <= t <= end`. Agents without samples in the
    /// range are dropped along with their attribute rows.
    pub fn restricted(&self, start: TimeStep, end: TimeStep) -> Window {
        let mut tracks = BTreeMap::new();
        let mut meta = BTreeMap::new();
        for (id, track) in &self.tracks {
            if let Some(restricted) = track.restricted(start, end) {
                tracks.insert(*id, restricted);
                meta.insert(*id, self.meta[id].clone());
            }
        }
        Window {
            tracks,
            meta,
            dt: self.dt,
        }
    }

    /// Remove an agent's attribute row, keeping its states. Consumers iterate
    /// the attribute table, so this excludes the agent from obstacle
    /// materialization without touching the state table.
    pub fn remove_meta(&mut self, id: AgentId) {
        self.meta.remove(&id);
    }

    /// Internal constructor for windows derived from an already-validated
    /// window (the tables are built agent-by-agent, so the invariants hold by
    /// construction).
    pub(crate) fn from_parts_unchecked(
        tracks: BTreeMap<AgentId, Track>,
        meta: BTreeMap<AgentId, AgentMeta>,
        dt: f64,
    ) -> Window {
        Window { tracks, meta, dt }
    }
}

/// A window together with the agents designated as planning-problem egos.
/// The ego list may be empty; synthesizers that sample their own egos ignore
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct EgoWindow {
    pub window: Window,
    pub ego_ids: Vec<AgentId>,
}

impl EgoWindow {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            ego_ids: Vec::new(),
        }
    }

    pub fn with_egos(window: Window, ego_ids: Vec<AgentId>) -> Self {
        Self { window, ego_ids }
    }
}
