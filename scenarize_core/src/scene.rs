// scenarize_core/src/scene.rs

//! Static map model and the collaborator contracts around it.
//!
//! Scenes are deserialized from preloaded per-location assets; this crate
//! never synthesizes lane geometry. The conversion pipeline only needs point
//! lookups, boundary polylines and the identity fields copied into scenario
//! ids.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Polygon, Polyline};
use crate::window::Window;

/// Identifier of one lanelet within a scene.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LaneletId(pub u64);

impl fmt::Display for LaneletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One atomic lane section: a centerline with left/right boundary lines and
/// its connectivity within the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lanelet {
    pub id: LaneletId,
    pub center: Polyline,
    pub left: Polyline,
    pub right: Polyline,
    #[serde(default)]
    pub successors: Vec<LaneletId>,
    #[serde(default)]
    pub adjacent_left: Option<LaneletId>,
    #[serde(default)]
    pub adjacent_right: Option<LaneletId>,
}

impl Lanelet {
    /// The drivable surface: left boundary followed by the reversed right
    /// boundary.
    pub fn polygon(&self) -> Polygon {
        let mut vertices: Vec<Point2<f64>> = self.left.points().to_vec();
        vertices.extend(self.right.points().iter().rev());
        // Boundaries are valid polylines, so at least four distinct points
        // exist and construction cannot fail.
        Polygon::new(vertices).expect("lanelet boundaries form a polygon")
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        self.polygon().contains(p)
    }

    /// A longitudinal section of the lanelet around `position`.
    ///
    /// The position is projected onto the centerline, the cut spans
    /// `lon_length / 2` of arclength to either side (clamped to the lanelet's
    /// extent), and the two cut points are carried over to the boundary lines
    /// by projection, yielding a quadrilateral. `None` if the section
    /// degenerates.
    pub fn cut_section(&self, position: Point2<f64>, lon_length: f64) -> Option<Polygon> {
        let s = self.center.project(position);
        let half = lon_length * 0.5;
        let s0 = (s - half).max(0.0);
        let s1 = (s + half).min(self.center.length());
        if s1 <= s0 {
            return None;
        }
        let p0 = self.center.interpolate(s0);
        let p1 = self.center.interpolate(s1);
        let l0 = self.left.interpolate(self.left.project(p0));
        let l1 = self.left.interpolate(self.left.project(p1));
        let r0 = self.right.interpolate(self.right.project(p0));
        let r1 = self.right.interpolate(self.right.project(p1));
        Polygon::new(vec![l0, l1, r1, r0]).ok()
    }
}

/// Identity fields of a map, copied into every scenario id derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneIdentity {
    /// Three-letter country or region code, e.g. "DEU".
    pub country: String,
    pub map_name: String,
    pub map_id: u32,
    /// Recording-level configuration id, if the map is bound to one.
    #[serde(default)]
    pub configuration_id: Option<u32>,
}

/// A static map: identity plus lanelet network. Traffic control elements
/// beyond lane connectivity are opaque to the pipeline and simply carried
/// along in the asset files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticScene {
    pub identity: SceneIdentity,
    pub lanelets: Vec<Lanelet>,
}

impl StaticScene {
    /// Ids of all lanelets whose surface contains `p`. Empty means off-road.
    pub fn find_lanelets_at(&self, p: Point2<f64>) -> Vec<LaneletId> {
        self.lanelets
            .iter()
            .filter(|l| l.contains(p))
            .map(|l| l.id)
            .collect()
    }

    pub fn lanelet(&self, id: LaneletId) -> Option<&Lanelet> {
        self.lanelets.iter().find(|l| l.id == id)
    }
}

/// Identifies one recording of a dataset: which preloaded map it plays on and
/// which recording it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingMeta {
    pub location: String,
    pub recording_id: u32,
}

/// A dataset's stream of independent recordings. Consumed exactly once;
/// recordings are materialized lazily, one at a time.
pub trait RecordingSource: Send {
    fn recordings(self: Box<Self>) -> Box<dyn Iterator<Item = Result<(Window, RecordingMeta)>> + Send>;
}

/// Preloaded map lookup, one scene per location key.
pub trait StaticSceneProvider: Send + Sync {
    fn lookup(&self, location: &str) -> Option<Arc<StaticScene>>;

    /// All registered location keys, for fail-fast validation and logging.
    fn locations(&self) -> Vec<String>;
}

/// Trivial provider backed by a map, used by adapters that preload scenes
/// themselves and by tests.
#[derive(Default)]
pub struct PreloadedScenes {
    scenes: BTreeMap<String, Arc<StaticScene>>,
}

impl PreloadedScenes {
    pub fn new(scenes: BTreeMap<String, Arc<StaticScene>>) -> Self {
        Self { scenes }
    }

    pub fn insert(&mut self, location: impl Into<String>, scene: StaticScene) {
        self.scenes.insert(location.into(), Arc::new(scene));
    }
}

impl StaticSceneProvider for PreloadedScenes {
    fn lookup(&self, location: &str) -> Option<Arc<StaticScene>> {
        self.scenes.get(location).cloned()
    }

    fn locations(&self) -> Vec<String> {
        self.scenes.keys().cloned().collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{straight_lanelet, straight_scene};
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn point_lookup_distinguishes_on_and_off_road() {
        let scene = straight_scene(100.0);
        assert_eq!(
            scene.find_lanelets_at(Point2::new(50.0, 0.5)),
            vec![LaneletId(1)]
        );
        assert!(scene.find_lanelets_at(Point2::new(50.0, 10.0)).is_empty());
        assert!(scene.find_lanelets_at(Point2::new(-5.0, 0.0)).is_empty());
    }

    #[test]
    fn cut_section_spans_the_requested_length() {
        let lanelet = straight_lanelet(1, 100.0);
        let cut = lanelet
            .cut_section(Point2::new(50.0, 0.3), 10.0)
            .expect("interior cut succeeds");
        // 10 m of a 4 m wide lane.
        assert_abs_diff_eq!(cut.area(), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn cut_section_clamps_at_the_lanelet_end() {
        let lanelet = straight_lanelet(1, 100.0);
        let cut = lanelet
            .cut_section(Point2::new(99.0, 0.0), 10.0)
            .expect("cut near the end succeeds");
        // Only 1 m remains ahead of the projection point.
        assert_abs_diff_eq!(cut.area(), 6.0 * 4.0, epsilon = 1e-9);
    }

    #[test]
    fn preloaded_scenes_roundtrip() {
        let mut provider = PreloadedScenes::default();
        provider.insert("loc1", straight_scene(10.0));
        assert!(provider.lookup("loc1").is_some());
        assert!(provider.lookup("loc2").is_none());
        assert_eq!(provider.locations(), vec!["loc1".to_string()]);
    }
}
