// scenarize_convert/src/lib.rs

//! Dataset adapters, map assets, persistence and the command-line driver
//! around `scenarize_core`.

pub mod cli;
pub mod config;
pub mod datasets;
pub mod maps;
pub mod oracle;
pub mod run;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    use nalgebra::Point2;
    use scenarize_core::geometry::Polyline;
    use scenarize_core::scene::{Lanelet, LaneletId, SceneIdentity, StaticScene};

    /// A fresh, empty scratch directory under the system temp dir.
    pub fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "scenarize_test_{}_{}",
            tag,
            std::process::id()
        ));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// One straight lanelet along the x axis, 200 m long and 4 m wide.
    pub fn scene_fixture() -> StaticScene {
        let line = |y: f64| {
            Polyline::new(vec![Point2::new(0.0, y), Point2::new(200.0, y)]).unwrap()
        };
        StaticScene {
            identity: SceneIdentity {
                country: "DEU".into(),
                map_name: "TestStretch".into(),
                map_id: 1,
                configuration_id: None,
            },
            lanelets: vec![Lanelet {
                id: LaneletId(1),
                center: line(0.0),
                left: line(2.0),
                right: line(-2.0),
                successors: Vec::new(),
                adjacent_left: None,
                adjacent_right: None,
            }],
        }
    }

    pub fn scene_map(key: &str) -> HashMap<String, Arc<StaticScene>> {
        let mut scenes = HashMap::new();
        scenes.insert(key.to_string(), Arc::new(scene_fixture()));
        scenes
    }
}
