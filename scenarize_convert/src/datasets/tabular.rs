// scenarize_convert/src/datasets/tabular.rs

//! Adapter for pre-normalized recordings: one directory per recording,
//! holding a `recording.toml` descriptor, a trajectory table and an agent
//! table. Useful for data that already went through an external cleaning
//! step.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::Reader;
use serde::Deserialize;
use walkdir::WalkDir;

use scenarize_core::error::{ConvertError, Result};
use scenarize_core::scene::{RecordingMeta, RecordingSource};
use scenarize_core::types::{AgentId, AgentMeta, AgentType, KinematicState};
use scenarize_core::window::{Track, Window};

use crate::config::DatasetConfig;

const DESCRIPTOR: &str = "recording.toml";
const TRAJECTORIES: &str = "trajectories.csv";
const AGENTS: &str = "agents.csv";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordingDescriptor {
    location: String,
    id: u32,
    /// Sample interval override for this recording.
    dt: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrajectoryRow {
    agent_id: u32,
    time_step: i64,
    x: f64,
    y: f64,
    orientation: f64,
    velocity: f64,
    #[serde(default)]
    acceleration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AgentRow {
    agent_id: u32,
    agent_type: String,
    width: f64,
    length: f64,
}

/// Stream of recordings from a directory of normalized recording folders.
pub struct TabularSource {
    input_dir: PathBuf,
    config: DatasetConfig,
}

impl TabularSource {
    pub fn new(input_dir: PathBuf, config: DatasetConfig) -> Self {
        Self { input_dir, config }
    }

    fn recording_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.path().join(DESCRIPTOR).is_file())
            .map(|e| e.into_path())
            .collect();
        dirs.sort();
        dirs
    }

    fn read_recording(&self, dir: &Path) -> Result<(Window, RecordingMeta)> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let malformed =
            |what: String| ConvertError::MalformedRecording(name.clone(), what);

        let descriptor: RecordingDescriptor =
            toml::from_str(&std::fs::read_to_string(dir.join(DESCRIPTOR))?)
                .map_err(|err| malformed(format!("descriptor: {err}")))?;
        let tracks = read_trajectories(std::fs::File::open(dir.join(TRAJECTORIES))?)?;
        let meta = read_agents(std::fs::File::open(dir.join(AGENTS))?)?;

        let window = Window::new(tracks, meta, descriptor.dt.unwrap_or(self.config.dt))?;
        let recording_meta = RecordingMeta {
            location: self.config.scene_key(&descriptor.location),
            recording_id: descriptor.id,
        };
        Ok((window, recording_meta))
    }
}

impl RecordingSource for TabularSource {
    fn recordings(
        self: Box<Self>,
    ) -> Box<dyn Iterator<Item = Result<(Window, RecordingMeta)>> + Send> {
        let dirs = self.recording_dirs();
        Box::new(dirs.into_iter().map(move |dir| self.read_recording(&dir)))
    }
}

fn read_trajectories<R: Read>(reader: R) -> Result<BTreeMap<AgentId, Track>> {
    let mut per_agent: BTreeMap<AgentId, Vec<(i64, KinematicState)>> = BTreeMap::new();
    for record in Reader::from_reader(reader).deserialize() {
        let row: TrajectoryRow =
            record.map_err(|err| ConvertError::Serialization(err.to_string()))?;
        let state = KinematicState {
            position: nalgebra::Point2::new(row.x, row.y),
            orientation: row.orientation,
            velocity: row.velocity,
            acceleration: row.acceleration,
        };
        per_agent
            .entry(AgentId(row.agent_id))
            .or_default()
            .push((row.time_step, state));
    }
    let mut tracks = BTreeMap::new();
    for (id, mut points) in per_agent {
        points.sort_by_key(|(t, _)| *t);
        tracks.insert(id, Track::new(points)?);
    }
    Ok(tracks)
}

fn read_agents<R: Read>(reader: R) -> Result<BTreeMap<AgentId, AgentMeta>> {
    let mut meta = BTreeMap::new();
    for record in Reader::from_reader(reader).deserialize() {
        let row: AgentRow = record.map_err(|err| ConvertError::Serialization(err.to_string()))?;
        meta.insert(
            AgentId(row.agent_id),
            AgentMeta {
                agent_type: AgentType::from_raw(&row.agent_type),
                width: row.width,
                length: row.length,
            },
        );
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TRAJECTORIES_CSV: &str = "\
agent_id,time_step,x,y,orientation,velocity
0,0,0.0,0.0,0.0,1.0
0,1,1.0,0.0,0.0,1.0
0,2,2.0,0.0,0.0,1.0
";

    const AGENTS_CSV: &str = "\
agent_id,agent_type,width,length
0,car,1.8,4.5
";

    #[test]
    fn trajectories_group_per_agent() {
        let tracks = read_trajectories(TRAJECTORIES_CSV.as_bytes()).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[&AgentId(0)].len(), 3);
    }

    #[test]
    fn agents_resolve_their_roles() {
        let meta = read_agents(AGENTS_CSV.as_bytes()).unwrap();
        let car = &meta[&AgentId(0)];
        assert_eq!(car.agent_type, AgentType::Car);
        assert_abs_diff_eq!(car.length, 4.5);
    }

    #[test]
    fn recording_directory_reads_into_a_window() {
        let root = crate::testing::temp_dir("tabular_read");
        let rec = root.join("east_000_001");
        std::fs::create_dir_all(&rec).unwrap();
        std::fs::write(
            rec.join(DESCRIPTOR),
            "location = \"east\"\nid = 4\ndt = 0.1\n",
        )
        .unwrap();
        std::fs::write(rec.join(TRAJECTORIES), TRAJECTORIES_CSV).unwrap();
        std::fs::write(rec.join(AGENTS), AGENTS_CSV).unwrap();

        let source = Box::new(TabularSource::new(root.clone(), DatasetConfig::default()));
        let recordings: Vec<_> = source.recordings().collect();
        assert_eq!(recordings.len(), 1);
        let (window, meta) = recordings[0].as_ref().unwrap();
        assert_eq!(meta.location, "east");
        assert_eq!(meta.recording_id, 4);
        assert_abs_diff_eq!(window.dt, 0.1);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn malformed_descriptor_is_an_error() {
        let root = crate::testing::temp_dir("tabular_bad");
        let rec = root.join("broken");
        std::fs::create_dir_all(&rec).unwrap();
        std::fs::write(rec.join(DESCRIPTOR), "location = 5\n").unwrap();
        std::fs::write(rec.join(TRAJECTORIES), TRAJECTORIES_CSV).unwrap();
        std::fs::write(rec.join(AGENTS), AGENTS_CSV).unwrap();

        let source = Box::new(TabularSource::new(root.clone(), DatasetConfig::default()));
        let recordings: Vec<_> = source.recordings().collect();
        assert!(recordings[0].is_err());

        std::fs::remove_dir_all(&root).unwrap();
    }
}
