// scenarize_convert/src/datasets/levelx.rs

//! Adapter for drone datasets recorded as tracks / tracksMeta / recordingMeta
//! CSV triples (the highD family layout).
//!
//! The raw tables use image conventions: the y axis points down, `x`/`y` is
//! the top-left corner of the bounding box and the box "width" is its extent
//! along the road. Ingestion converts to road conventions: centered
//! positions, y up, `length` along the heading.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::Reader;
use serde::Deserialize;
use tracing::info;
use walkdir::WalkDir;

use scenarize_core::error::{ConvertError, Result};
use scenarize_core::scene::{RecordingMeta, RecordingSource};
use scenarize_core::types::{AgentId, AgentMeta, AgentType, KinematicState};
use scenarize_core::window::{Track, Window};

use crate::config::DatasetConfig;

#[derive(Debug, Deserialize)]
struct TrackRow {
    frame: i64,
    id: u32,
    x: f64,
    y: f64,
    /// Bounding-box extent along the image x axis; becomes the length.
    width: f64,
    /// Bounding-box extent along the image y axis; becomes the width.
    height: f64,
    #[serde(rename = "xVelocity")]
    x_velocity: f64,
    #[serde(rename = "yVelocity")]
    y_velocity: f64,
    #[serde(rename = "xAcceleration", default)]
    x_acceleration: f64,
    #[serde(rename = "yAcceleration", default)]
    y_acceleration: f64,
}

#[derive(Debug, Deserialize)]
struct TrackMetaRow {
    id: u32,
    width: f64,
    height: f64,
    class: String,
}

#[derive(Debug, Deserialize)]
struct RecordingMetaRow {
    id: u32,
    #[serde(rename = "frameRate")]
    frame_rate: f64,
    #[serde(rename = "locationId")]
    location_id: String,
}

/// Stream of recordings from a highD-style dataset directory.
pub struct LevelxSource {
    input_dir: PathBuf,
    config: DatasetConfig,
}

impl LevelxSource {
    pub fn new(input_dir: PathBuf, config: DatasetConfig) -> Self {
        Self { input_dir, config }
    }

    fn track_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.file_name()
                        .to_string_lossy()
                        .ends_with("_tracks.csv")
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    fn read_recording(&self, tracks_path: &Path) -> Result<(Window, RecordingMeta)> {
        let file_name = tracks_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_name.trim_end_matches("_tracks.csv");
        let meta_path = tracks_path.with_file_name(format!("{stem}_tracksMeta.csv"));
        let recording_path = tracks_path.with_file_name(format!("{stem}_recordingMeta.csv"));

        let malformed = |what: &str| {
            ConvertError::MalformedRecording(file_name.clone(), what.to_string())
        };

        let recording_row = read_recording_meta(std::fs::File::open(&recording_path)?)
            .map_err(|err| malformed(&format!("recordingMeta: {err}")))?;
        let meta = read_tracks_meta(std::fs::File::open(&meta_path)?)
            .map_err(|err| malformed(&format!("tracksMeta: {err}")))?;
        let tracks = read_tracks(std::fs::File::open(tracks_path)?)
            .map_err(|err| malformed(&format!("tracks: {err}")))?;

        let dt = if recording_row.frame_rate > 0.0 {
            1.0 / recording_row.frame_rate
        } else {
            self.config.dt
        };
        let window = Window::new(tracks, meta, dt)?;
        let recording_meta = RecordingMeta {
            location: self.config.scene_key(&recording_row.location_id),
            recording_id: recording_row.id,
        };
        info!(
            recording = recording_meta.recording_id,
            location = %recording_meta.location,
            agents = window.tracks().len(),
            "loaded recording"
        );
        Ok((window, recording_meta))
    }
}

impl RecordingSource for LevelxSource {
    fn recordings(
        self: Box<Self>,
    ) -> Box<dyn Iterator<Item = Result<(Window, RecordingMeta)>> + Send> {
        let files = self.track_files();
        Box::new(
            files
                .into_iter()
                .map(move |path| self.read_recording(&path)),
        )
    }
}

fn read_tracks<R: Read>(reader: R) -> Result<BTreeMap<AgentId, Track>> {
    let mut per_agent: BTreeMap<AgentId, Vec<(i64, KinematicState)>> = BTreeMap::new();
    for record in Reader::from_reader(reader).deserialize() {
        let row: TrackRow = record.map_err(|err| ConvertError::Serialization(err.to_string()))?;
        // Center the box and flip into road coordinates (y up).
        let x = row.x + row.width / 2.0;
        let y = -(row.y + row.height / 2.0);
        let vy = -row.y_velocity;
        let velocity = (row.x_velocity * row.x_velocity + vy * vy).sqrt();
        let orientation = vy.atan2(row.x_velocity);
        let acceleration =
            row.x_acceleration * orientation.cos() + (-row.y_acceleration) * orientation.sin();
        let state = KinematicState {
            position: nalgebra::Point2::new(x, y),
            orientation,
            velocity,
            acceleration: Some(acceleration),
        };
        per_agent
            .entry(AgentId(row.id))
            .or_default()
            .push((row.frame, state));
    }

    let mut tracks = BTreeMap::new();
    for (id, mut points) in per_agent {
        points.sort_by_key(|(frame, _)| *frame);
        tracks.insert(id, Track::new(points)?);
    }
    Ok(tracks)
}

fn read_tracks_meta<R: Read>(reader: R) -> Result<BTreeMap<AgentId, AgentMeta>> {
    let mut meta = BTreeMap::new();
    for record in Reader::from_reader(reader).deserialize() {
        let row: TrackMetaRow =
            record.map_err(|err| ConvertError::Serialization(err.to_string()))?;
        meta.insert(
            AgentId(row.id),
            AgentMeta {
                agent_type: AgentType::from_raw(&row.class),
                // The box extent along the road is the vehicle's length.
                length: row.width,
                width: row.height,
            },
        );
    }
    Ok(meta)
}

fn read_recording_meta<R: Read>(reader: R) -> Result<RecordingMetaRow> {
    Reader::from_reader(reader)
        .deserialize()
        .next()
        .ok_or_else(|| ConvertError::Serialization("empty recordingMeta table".into()))?
        .map_err(|err| ConvertError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TRACKS: &str = "\
frame,id,x,y,width,height,xVelocity,yVelocity,xAcceleration,yAcceleration
0,1,10.0,4.0,4.0,2.0,10.0,0.0,0.5,0.0
1,1,10.4,4.0,4.0,2.0,10.0,0.0,0.5,0.0
0,2,50.0,8.0,5.0,2.5,-8.0,0.0,0.0,0.0
1,2,49.7,8.0,5.0,2.5,-8.0,0.0,0.0,0.0
";

    const TRACKS_META: &str = "\
id,width,height,class
1,4.0,2.0,Car
2,5.0,2.5,Truck
";

    const RECORDING_META: &str = "\
id,frameRate,locationId
3,25.0,1
";

    #[test]
    fn tracks_are_centered_and_flipped() {
        let tracks = read_tracks(TRACKS.as_bytes()).unwrap();
        assert_eq!(tracks.len(), 2);
        let track = &tracks[&AgentId(1)];
        assert_eq!(track.len(), 2);
        let (step, state) = track.first();
        assert_eq!(step, 0);
        // x + width/2, -(y + height/2).
        assert_abs_diff_eq!(state.position.x, 12.0);
        assert_abs_diff_eq!(state.position.y, -5.0);
        assert_abs_diff_eq!(state.velocity, 10.0);
        assert_abs_diff_eq!(state.orientation, 0.0);
        assert_abs_diff_eq!(state.acceleration.unwrap(), 0.5);
    }

    #[test]
    fn oncoming_traffic_points_the_other_way() {
        let tracks = read_tracks(TRACKS.as_bytes()).unwrap();
        let (_, state) = tracks[&AgentId(2)].first();
        assert_abs_diff_eq!(state.orientation.abs(), std::f64::consts::PI);
        assert_abs_diff_eq!(state.velocity, 8.0);
    }

    #[test]
    fn meta_swaps_box_extents_into_length_and_width() {
        let meta = read_tracks_meta(TRACKS_META.as_bytes()).unwrap();
        let car = &meta[&AgentId(1)];
        assert_eq!(car.agent_type, AgentType::Car);
        assert_abs_diff_eq!(car.length, 4.0);
        assert_abs_diff_eq!(car.width, 2.0);
        assert_eq!(meta[&AgentId(2)].agent_type, AgentType::Truck);
    }

    #[test]
    fn recording_meta_carries_rate_and_location() {
        let row = read_recording_meta(RECORDING_META.as_bytes()).unwrap();
        assert_eq!(row.id, 3);
        assert_abs_diff_eq!(row.frame_rate, 25.0);
        assert_eq!(row.location_id, "1");
    }

    #[test]
    fn full_recording_reads_into_a_window() {
        let dir = crate::testing::temp_dir("levelx_read");
        std::fs::write(dir.join("01_tracks.csv"), TRACKS).unwrap();
        std::fs::write(dir.join("01_tracksMeta.csv"), TRACKS_META).unwrap();
        std::fs::write(dir.join("01_recordingMeta.csv"), RECORDING_META).unwrap();

        let mut config = DatasetConfig::default();
        config
            .locations
            .insert("1".to_string(), "test_stretch".to_string());
        let source = Box::new(LevelxSource::new(dir.clone(), config));
        let recordings: Vec<_> = source.recordings().collect();
        assert_eq!(recordings.len(), 1);
        let (window, meta) = recordings[0].as_ref().unwrap();
        assert_eq!(meta.location, "test_stretch");
        assert_eq!(meta.recording_id, 3);
        assert_abs_diff_eq!(window.dt, 0.04);
        assert_eq!(window.tracks().len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
