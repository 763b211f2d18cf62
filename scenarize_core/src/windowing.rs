// scenarize_core/src/windowing.rs

//! Generators that subdivide one recording window into many smaller windows.
//!
//! All generators share the same contract: consume a recording window, emit a
//! lazy stream of `(EgoWindow, RecordingMeta)` pairs. Emitted windows own
//! their tables. Which generator runs is decided once per conversion by
//! [`GeneratorPolicy`]; downsampling composes with any of them.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{ConvertError, Result};
use crate::scene::RecordingMeta;
use crate::types::{AgentId, AgentType, TimeStep};
use crate::window::{EgoWindow, Track, Window};

/// Stream of sub-windows cut from one recording.
pub type WindowStream = Box<dyn Iterator<Item = (EgoWindow, RecordingMeta)> + Send>;

/// Subdivide a recording window. Single consumption; the stream is only as
/// long as the recording allows.
pub trait WindowGenerator: Send {
    fn windows(&mut self, recording: Window, meta: RecordingMeta) -> WindowStream;
}

/// One window per agent of the designated role, spanning exactly that agent's
/// lifetime (all other agents are restricted to the same span). The agent
/// becomes the window's ego.
pub struct AgentWindowGenerator {
    pub role: AgentType,
}

impl Default for AgentWindowGenerator {
    fn default() -> Self {
        Self {
            role: AgentType::Car,
        }
    }
}

impl AgentWindowGenerator {
    /// Agents of the designated role with enough samples to carry velocity
    /// information.
    fn candidates(&self, recording: &Window) -> Vec<AgentId> {
        recording
            .meta()
            .iter()
            .filter(|(id, meta)| {
                meta.agent_type == self.role
                    && recording.track(**id).map_or(false, |t| t.len() >= 2)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn agent_window(recording: &Window, agent: AgentId) -> EgoWindow {
        let track = recording
            .track(agent)
            .expect("candidate agents have tracks");
        let window = recording.restricted(track.start_step(), track.end_step());
        EgoWindow::with_egos(window, vec![agent])
    }
}

impl WindowGenerator for AgentWindowGenerator {
    fn windows(&mut self, recording: Window, meta: RecordingMeta) -> WindowStream {
        let candidates = self.candidates(&recording);
        Box::new(candidates.into_iter().map(move |agent| {
            (
                Self::agent_window(&recording, agent),
                meta.clone(),
            )
        }))
    }
}

/// Contiguous, non-overlapping fixed-length windows covering the recording's
/// time axis: bucket `b` spans time steps `[b * len, (b + 1) * len)`. Buckets
/// without any data are skipped.
pub struct RollingWindowGenerator {
    window_length: i64,
}

impl RollingWindowGenerator {
    pub fn new(window_length: i64) -> Self {
        Self { window_length }
    }
}

impl WindowGenerator for RollingWindowGenerator {
    fn windows(&mut self, recording: Window, meta: RecordingMeta) -> WindowStream {
        let (Some(start), Some(end)) = (recording.start_step(), recording.end_step()) else {
            return Box::new(std::iter::empty());
        };
        let len = self.window_length;
        let buckets = start.div_euclid(len)..=end.div_euclid(len);
        Box::new(buckets.filter_map(move |bucket| {
            let window = recording.restricted(bucket * len, (bucket + 1) * len - 1);
            if window.is_empty() {
                None
            } else {
                Some((EgoWindow::new(window), meta.clone()))
            }
        }))
    }
}

/// Fixed-length windows at up to `samples_per_recording` distinct random
/// start steps. Start steps are drawn uniformly without replacement from the
/// recording's time steps, excluding the trailing `window_length` so every
/// window is full-length. Windows may overlap.
pub struct TimeSliceSamplingWindowGenerator<R: Rng + Send> {
    window_length: i64,
    samples_per_recording: usize,
    rng: R,
}

impl<R: Rng + Send> TimeSliceSamplingWindowGenerator<R> {
    pub fn new(window_length: i64, samples_per_recording: usize, rng: R) -> Self {
        Self {
            window_length,
            samples_per_recording,
            rng,
        }
    }
}

impl<R: Rng + Send> WindowGenerator for TimeSliceSamplingWindowGenerator<R> {
    fn windows(&mut self, recording: Window, meta: RecordingMeta) -> WindowStream {
        let steps = recording.time_steps();
        if steps.len() <= self.window_length as usize {
            return Box::new(std::iter::empty());
        }
        let candidates = &steps[..steps.len() - self.window_length as usize];
        let starts: Vec<TimeStep> = candidates
            .choose_multiple(&mut self.rng, self.samples_per_recording)
            .copied()
            .collect();
        let len = self.window_length;
        Box::new(starts.into_iter().map(move |start| {
            let window = recording.restricted(start, start + len - 1);
            (EgoWindow::new(window), meta.clone())
        }))
    }
}

/// Per-agent windows for up to `samples_per_recording` agents drawn uniformly
/// without replacement from the designated role.
pub struct AgentSamplingWindowGenerator<R: Rng + Send> {
    samples_per_recording: usize,
    base: AgentWindowGenerator,
    rng: R,
}

impl<R: Rng + Send> AgentSamplingWindowGenerator<R> {
    pub fn new(samples_per_recording: usize, rng: R) -> Self {
        Self {
            samples_per_recording,
            base: AgentWindowGenerator::default(),
            rng,
        }
    }
}

impl<R: Rng + Send> WindowGenerator for AgentSamplingWindowGenerator<R> {
    fn windows(&mut self, recording: Window, meta: RecordingMeta) -> WindowStream {
        let candidates = self.base.candidates(&recording);
        let chosen: Vec<AgentId> = candidates
            .choose_multiple(&mut self.rng, self.samples_per_recording)
            .copied()
            .collect();
        Box::new(chosen.into_iter().map(move |agent| {
            (
                AgentWindowGenerator::agent_window(&recording, agent),
                meta.clone(),
            )
        }))
    }
}

/// Wraps any generator and reduces temporal resolution by an integer factor:
/// per agent, the first sample of every `factor`-wide bucket survives, time
/// steps are renumbered to the bucket index and `dt` grows accordingly.
pub struct Downsampler {
    base: Box<dyn WindowGenerator>,
    factor: i64,
}

impl Downsampler {
    pub fn new(base: Box<dyn WindowGenerator>, factor: i64) -> Self {
        Self { base, factor }
    }

    fn downsample(ego_window: EgoWindow, factor: i64) -> EgoWindow {
        let window = ego_window.window;
        let mut tracks = BTreeMap::new();
        let mut meta = BTreeMap::new();
        for (id, track) in window.tracks() {
            let mut points = Vec::new();
            let mut current_bucket: Option<i64> = None;
            for (t, state) in track.iter() {
                let bucket = t.div_euclid(factor);
                if current_bucket != Some(bucket) {
                    points.push((bucket, *state));
                    current_bucket = Some(bucket);
                }
            }
            // Agents with no surviving samples are dropped.
            if !points.is_empty() {
                tracks.insert(*id, Track::from_sorted_unchecked(points));
                meta.insert(*id, window.meta()[id].clone());
            }
        }
        let ego_ids = ego_window
            .ego_ids
            .into_iter()
            .filter(|id| tracks.contains_key(id))
            .collect();
        let downsampled =
            Window::from_parts_unchecked(tracks, meta, window.dt * factor as f64);
        EgoWindow::with_egos(downsampled, ego_ids)
    }
}

impl WindowGenerator for Downsampler {
    fn windows(&mut self, recording: Window, meta: RecordingMeta) -> WindowStream {
        let factor = self.factor;
        Box::new(
            self.base
                .windows(recording, meta)
                .map(move |(window, meta)| (Self::downsample(window, factor), meta)),
        )
    }
}

/// The two knobs that select a window generator.
///
/// | `window_length` | `samples_per_recording` | generator            |
/// |-----------------|-------------------------|----------------------|
/// | `None`          | `None`                  | per-agent            |
/// | `Some`          | `None`                  | rolling              |
/// | `None`          | `Some`                  | agent sampling       |
/// | `Some`          | `Some`                  | time-slice sampling  |
///
/// A downsample factor above one wraps whichever generator was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorPolicy {
    /// Target window length in time steps; `None` means whole agent
    /// lifetimes.
    pub window_length: Option<i64>,
    /// Random samples per recording; `None` means exhaustive, non-random.
    pub samples_per_recording: Option<usize>,
    /// Temporal downsampling factor, 1 for none.
    pub downsample: i64,
}

impl GeneratorPolicy {
    pub fn build<R: Rng + Send + 'static>(
        &self,
        num_planning_problems: usize,
        rng: R,
    ) -> Result<Box<dyn WindowGenerator>> {
        if let Some(len) = self.window_length {
            if len < 1 {
                return Err(ConvertError::InvalidConfig(format!(
                    "window length must be positive, got {len}"
                )));
            }
        } else if num_planning_problems > 1 {
            // Whole-lifetime windows carry exactly one ego each; more than
            // one planning problem cannot be satisfied.
            return Err(ConvertError::InvalidConfig(
                "more than one planning problem requires a window length".into(),
            ));
        }
        if self.downsample < 1 {
            return Err(ConvertError::InvalidConfig(format!(
                "downsample factor must be at least 1, got {}",
                self.downsample
            )));
        }

        let base: Box<dyn WindowGenerator> =
            match (self.window_length, self.samples_per_recording) {
                (None, None) => Box::new(AgentWindowGenerator::default()),
                (Some(len), None) => Box::new(RollingWindowGenerator::new(len)),
                (None, Some(samples)) => {
                    Box::new(AgentSamplingWindowGenerator::new(samples, rng))
                }
                (Some(len), Some(samples)) => {
                    Box::new(TimeSliceSamplingWindowGenerator::new(len, samples, rng))
                }
            };

        Ok(if self.downsample > 1 {
            Box::new(Downsampler::new(base, self.downsample))
        } else {
            base
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::testing::car_window;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn meta() -> RecordingMeta {
        RecordingMeta {
            location: "loc1".into(),
            recording_id: 1,
        }
    }

    /// Two cars, one active over steps 0..=3, the other over 4..=6.
    fn recording() -> Window {
        car_window(&[(0, &[0, 1, 2, 3]), (1, &[4, 5, 6])], 1.0)
    }

    fn steps_of(window: &Window) -> Vec<TimeStep> {
        window.time_steps()
    }

    #[test]
    fn per_agent_windows_span_each_lifetime() {
        let mut generator = AgentWindowGenerator::default();
        let windows: Vec<_> = generator.windows(recording(), meta()).collect();
        assert_eq!(windows.len(), 2);

        assert_eq!(steps_of(&windows[0].0.window), vec![0, 1, 2, 3]);
        assert_eq!(windows[0].0.ego_ids, vec![AgentId(0)]);
        assert_eq!(windows[0].0.window.meta().len(), 1);

        assert_eq!(steps_of(&windows[1].0.window), vec![4, 5, 6]);
        assert_eq!(windows[1].0.ego_ids, vec![AgentId(1)]);
        assert_eq!(windows[1].0.window.meta().len(), 1);
    }

    #[test]
    fn per_agent_generator_skips_single_sample_tracks() {
        let recording = car_window(&[(0, &[0, 1, 2]), (1, &[5])], 1.0);
        let mut generator = AgentWindowGenerator::default();
        let windows: Vec<_> = generator.windows(recording, meta()).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].0.ego_ids, vec![AgentId(0)]);
    }

    #[test]
    fn rolling_windows_partition_the_time_axis() {
        let mut generator = RollingWindowGenerator::new(5);
        let windows: Vec<_> = generator.windows(recording(), meta()).collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(steps_of(&windows[0].0.window), vec![0, 1, 2, 3, 4]);
        assert_eq!(steps_of(&windows[1].0.window), vec![5, 6]);

        // Non-overlapping and jointly covering every input step.
        let mut all: Vec<TimeStep> = windows
            .iter()
            .flat_map(|(w, _)| steps_of(&w.window))
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn downsampling_renumbers_and_scales_dt() {
        let base = Box::new(RollingWindowGenerator::new(100));
        let mut generator = Downsampler::new(base, 2);
        let windows: Vec<_> = generator.windows(recording(), meta()).collect();
        assert_eq!(windows.len(), 1);
        let window = &windows[0].0.window;
        // Steps 0, 2, 4, 6 survive and are renumbered to 0, 1, 2, 3.
        assert_eq!(steps_of(window), vec![0, 1, 2, 3]);
        assert_eq!(window.dt, 2.0);
    }

    #[test]
    fn downsampling_keeps_the_first_sample_per_bucket() {
        let recording = car_window(&[(0, &[1, 2, 3, 4, 5])], 0.5);
        let base = Box::new(RollingWindowGenerator::new(100));
        let mut generator = Downsampler::new(base, 3);
        let windows: Vec<_> = generator.windows(recording, meta()).collect();
        let window = &windows[0].0.window;
        let track = window.track(AgentId(0)).unwrap();
        // Buckets [0,3) and [3,6) contribute their first samples, steps 1 and 3.
        let xs: Vec<f64> = track.iter().map(|(_, s)| s.position.x).collect();
        assert_eq!(xs, vec![1.0, 3.0]);
        assert_eq!(steps_of(window), vec![0, 1]);
    }

    #[test]
    fn time_slice_sampling_emits_full_length_windows() {
        let rng = ChaCha8Rng::seed_from_u64(42);
        let mut generator = TimeSliceSamplingWindowGenerator::new(2, 2, rng);
        let windows: Vec<_> = generator.windows(recording(), meta()).collect();
        assert_eq!(windows.len(), 2);
        for (window, _) in &windows {
            assert_eq!(steps_of(&window.window).len(), 2);
        }
    }

    #[test]
    fn sampling_is_capped_at_availability() {
        // Three samples requested, only two qualifying agents available.
        let rng = ChaCha8Rng::seed_from_u64(7);
        let mut generator = AgentSamplingWindowGenerator::new(3, rng);
        let windows: Vec<_> = generator.windows(recording(), meta()).collect();
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn policy_selects_the_documented_generator() {
        let policy = |window_length, samples_per_recording| GeneratorPolicy {
            window_length,
            samples_per_recording,
            downsample: 1,
        };
        for (len, samples) in [
            (None, None),
            (Some(5), None),
            (None, Some(2)),
            (Some(5), Some(2)),
        ] {
            let rng = ChaCha8Rng::seed_from_u64(0);
            let mut generator = policy(len, samples).build(1, rng).unwrap();
            // Every selected generator produces windows from this recording.
            assert!(generator.windows(recording(), meta()).count() > 0);
        }
    }

    #[test]
    fn policy_rejects_contradictory_configuration() {
        let policy = GeneratorPolicy {
            window_length: None,
            samples_per_recording: None,
            downsample: 1,
        };
        let rng = ChaCha8Rng::seed_from_u64(0);
        assert!(policy.build(2, rng).is_err());
    }

    #[test]
    fn downsampling_composes_with_any_generator() {
        let policy = GeneratorPolicy {
            window_length: None,
            samples_per_recording: None,
            downsample: 2,
        };
        let rng = ChaCha8Rng::seed_from_u64(0);
        let mut generator = policy.build(1, rng).unwrap();
        let windows: Vec<_> = generator.windows(recording(), meta()).collect();
        assert_eq!(windows.len(), 2);
        for (window, _) in &windows {
            assert_eq!(window.window.dt, 2.0);
            assert_eq!(window.ego_ids.len(), 1);
        }
    }
}
