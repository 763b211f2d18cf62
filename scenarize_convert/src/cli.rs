// scenarize_convert/src/cli.rs

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scenarize_core::pipeline::RoutabilityCheck;

use crate::writer::FileFormat;

/// Generates motion-planning scenarios from traffic-recording datasets.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub dataset: DatasetCommand,
}

#[derive(Subcommand, Debug)]
pub enum DatasetCommand {
    /// Drone datasets recorded as tracks / tracksMeta / recordingMeta CSV
    /// triples (highD-style).
    Levelx(DatasetArgs),
    /// Pre-normalized recordings, one directory per recording with a
    /// trajectory table and an agent table.
    Tabular(DatasetArgs),
}

impl DatasetCommand {
    pub fn args(&self) -> &DatasetArgs {
        match self {
            DatasetCommand::Levelx(args) | DatasetCommand::Tabular(args) => args,
        }
    }
}

#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Path to the dataset folder.
    pub input_dir: PathBuf,

    /// Directory to store the generated scenario files.
    pub output_dir: PathBuf,

    /// Dataset configuration TOML (location table, country code, fallback
    /// sample interval).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the preloaded static scene assets. Defaults to
    /// `<input_dir>/maps`.
    #[arg(long)]
    pub maps_dir: Option<PathBuf>,

    /// Maximum number of time steps per scenario.
    #[arg(long, default_value_t = 150)]
    pub num_time_steps: i64,

    /// One scenario per valid vehicle, spanning its whole lifetime.
    /// Overrides --num-time-steps.
    #[arg(long, default_value_t = false)]
    pub all_vehicles: bool,

    /// Planning problems per scenario. More than one creates a cooperative
    /// scenario.
    #[arg(long, default_value_t = 1)]
    pub num_planning_problems: usize,

    /// Keep vehicles used for planning problems as obstacles in the
    /// scenario.
    #[arg(long, default_value_t = false)]
    pub keep_ego: bool,

    /// Renumber time steps so every scenario starts at zero.
    #[arg(long, default_value_t = false)]
    pub obstacles_start_at_zero: bool,

    /// Only use every n-th time step (multiplies the sample interval).
    #[arg(long, default_value_t = 1)]
    pub downsample: i64,

    /// Number of consumer processes.
    #[arg(long, default_value_t = 1)]
    pub num_processes: usize,

    /// Check routability of planning problems before writing.
    #[arg(long, value_enum, default_value_t = RoutabilityArg::Strict)]
    pub routability_check: RoutabilityArg,

    /// File format of the generated scenarios.
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    pub format: FormatArg,

    /// Only create up to n scenarios.
    #[arg(long)]
    pub max_scenarios: Option<usize>,

    /// Randomly sample n scenarios from each recording.
    #[arg(long)]
    pub samples_per_recording: Option<usize>,

    /// Derive turn-indicator series from trajectory curvature.
    #[arg(long, default_value_t = false)]
    pub turning_indicator: bool,

    /// Seed for all random sampling in this run.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl DatasetArgs {
    /// `None` means whole agent lifetimes.
    pub fn window_length(&self) -> Option<i64> {
        if self.all_vehicles {
            None
        } else {
            Some(self.num_time_steps)
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutabilityArg {
    Nocheck,
    Strict,
}

impl std::fmt::Display for RoutabilityArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RoutabilityArg::Nocheck => "nocheck",
            RoutabilityArg::Strict => "strict",
        })
    }
}

impl From<RoutabilityArg> for RoutabilityCheck {
    fn from(value: RoutabilityArg) -> Self {
        match value {
            RoutabilityArg::Nocheck => RoutabilityCheck::NoCheck,
            RoutabilityArg::Strict => RoutabilityCheck::Strict,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// Plain JSON document per scenario.
    Json,
    /// The same document, deflate-compressed inside a zip container.
    JsonZip,
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FormatArg::Json => "json",
            FormatArg::JsonZip => "json-zip",
        })
    }
}

impl From<FormatArg> for FileFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => FileFormat::Json,
            FormatArg::JsonZip => FileFormat::JsonZip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_common_knobs() {
        let cli = Cli::parse_from([
            "scenarize",
            "levelx",
            "/data/highd",
            "/tmp/out",
            "--num-time-steps",
            "100",
            "--num-processes",
            "4",
            "--samples-per-recording",
            "3",
            "--routability-check",
            "nocheck",
        ]);
        let args = cli.dataset.args();
        assert_eq!(args.num_time_steps, 100);
        assert_eq!(args.num_processes, 4);
        assert_eq!(args.samples_per_recording, Some(3));
        assert_eq!(args.routability_check, RoutabilityArg::Nocheck);
        assert_eq!(args.window_length(), Some(100));
    }

    #[test]
    fn all_vehicles_clears_the_window_length() {
        let cli = Cli::parse_from(["scenarize", "tabular", "/in", "/out", "--all-vehicles"]);
        assert_eq!(cli.dataset.args().window_length(), None);
    }
}
