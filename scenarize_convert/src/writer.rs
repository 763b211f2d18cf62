// scenarize_convert/src/writer.rs

//! Scenario persistence.
//!
//! One self-identifying file per scenario, named after the scenario id so
//! unordered completion across workers can never clobber a sibling. Existing
//! files are always overwritten.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::Serialize;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use scenarize_core::error::{ConvertError, Result};
use scenarize_core::pipeline::ScenarioWriter;
use scenarize_core::planning::PlanningProblem;
use scenarize_core::scenario::Scenario;

/// Persisted scenario formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Plain JSON document.
    Json,
    /// The same document, deflated inside a zip container.
    JsonZip,
}

#[derive(Serialize)]
struct ScenarioDocument<'a> {
    scenario: &'a Scenario,
    planning_problems: &'a [PlanningProblem],
}

/// Writes scenarios into an output directory.
pub struct FsScenarioWriter {
    output_dir: PathBuf,
    format: FileFormat,
}

impl FsScenarioWriter {
    pub fn new(output_dir: PathBuf, format: FileFormat) -> Self {
        Self { output_dir, format }
    }
}

impl ScenarioWriter for FsScenarioWriter {
    fn write(&self, scenario: &Scenario, problems: &[PlanningProblem]) -> Result<()> {
        let document = ScenarioDocument {
            scenario,
            planning_problems: problems,
        };
        let name = scenario.id.to_string();
        match self.format {
            FileFormat::Json => {
                let path = self.output_dir.join(format!("{name}.json"));
                let file = File::create(path)?;
                serde_json::to_writer_pretty(BufWriter::new(file), &document)
                    .map_err(|err| ConvertError::Serialization(err.to_string()))?;
            }
            FileFormat::JsonZip => {
                let path = self.output_dir.join(format!("{name}.zip"));
                let file = File::create(path)?;
                let mut archive = ZipWriter::new(BufWriter::new(file));
                let options =
                    FileOptions::default().compression_method(CompressionMethod::Deflated);
                archive
                    .start_file(format!("{name}.json"), options)
                    .map_err(|err| ConvertError::Serialization(err.to_string()))?;
                let bytes = serde_json::to_vec(&document)
                    .map_err(|err| ConvertError::Serialization(err.to_string()))?;
                archive.write_all(&bytes)?;
                archive
                    .finish()
                    .map_err(|err| ConvertError::Serialization(err.to_string()))?;
            }
        }
        Ok(())
    }
}
