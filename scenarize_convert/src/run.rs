// scenarize_convert/src/run.rs

//! Wires CLI knobs, dataset adapter, map store and the core pipeline into one
//! conversion run. Everything that can fail by configuration fails here,
//! before the first job is produced.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use scenarize_core::error::ConvertError;
use scenarize_core::pipeline::{
    build_job_filter, JobConsumer, JobProducer, RoutabilityCheck, RoutabilityFilter,
};
use scenarize_core::planning::{
    EgoProblemSynthesizer, NoProblems, PlanningProblemSynthesizer, RandomEgoSynthesizer,
};
use scenarize_core::prototype::{PrototypeBuilder, ProviderMetaScenarioBuilder};
use scenarize_core::runner::{RunSummary, WorkerRunner};
use scenarize_core::scene::{RecordingSource, StaticSceneProvider};
use scenarize_core::windowing::GeneratorPolicy;

use crate::cli::{DatasetArgs, DatasetCommand};
use crate::config::DatasetConfig;
use crate::datasets::{LevelxSource, TabularSource};
use crate::maps::MapStore;
use crate::oracle::LaneletGraphOracle;
use crate::writer::FsScenarioWriter;

/// Execute one conversion run for the selected dataset.
pub fn run(command: DatasetCommand) -> anyhow::Result<RunSummary> {
    let args = command.args();
    if !args.input_dir.is_dir() {
        bail!("input directory {} does not exist", args.input_dir.display());
    }
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output_dir.display()
        )
    })?;

    let config = DatasetConfig::load(args.config.as_deref())?;
    let maps_dir = args
        .maps_dir
        .clone()
        .unwrap_or_else(|| args.input_dir.join("maps"));
    let store = MapStore::load_dir(&maps_dir)?;
    info!(locations = ?store.locations(), "static scenes preloaded");

    let source: Box<dyn RecordingSource> = match &command {
        DatasetCommand::Levelx(args) => {
            Box::new(LevelxSource::new(args.input_dir.clone(), config))
        }
        DatasetCommand::Tabular(args) => {
            Box::new(TabularSource::new(args.input_dir.clone(), config))
        }
    };

    run_pipeline(source, store, args)
}

/// The dataset-independent part of a run.
pub fn run_pipeline<P>(
    source: Box<dyn RecordingSource>,
    provider: P,
    args: &DatasetArgs,
) -> anyhow::Result<RunSummary>
where
    P: StaticSceneProvider + 'static,
{
    let started = Instant::now();
    let window_length = args.window_length();

    // One explicitly seeded stream per random consumer, so parallel workers
    // never race on shared generator state.
    let mut root_rng = ChaCha8Rng::seed_from_u64(args.seed);
    let generator_rng = ChaCha8Rng::from_rng(&mut root_rng)?;
    let synthesizer_rng = ChaCha8Rng::from_rng(&mut root_rng)?;

    let policy = GeneratorPolicy {
        window_length,
        samples_per_recording: args.samples_per_recording,
        downsample: args.downsample,
    };
    let mut generator = policy.build(args.num_planning_problems, generator_rng)?;

    let synthesizer: Box<dyn PlanningProblemSynthesizer> = if args.num_planning_problems == 0 {
        Box::new(NoProblems)
    } else {
        let ego = EgoProblemSynthesizer::new(args.keep_ego);
        if window_length.is_some() {
            Box::new(RandomEgoSynthesizer::new(
                ego,
                args.num_planning_problems,
                synthesizer_rng,
            ))
        } else {
            Box::new(ego)
        }
    };

    let prototype_builder =
        PrototypeBuilder::new(Box::new(ProviderMetaScenarioBuilder::new(provider)));

    // A recording-level read error is fatal, but it surfaces lazily inside
    // the stream; park it here and re-raise after the runner drains.
    let read_error: Arc<Mutex<Option<ConvertError>>> = Arc::new(Mutex::new(None));
    let slot = read_error.clone();
    let windows = source
        .recordings()
        .map_while(move |result| match result {
            Ok(pair) => Some(pair),
            Err(err) => {
                *slot.lock().unwrap() = Some(err);
                None
            }
        })
        .flat_map(move |(recording, meta)| generator.windows(recording, meta));

    let producer = JobProducer::new(
        prototype_builder,
        synthesizer,
        Box::new(windows),
        args.max_scenarios,
    );

    let check: RoutabilityCheck = args.routability_check.into();
    let routability = match check {
        RoutabilityCheck::NoCheck => None,
        RoutabilityCheck::Strict => Some(RoutabilityFilter::new(
            RoutabilityCheck::Strict,
            Arc::new(LaneletGraphOracle),
        )),
    };
    let filter = build_job_filter(window_length.is_some(), routability);

    let writer = FsScenarioWriter::new(args.output_dir.clone(), args.format.into());
    let mut consumer = JobConsumer::new(writer);
    consumer.obstacles_start_at_zero = args.obstacles_start_at_zero;
    consumer.infer_turn_indicators = args.turning_indicator;

    let runner = WorkerRunner::new(args.num_processes);
    let summary = runner.run(producer, &filter, |job| consumer.consume(job))?;

    if let Some(err) = read_error.lock().unwrap().take() {
        return Err(err.into());
    }
    info!(elapsed = ?started.elapsed(), "conversion finished");
    Ok(summary)
}
