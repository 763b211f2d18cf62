// scenarize_core/src/runner.rs

//! Executes the job stream, sequentially or on a worker pool.
//!
//! Production stays on the calling thread; consumption is distributed. Job
//! completion order is therefore unspecified, which is fine because every
//! scenario id is self-identifying. A failing job is logged and counted but
//! never takes the pool down.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::{info, warn};

use crate::error::{ConvertError, Result};
use crate::pipeline::{ConsumeOutcome, Job, JobFilter};

const PROGRESS_INTERVAL: usize = 100;

/// Counters of one pipeline run. Recoverable skips are visible here; they do
/// not affect the process outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs pulled from the producer.
    pub produced: usize,
    /// Jobs rejected by the filter chain.
    pub filtered_out: usize,
    /// Scenarios written by the persistence collaborator.
    pub written: usize,
    /// Jobs whose scenario had no dynamic obstacles.
    pub dropped_empty: usize,
    /// Jobs that failed with a recoverable per-job error.
    pub failed: usize,
}

/// Single-producer / multi-consumer runner.
pub struct WorkerRunner {
    /// Number of consumer workers; one means fully sequential execution.
    pub num_workers: usize,
    /// Upper bound on the number of jobs, when the generator knows it. Used
    /// only to avoid spawning more workers than jobs.
    pub job_count_hint: Option<usize>,
}

impl WorkerRunner {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            job_count_hint: None,
        }
    }

    /// Drain `jobs`, applying the filter and handing surviving jobs to
    /// `process`. Returns the run counters once the stream is exhausted.
    pub fn run<I, F>(&self, jobs: I, filter: &JobFilter, process: F) -> Result<RunSummary>
    where
        I: Iterator<Item = Job> + Send,
        F: Fn(Job) -> Result<ConsumeOutcome> + Send + Sync,
    {
        let mut num_workers = self.num_workers.max(1);
        if let Some(count) = self.job_count_hint {
            num_workers = num_workers.min(count.max(1));
        }

        let produced = AtomicUsize::new(0);
        let filtered_out = AtomicUsize::new(0);
        let written = AtomicUsize::new(0);
        let dropped_empty = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        let handle = |job: Job| {
            let seen = produced.fetch_add(1, Ordering::Relaxed) + 1;
            if seen % PROGRESS_INTERVAL == 0 {
                info!(jobs = seen, "creating scenarios");
            }
            if !filter(&job) {
                filtered_out.fetch_add(1, Ordering::Relaxed);
                return;
            }
            match process(job) {
                Ok(ConsumeOutcome::Written(_)) => {
                    written.fetch_add(1, Ordering::Relaxed);
                }
                Ok(ConsumeOutcome::DroppedEmpty) => {
                    dropped_empty.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(%err, "job failed");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        };

        if num_workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .build()
                .map_err(|err| ConvertError::InvalidConfig(err.to_string()))?;
            pool.install(|| jobs.par_bridge().for_each(handle));
        } else {
            for job in jobs {
                handle(job);
            }
        }

        let summary = RunSummary {
            produced: produced.into_inner(),
            filtered_out: filtered_out.into_inner(),
            written: written.into_inner(),
            dropped_empty: dropped_empty.into_inner(),
            failed: failed.into_inner(),
        };
        info!(
            produced = summary.produced,
            filtered_out = summary.filtered_out,
            written = summary.written,
            dropped_empty = summary.dropped_empty,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{accept_all, reject_empty_problems};
    use crate::prototype::testing::straight_prototype;
    use crate::scenario::ScenarioId;
    use crate::window::testing::car_window;
    use std::sync::atomic::AtomicUsize;

    fn job() -> Job {
        Job {
            window: car_window(&[(0, &[0, 1, 2])], 1.0),
            prototype: straight_prototype(100.0),
            problems: Vec::new(),
        }
    }

    fn written_id() -> ScenarioId {
        straight_prototype(100.0).id
    }

    #[test]
    fn sequential_run_counts_outcomes() {
        let runner = WorkerRunner::new(1);
        let jobs = vec![job(), job(), job()];
        let counter = AtomicUsize::new(0);
        let summary = runner
            .run(jobs.into_iter(), &accept_all(), |_| {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                if n == 0 {
                    Ok(ConsumeOutcome::DroppedEmpty)
                } else {
                    Ok(ConsumeOutcome::Written(written_id()))
                }
            })
            .unwrap();
        assert_eq!(summary.produced, 3);
        assert_eq!(summary.written, 2);
        assert_eq!(summary.dropped_empty, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn filtered_jobs_never_reach_the_consumer() {
        let runner = WorkerRunner::new(1);
        let jobs = vec![job(), job()];
        let summary = runner
            .run(jobs.into_iter(), &reject_empty_problems(), |_| {
                panic!("consumer must not run")
            })
            .unwrap();
        assert_eq!(summary.produced, 2);
        assert_eq!(summary.filtered_out, 2);
        assert_eq!(summary.written, 0);
    }

    #[test]
    fn parallel_run_processes_every_job() {
        let runner = WorkerRunner {
            num_workers: 4,
            job_count_hint: None,
        };
        let jobs: Vec<Job> = (0..50).map(|_| job()).collect();
        let summary = runner
            .run(jobs.into_iter(), &accept_all(), |_| {
                Ok(ConsumeOutcome::Written(written_id()))
            })
            .unwrap();
        assert_eq!(summary.produced, 50);
        assert_eq!(summary.written, 50);
    }

    #[test]
    fn worker_count_is_capped_by_the_job_count_hint() {
        let runner = WorkerRunner {
            num_workers: 8,
            job_count_hint: Some(1),
        };
        // With the cap at one job the run degenerates to sequential; a
        // panicking pool would surface here.
        let summary = runner
            .run(vec![job()].into_iter(), &accept_all(), |_| {
                Ok(ConsumeOutcome::Written(written_id()))
            })
            .unwrap();
        assert_eq!(summary.written, 1);
    }

    #[test]
    fn job_failures_are_isolated() {
        let runner = WorkerRunner::new(2);
        let jobs: Vec<Job> = (0..10).map(|_| job()).collect();
        let counter = AtomicUsize::new(0);
        let summary = runner
            .run(jobs.into_iter(), &accept_all(), |_| {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                if n % 2 == 0 {
                    Err(ConvertError::Serialization("disk on fire".into()))
                } else {
                    Ok(ConsumeOutcome::Written(written_id()))
                }
            })
            .unwrap();
        assert_eq!(summary.produced, 10);
        assert_eq!(summary.written + summary.failed, 10);
        assert_eq!(summary.failed, 5);
    }
}
