//! Detection worker pool
//!
//! Audio and visual inference run as separate child processes, so a crash
//! or memory spike in one model never takes down the engine. Each worker
//! prints a detection document (see [`crate::detections`]) on stdout.
//!
//! # Failure handling
//! - Concurrency is bounded by `max_workers` (1 under `low_resource_mode`)
//! - Job `i` starts `i × stagger_ms` after the first
//! - If any parallel job fails, every result of that attempt is discarded
//!   and all jobs are re-run sequentially once; a sequential failure is
//!   returned to the caller
//! - Empty or malformed stdout from a successful worker means no detections

use crate::config::WorkerConfig;
use crate::detections::{deserialize_intervals, DetectionFile};
use crate::error::{EngineError, EngineResult};
use cleanview_common::TimeInterval;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Placeholder replaced by the media path in worker commands
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// One external worker invocation
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerJob {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerJob {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    /// Build a job from a configured command line; `None` when the command is empty
    pub fn from_command(name: &str, command: &[String], input: &Path) -> Option<Self> {
        let (program, args) = command.split_first()?;
        let input = input.to_string_lossy();
        Some(Self::new(
            name,
            program.replace(INPUT_PLACEHOLDER, &input),
            args.iter()
                .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input))
                .collect(),
        ))
    }
}

/// Detections returned by one worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutput {
    pub name: String,
    pub detections: Vec<TimeInterval>,
    pub elapsed: Duration,
}

/// Bounded pool of detection worker processes
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn max_workers(&self) -> usize {
        self.config.effective_max_workers()
    }

    /// Run every job; outputs are returned in job order
    ///
    /// # Errors
    /// The error of the first failing job of the sequential retry.
    pub async fn run_all(&self, jobs: &[WorkerJob]) -> EngineResult<Vec<WorkerOutput>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        match self.run_parallel(jobs).await {
            Ok(outputs) => Ok(outputs),
            Err(e) => {
                warn!(
                    error = %e,
                    jobs = jobs.len(),
                    "Parallel detection failed; discarding partial results and retrying sequentially"
                );
                self.run_sequential(jobs).await
            }
        }
    }

    async fn run_parallel(&self, jobs: &[WorkerJob]) -> EngineResult<Vec<WorkerOutput>> {
        let stagger = Duration::from_millis(self.config.stagger_ms);
        info!(
            jobs = jobs.len(),
            max_workers = self.max_workers(),
            stagger_ms = self.config.stagger_ms,
            "Starting detection workers"
        );

        let mut results: Vec<(usize, EngineResult<WorkerOutput>)> =
            stream::iter(jobs.iter().cloned().enumerate())
                .map(|(index, job)| async move {
                    if !stagger.is_zero() && index > 0 {
                        tokio::time::sleep(stagger * index as u32).await;
                    }
                    (index, run_job(&job).await)
                })
                .buffer_unordered(self.max_workers())
                .collect()
                .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn run_sequential(&self, jobs: &[WorkerJob]) -> EngineResult<Vec<WorkerOutput>> {
        let mut outputs = Vec::with_capacity(jobs.len());
        for job in jobs {
            outputs.push(run_job(job).await?);
        }
        Ok(outputs)
    }
}

/// Run one worker process to completion
pub async fn run_job(job: &WorkerJob) -> EngineResult<WorkerOutput> {
    debug!(worker = %job.name, program = %job.program, args = ?job.args, "Running worker");
    let started = Instant::now();

    let output = tokio::task::spawn_blocking({
        let program = job.program.clone();
        let args = job.args.clone();
        move || Command::new(&program).args(&args).output()
    })
    .await
    .map_err(|e| worker_error(job, format!("Task join error: {}", e)))?
    .map_err(|e| worker_error(job, format!("Failed to start '{}': {}", job.program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(worker_error(
            job,
            format!("Exit code: {:?}, stderr: {}", output.status.code(), stderr.trim()),
        ));
    }

    let detections = parse_worker_stdout(&job.name, &String::from_utf8_lossy(&output.stdout));
    let elapsed = started.elapsed();
    info!(
        worker = %job.name,
        detections = detections.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Worker finished"
    );

    Ok(WorkerOutput {
        name: job.name.clone(),
        detections,
        elapsed,
    })
}

/// Detections from worker stdout: a detection document or a bare interval
/// array. Anything else is logged and treated as no detections.
pub fn parse_worker_stdout(name: &str, stdout: &str) -> Vec<TimeInterval> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        debug!(worker = name, "Worker produced no output");
        return Vec::new();
    }

    if let Ok(file) = DetectionFile::from_json(trimmed) {
        return file.detections;
    }
    match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
        Ok(values) => deserialize_intervals(values),
        Err(e) => {
            warn!(worker = name, error = %e, "Malformed worker output treated as no detections");
            Vec::new()
        }
    }
}

fn worker_error(job: &WorkerJob, message: String) -> EngineError {
    EngineError::Worker {
        name: job.name.clone(),
        message,
    }
}
