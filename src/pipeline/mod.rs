//! # Pipeline Module
//!
//! Orchestrates a run: load the container, scan for frame signatures, then
//! run one extraction task per location either serially or on a bounded
//! worker pool. Everything a task needs travels in a [`RunContext`] built
//! fresh for each run.

pub mod events;
pub mod handle;
mod task;
pub mod workers;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::bounded;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::constants::{CHANNEL_CAPACITY_MULTIPLIER, MIB, MIN_CHANNEL_CAPACITY};
use crate::container::{ContainerError, RawContainer};
use crate::dedup::DedupIndex;
use crate::extract::{BoundPolicy, FrameExtractor};
use crate::output::{NamingScheme, OutputWriter, ensure_output_dir};
use crate::scanner::{self, FrameLocation, SignatureScanner};

pub use events::{ExtractedArtifact, ExtractionObserver, NullObserver, TaskOutcome, TaskReport};
pub use handle::{ExtractionHandle, start};

const RULE: &str = "------------------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Scanning,
    Extracting,
    Completed,
    Stopped,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Scanning => "scanning",
            RunState::Extracting => "extracting",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input not found: {0}")]
    InputMissing(PathBuf),
    #[error("cannot load container: {0}")]
    Container(#[from] ContainerError),
    #[error("output root {} is unusable: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("extraction thread panicked")]
    Panicked,
}

/// Terminal summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub state: RunState,
    pub total_frames_found: u64,
    pub artifacts_extracted: u64,
    pub duplicates_skipped: u64,
    pub blocks_discarded: u64,
    /// Decode and write failures.
    pub errors: u64,
    pub interrupted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    #[serde(flatten)]
    pub summary: RunResult,
    pub sources: u64,
    pub failed_sources: u64,
}

/// Per-run state injected into every task.
pub struct RunContext {
    pub extractor: FrameExtractor,
    pub dedup: DedupIndex,
    pub writer: OutputWriter,
    pub cancel: CancellationToken,
    pub type_detection: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    frames_found: u64,
    extracted: u64,
    duplicates: u64,
    discarded: u64,
    errors: u64,
    interrupted: u64,
}

impl Tally {
    fn absorb(&mut self, other: Tally) {
        self.frames_found += other.frames_found;
        self.extracted += other.extracted;
        self.duplicates += other.duplicates;
        self.discarded += other.discarded;
        self.errors += other.errors;
        self.interrupted += other.interrupted;
    }
}

/// Orchestrator-side bookkeeping for one container.
struct ContainerProgress<'a> {
    naming: &'a NamingScheme,
    total: usize,
    processed: usize,
    next_block: usize,
}

impl<'a> ContainerProgress<'a> {
    fn new(naming: &'a NamingScheme, total: usize) -> Self {
        Self {
            naming,
            total,
            processed: 0,
            next_block: 0,
        }
    }
}

pub struct ExtractionPipeline {
    cfg: Config,
    scanner: Arc<dyn SignatureScanner>,
    observer: Arc<dyn ExtractionObserver>,
    cancel: CancellationToken,
    state: Mutex<RunState>,
}

impl ExtractionPipeline {
    pub fn new(cfg: Config, observer: Arc<dyn ExtractionObserver>) -> Self {
        Self {
            cfg,
            scanner: Arc::from(scanner::build_frame_scanner()),
            observer,
            cancel: CancellationToken::new(),
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn SignatureScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Share an externally owned token, e.g. one wired to Ctrl+C.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns immediately; running tasks notice at their next checkpoint.
    /// The request applies to the run in progress, or to the next run when
    /// none is. The flag is cleared once that run has ended, so a shared
    /// Ctrl+C token stays usable for later runs.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!("run state {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Run against a single container file.
    pub fn run(&self, input: &Path, output_root: &Path) -> Result<RunResult, PipelineError> {
        let result = if input.exists() {
            self.prepare(output_root).and_then(|()| {
                self.set_state(RunState::Scanning);
                Ok(RawContainer::open(input)?)
            })
        } else {
            Err(PipelineError::InputMissing(input.to_path_buf()))
        };
        match result {
            Ok(container) => {
                self.log(RULE);
                self.log(&format!("file: {}", input.display()));
                self.log(&format!(
                    "size: {} bytes ({:.2} MiB)",
                    container.len(),
                    container.len() as f64 / MIB as f64
                ));
                Ok(self.run_loaded(container, output_root))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Run against a container already held in memory.
    pub fn run_container(
        &self,
        container: RawContainer,
        output_root: &Path,
    ) -> Result<RunResult, PipelineError> {
        if let Err(err) = self.prepare(output_root) {
            return Err(self.fail(err));
        }
        Ok(self.run_loaded(container, output_root))
    }

    /// Multi-source run: every container shares one dedup index and files
    /// are named after their container.
    pub fn run_batch(
        &self,
        sources: &[PathBuf],
        output_root: &Path,
    ) -> Result<BatchResult, PipelineError> {
        if let Err(err) = self.prepare(output_root) {
            return Err(self.fail(err));
        }
        let ctx = Arc::new(self.new_context(output_root));
        self.log(&format!(
            "batch of {} containers, output {}",
            sources.len(),
            output_root.display()
        ));

        let mut tally = Tally::default();
        let mut failed_sources = 0u64;
        for source in sources {
            if self.cancel.is_cancelled() {
                break;
            }
            self.set_state(RunState::Scanning);
            let container = match RawContainer::open(source) {
                Ok(container) => container,
                Err(err) => {
                    failed_sources += 1;
                    let msg = format!("{}: {err}", source.display());
                    warn!("container load failed: {msg}");
                    self.observer.on_error(&msg);
                    continue;
                }
            };
            let naming = NamingScheme::Block {
                container: container.name().to_string(),
            };
            let name = container.name().to_string();
            let outcome = self.extract_container(&ctx, Arc::new(container), naming);
            self.log(&format!(
                "{name}: {} blocks scanned, {} extracted",
                outcome.frames_found, outcome.extracted
            ));
            tally.absorb(outcome);
        }

        let summary = self.finish(tally);
        info!(
            "batch_summary sources={} failed_sources={} blocks={} extracted={}",
            sources.len(),
            failed_sources,
            summary.total_frames_found,
            summary.artifacts_extracted
        );
        Ok(BatchResult {
            summary,
            sources: sources.len() as u64,
            failed_sources,
        })
    }

    fn prepare(&self, output_root: &Path) -> Result<(), PipelineError> {
        self.cfg
            .validate()
            .map_err(|err| PipelineError::Config(err.to_string()))?;
        ensure_output_dir(output_root).map_err(|source| PipelineError::OutputRoot {
            path: output_root.to_path_buf(),
            source,
        })
    }

    fn fail(&self, err: PipelineError) -> PipelineError {
        self.set_state(RunState::Failed);
        self.cancel.reset();
        error!("run failed: {err}");
        self.observer.on_error(&err.to_string());
        err
    }

    fn log(&self, line: &str) {
        self.observer.on_log(line);
    }

    fn new_context(&self, output_root: &Path) -> RunContext {
        RunContext {
            extractor: FrameExtractor::new(self.cfg.bound_policy, self.cfg.min_block_size),
            dedup: DedupIndex::new(self.cfg.enable_dedup),
            writer: OutputWriter::new(output_root),
            cancel: self.cancel.clone(),
            type_detection: self.cfg.enable_type_detection,
        }
    }

    fn run_loaded(&self, container: RawContainer, output_root: &Path) -> RunResult {
        let ctx = Arc::new(self.new_context(output_root));
        let tally = self.extract_container(&ctx, Arc::new(container), NamingScheme::Frame);
        self.finish(tally)
    }

    fn extract_container(
        &self,
        ctx: &Arc<RunContext>,
        container: Arc<RawContainer>,
        naming: NamingScheme,
    ) -> Tally {
        let mut tally = Tally::default();

        self.set_state(RunState::Scanning);
        self.log(&format!("scanning {} for zstd frames", container.name()));
        let mut locations = self.scanner.scan(container.as_bytes());
        if self.cfg.bound_policy == BoundPolicy::Windowed {
            scanner::apply_windows(&mut locations, container.len(), self.cfg.max_block_size);
        }
        tally.frames_found = locations.len() as u64;

        if self.cancel.is_cancelled() {
            self.log("stopped after scanning");
            return tally;
        }

        let total = locations.len();
        self.log(&format!("found {total} zstd frames"));
        self.set_state(RunState::Extracting);
        if total == 0 {
            return tally;
        }
        self.observer.on_progress(0, total);

        if self.cfg.fast_mode {
            let workers = self.cfg.max_threads.max(1);
            self.log(&format!("[fast mode] {workers} worker threads"));
            self.extract_parallel(ctx, container, locations, naming, workers, &mut tally);
        } else {
            self.log("[serial mode] single thread");
            self.extract_serial(ctx, &container, &locations, &naming, &mut tally);
        }
        tally
    }

    fn extract_serial(
        &self,
        ctx: &RunContext,
        container: &RawContainer,
        locations: &[FrameLocation],
        naming: &NamingScheme,
        tally: &mut Tally,
    ) {
        let mut progress = ContainerProgress::new(naming, locations.len());
        for location in locations {
            if self.cancel.is_cancelled() {
                break;
            }
            let report = task::run_task(ctx, container, location, naming);
            self.handle_report(ctx, report, &mut progress, tally);
        }
    }

    fn extract_parallel(
        &self,
        ctx: &Arc<RunContext>,
        container: Arc<RawContainer>,
        locations: Vec<FrameLocation>,
        naming: NamingScheme,
        workers: usize,
        tally: &mut Tally,
    ) {
        let total = locations.len();
        let channel_cap = workers
            .saturating_mul(CHANNEL_CAPACITY_MULTIPLIER)
            .max(MIN_CHANNEL_CAPACITY);
        let (job_tx, job_rx) = bounded::<FrameLocation>(channel_cap);
        let (report_tx, report_rx) = bounded::<TaskReport>(channel_cap);

        let dispatcher = workers::spawn_dispatcher(locations, job_tx, self.cancel.clone());
        let handles = workers::spawn_extract_workers(
            workers,
            ctx.clone(),
            container,
            naming.clone(),
            job_rx,
            report_tx,
        );

        // Reports are handled in frame order so block counters do not
        // depend on worker scheduling.
        let mut progress = ContainerProgress::new(&naming, total);
        let mut pending: BTreeMap<usize, TaskReport> = BTreeMap::new();
        let mut next_index = 0usize;
        for report in report_rx {
            pending.insert(report.index, report);
            while let Some(report) = pending.remove(&next_index) {
                next_index += 1;
                self.handle_report(ctx, report, &mut progress, tally);
            }
        }
        // Only reachable when the dispatcher stopped early.
        for report in pending.into_values() {
            self.handle_report(ctx, report, &mut progress, tally);
        }

        if dispatcher.join().is_err() {
            warn!("frame dispatcher panicked");
        }
        for handle in handles {
            if handle.join().is_err() {
                tally.errors += 1;
                warn!("extraction worker panicked");
            }
        }
    }

    fn handle_report(
        &self,
        ctx: &RunContext,
        mut report: TaskReport,
        progress: &mut ContainerProgress<'_>,
        tally: &mut Tally,
    ) {
        let promoted = match &report.outcome {
            TaskOutcome::Extracted(artifact) => progress
                .naming
                .block_file_name(progress.next_block, &artifact.detected_extension)
                .map(|name| ctx.writer.promote(&artifact.output_path, &name)),
            _ => None,
        };
        match promoted {
            Some(Ok(path)) => {
                if let TaskOutcome::Extracted(artifact) = &mut report.outcome {
                    artifact.output_path = path;
                }
                progress.next_block += 1;
            }
            Some(Err(err)) => {
                report.outcome = TaskOutcome::WriteFailed(format!("renaming staged block: {err}"));
            }
            None => {}
        }

        let frame = report.index + 1;
        let offset = report.offset;
        match &report.outcome {
            TaskOutcome::Extracted(artifact) => {
                tally.extracted += 1;
                debug!(frame, offset, path = %artifact.output_path.display(), "frame extracted");
            }
            TaskOutcome::Duplicate { content_hash } => {
                tally.duplicates += 1;
                debug!(frame, offset, hash = %content_hash, "duplicate frame skipped");
            }
            TaskOutcome::Discarded { size, .. } => {
                tally.discarded += 1;
                debug!(frame, offset, size, "block below minimum size discarded");
            }
            TaskOutcome::DecodeFailed(err) => {
                tally.errors += 1;
                warn!(frame, offset, container = %report.container, "decode failed: {err}");
            }
            TaskOutcome::WriteFailed(err) => {
                tally.errors += 1;
                warn!(frame, offset, container = %report.container, "write failed: {err}");
            }
            TaskOutcome::Interrupted(phase) => {
                tally.interrupted += 1;
                debug!(frame, offset, "{}", phase.describe());
            }
        }

        self.log(&report.message());
        if let TaskOutcome::Extracted(artifact) = &report.outcome {
            self.observer.on_artifact(artifact);
        }
        if report.outcome.counts_as_processed() {
            progress.processed += 1;
            self.observer.on_progress(progress.processed, progress.total);
        }
    }

    fn finish(&self, tally: Tally) -> RunResult {
        let state = if self.cancel.is_cancelled() {
            RunState::Stopped
        } else {
            RunState::Completed
        };
        self.set_state(state);
        self.cancel.reset();

        if state == RunState::Stopped {
            self.log("extraction stopped");
        } else {
            self.log(RULE);
            self.log(&format!(
                "extraction complete: {} unique files extracted",
                tally.extracted
            ));
        }
        self.observer.on_finished(tally.extracted);

        let result = RunResult {
            run_id: self.cfg.run_id.clone(),
            state,
            total_frames_found: tally.frames_found,
            artifacts_extracted: tally.extracted,
            duplicates_skipped: tally.duplicates,
            blocks_discarded: tally.discarded,
            errors: tally.errors,
            interrupted: tally.interrupted,
        };
        info!(
            "run_summary state={} frames_found={} extracted={} duplicates={} discarded={} errors={} interrupted={}",
            result.state,
            result.total_frames_found,
            result.artifacts_extracted,
            result.duplicates_skipped,
            result.blocks_discarded,
            result.errors,
            result.interrupted
        );
        result
    }
}
