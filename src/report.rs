//! Observer used by the command line front end: forwards pipeline lines to
//! `tracing`, throttles progress output and records every artifact in the
//! metadata manifest.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::metadata::MetadataSink;
use crate::pipeline::{ExtractedArtifact, ExtractionObserver};

pub struct CliReporter {
    sink: Arc<dyn MetadataSink>,
    run_output_dir: PathBuf,
    interval: Duration,
    last_progress: Mutex<Option<Instant>>,
    metadata_errors: AtomicU64,
}

impl CliReporter {
    pub fn new(sink: Arc<dyn MetadataSink>, run_output_dir: &Path, interval: Duration) -> Self {
        Self {
            sink,
            run_output_dir: run_output_dir.to_path_buf(),
            interval,
            last_progress: Mutex::new(None),
            metadata_errors: AtomicU64::new(0),
        }
    }

    pub fn metadata_errors(&self) -> u64 {
        self.metadata_errors.load(Ordering::Relaxed)
    }

    fn relative<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.run_output_dir)
            .unwrap_or(path)
            .to_string_lossy()
    }
}

impl ExtractionObserver for CliReporter {
    fn on_log(&self, line: &str) {
        info!("{line}");
    }

    fn on_progress(&self, done: usize, total: usize) {
        let mut last = self
            .last_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let due = match *last {
            None => true,
            Some(at) => self.interval.is_zero() || at.elapsed() >= self.interval,
        };
        if due || done == total {
            let pct = if total == 0 {
                100.0
            } else {
                done as f64 * 100.0 / total as f64
            };
            info!("progress {done}/{total} ({pct:.1}%)");
            *last = Some(Instant::now());
        }
    }

    fn on_artifact(&self, artifact: &ExtractedArtifact) {
        let relative = self.relative(&artifact.output_path);
        if let Err(err) = self.sink.record_artifact(artifact, &relative) {
            self.metadata_errors.fetch_add(1, Ordering::Relaxed);
            warn!("metadata record failed for {relative}: {err}");
        }
    }

    fn on_finished(&self, artifacts_extracted: u64) {
        info!("run finished, {artifacts_extracted} artifacts");
    }

    fn on_error(&self, message: &str) {
        error!("{message}");
    }
}
