//! Background run control: start a pipeline on its own thread and stop or
//! join it from the caller.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::config::Config;

use super::events::ExtractionObserver;
use super::{ExtractionPipeline, PipelineError, RunResult};

pub struct ExtractionHandle {
    cancel: CancellationToken,
    thread: JoinHandle<Result<RunResult, PipelineError>>,
}

/// Run `input` into `output_root` on a background thread.
pub fn start(
    input: impl Into<PathBuf>,
    output_root: impl Into<PathBuf>,
    config: Config,
    observer: Arc<dyn ExtractionObserver>,
) -> ExtractionHandle {
    let input = input.into();
    let output_root = output_root.into();
    let pipeline = ExtractionPipeline::new(config, observer);
    let cancel = pipeline.cancel_token();
    let thread = thread::spawn(move || pipeline.run(&input, &output_root));
    ExtractionHandle { cancel, thread }
}

impl ExtractionHandle {
    /// Sets the stop flag and returns without waiting.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<RunResult, PipelineError> {
        self.thread.join().map_err(|_| PipelineError::Panicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{NullObserver, RunState};

    #[test]
    fn join_returns_run_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("one.npk");
        std::fs::write(&input, zstd::encode_all(&b"AKPK package"[..], 0).expect("encode"))
            .expect("write");

        let handle = start(&input, dir.path().join("out"), Config::default(), Arc::new(NullObserver));
        let result = handle.join().expect("run");
        assert_eq!(result.state, RunState::Completed);
        assert_eq!(result.artifacts_extracted, 1);
        assert!(dir.path().join("out").join("package").join("extracted_frame_1.npk").exists());
    }

    #[test]
    fn setup_failure_surfaces_through_join() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = start(
            dir.path().join("absent"),
            dir.path().join("out"),
            Config::default(),
            Arc::new(NullObserver),
        );
        assert!(matches!(handle.join(), Err(PipelineError::InputMissing(_))));
    }
}
