pub mod csv;
pub mod jsonl;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::{BatchResult, ExtractedArtifact, RunResult, RunState};

/// One row per run, written once the run reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub state: RunState,
    pub sources: u64,
    pub failed_sources: u64,
    pub total_frames_found: u64,
    pub artifacts_extracted: u64,
    pub duplicates_skipped: u64,
    pub blocks_discarded: u64,
    pub errors: u64,
    pub interrupted: u64,
}

impl From<&RunResult> for RunSummary {
    fn from(result: &RunResult) -> Self {
        Self {
            run_id: result.run_id.clone(),
            state: result.state,
            sources: 1,
            failed_sources: 0,
            total_frames_found: result.total_frames_found,
            artifacts_extracted: result.artifacts_extracted,
            duplicates_skipped: result.duplicates_skipped,
            blocks_discarded: result.blocks_discarded,
            errors: result.errors,
            interrupted: result.interrupted,
        }
    }
}

impl From<&BatchResult> for RunSummary {
    fn from(batch: &BatchResult) -> Self {
        Self {
            sources: batch.sources,
            failed_sources: batch.failed_sources,
            ..RunSummary::from(&batch.summary)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MetadataBackendKind {
    Jsonl,
    Csv,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Fields stamped onto every manifest record.
#[derive(Debug, Clone)]
pub struct RunProvenance {
    pub run_id: String,
    pub tool_version: String,
    pub config_hash: String,
    pub input_path: String,
}

impl RunProvenance {
    pub fn new(run_id: &str, tool_version: &str, config_hash: &str, input_path: &Path) -> Self {
        Self {
            run_id: run_id.to_string(),
            tool_version: tool_version.to_string(),
            config_hash: config_hash.to_string(),
            input_path: input_path.to_string_lossy().to_string(),
        }
    }
}

/// Manifest output for extracted artifacts and run summaries.
///
/// `relative_path` is the artifact's path below the run output directory.
pub trait MetadataSink: Send + Sync {
    fn record_artifact(
        &self,
        artifact: &ExtractedArtifact,
        relative_path: &str,
    ) -> Result<(), MetadataError>;
    fn record_run_summary(&self, summary: &RunSummary) -> Result<(), MetadataError>;
    fn flush(&self) -> Result<(), MetadataError>;
}

pub fn build_sink(
    backend: MetadataBackendKind,
    provenance: RunProvenance,
    run_output_dir: &Path,
) -> Result<Box<dyn MetadataSink>, MetadataError> {
    match backend {
        MetadataBackendKind::Jsonl => Ok(Box::new(jsonl::JsonlSink::new(provenance, run_output_dir)?)),
        MetadataBackendKind::Csv => Ok(Box::new(csv::CsvSink::new(provenance, run_output_dir)?)),
    }
}
