//! # Pipeline Events
//!
//! Per-frame task reports and the observer interface the pipeline reports
//! through.

use std::path::PathBuf;

use serde::Serialize;

use crate::classify::Category;

/// A payload that was decoded, admitted by the dedup index and written.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedArtifact {
    pub sequence_index: usize,
    pub container: String,
    pub source_offset: u64,
    /// Hex dedup fingerprint.
    pub content_hash: String,
    pub detected_extension: String,
    pub category: Category,
    pub byte_size: u64,
    pub output_path: PathBuf,
}

/// Checkpoint at which a task noticed the stop request.
///
/// Unbounded tasks pass `BeforeDecode`, `AfterDecode`, `BeforeWrite`;
/// windowed tasks check the duplicate index before decoding and pass
/// `BeforeDecode`, `AfterDedup`, `BeforeWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPhase {
    BeforeDecode,
    AfterDecode,
    AfterDedup,
    BeforeWrite,
}

impl InterruptPhase {
    pub fn describe(&self) -> &'static str {
        match self {
            InterruptPhase::BeforeDecode => "interrupted before decompression started",
            InterruptPhase::AfterDecode => "interrupted after decompression, before the duplicate check",
            InterruptPhase::AfterDedup => "interrupted after the duplicate check, before decompression",
            InterruptPhase::BeforeWrite => "interrupted after decompression and the duplicate check, file not written",
        }
    }
}

#[derive(Debug)]
pub enum TaskOutcome {
    Extracted(ExtractedArtifact),
    Duplicate { content_hash: String },
    Discarded { size: u64, min: u64 },
    DecodeFailed(String),
    WriteFailed(String),
    Interrupted(InterruptPhase),
}

impl TaskOutcome {
    /// Interrupted tasks do not advance progress.
    pub fn counts_as_processed(&self) -> bool {
        !matches!(self, TaskOutcome::Interrupted(_))
    }
}

#[derive(Debug)]
pub struct TaskReport {
    pub index: usize,
    pub offset: u64,
    pub container: String,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn prefix(&self) -> String {
        format!("[frame {:04} @ 0x{:08X}]", self.index + 1, self.offset)
    }

    pub fn message(&self) -> String {
        let prefix = self.prefix();
        match &self.outcome {
            TaskOutcome::Extracted(artifact) => {
                let name = artifact
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!(
                    "{prefix} extracted {name} -> {} ({:.2} KiB, hash {})",
                    artifact.category,
                    artifact.byte_size as f64 / 1024.0,
                    short_hash(&artifact.content_hash)
                )
            }
            TaskOutcome::Duplicate { content_hash } => {
                format!("{prefix} skipped duplicate (hash {})", short_hash(content_hash))
            }
            TaskOutcome::Discarded { size, min } => {
                format!("{prefix} discarded {size} byte block (minimum {min})")
            }
            TaskOutcome::DecodeFailed(err) => format!("{prefix} decompression failed: {err}"),
            TaskOutcome::WriteFailed(err) => format!("{prefix} write failed: {err}"),
            TaskOutcome::Interrupted(phase) => format!("{prefix} {}", phase.describe()),
        }
    }
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}

/// Receives everything a run reports. Calls come from the orchestrating
/// thread only, in dispatch order for the serial policy.
pub trait ExtractionObserver: Send + Sync {
    fn on_log(&self, _line: &str) {}
    fn on_progress(&self, _done: usize, _total: usize) {}
    fn on_artifact(&self, _artifact: &ExtractedArtifact) {}
    fn on_finished(&self, _artifacts_extracted: u64) {}
    fn on_error(&self, _message: &str) {}
}

/// Observer that drops every event.
pub struct NullObserver;

impl ExtractionObserver for NullObserver {}
