use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::classify::Category;
use crate::metadata::{MetadataError, MetadataSink, RunProvenance, RunSummary};
use crate::pipeline::ExtractedArtifact;

pub struct JsonlSink {
    provenance: RunProvenance,
    artifacts_writer: Mutex<BufWriter<File>>,
    run_writer: Mutex<BufWriter<File>>,
}

#[derive(Serialize)]
struct ArtifactRecord<'a> {
    run_id: &'a str,
    sequence_index: usize,
    container: &'a str,
    source_offset: u64,
    content_hash: &'a str,
    detected_extension: &'a str,
    category: Category,
    byte_size: u64,
    path: &'a str,
    tool_version: &'a str,
    config_hash: &'a str,
    input_path: &'a str,
}

#[derive(Serialize)]
struct RunSummaryRecord<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    tool_version: &'a str,
    config_hash: &'a str,
    input_path: &'a str,
}

impl JsonlSink {
    pub fn new(provenance: RunProvenance, run_output_dir: &Path) -> Result<Self, MetadataError> {
        let meta_dir = run_output_dir.join("metadata");
        std::fs::create_dir_all(&meta_dir)?;
        let artifacts = File::create(meta_dir.join("artifacts.jsonl"))?;
        let runs = File::create(meta_dir.join("run_summary.jsonl"))?;
        Ok(Self {
            provenance,
            artifacts_writer: Mutex::new(BufWriter::new(artifacts)),
            run_writer: Mutex::new(BufWriter::new(runs)),
        })
    }
}

fn write_line<T: Serialize>(writer: &Mutex<BufWriter<File>>, record: &T) -> Result<(), MetadataError> {
    let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
    serde_json::to_writer(&mut *guard, record)?;
    guard.write_all(b"\n")?;
    Ok(())
}

impl MetadataSink for JsonlSink {
    fn record_artifact(
        &self,
        artifact: &ExtractedArtifact,
        relative_path: &str,
    ) -> Result<(), MetadataError> {
        let record = ArtifactRecord {
            run_id: &self.provenance.run_id,
            sequence_index: artifact.sequence_index,
            container: &artifact.container,
            source_offset: artifact.source_offset,
            content_hash: &artifact.content_hash,
            detected_extension: &artifact.detected_extension,
            category: artifact.category,
            byte_size: artifact.byte_size,
            path: relative_path,
            tool_version: &self.provenance.tool_version,
            config_hash: &self.provenance.config_hash,
            input_path: &self.provenance.input_path,
        };
        write_line(&self.artifacts_writer, &record)
    }

    fn record_run_summary(&self, summary: &RunSummary) -> Result<(), MetadataError> {
        let record = RunSummaryRecord {
            summary,
            tool_version: &self.provenance.tool_version,
            config_hash: &self.provenance.config_hash,
            input_path: &self.provenance.input_path,
        };
        write_line(&self.run_writer, &record)
    }

    fn flush(&self) -> Result<(), MetadataError> {
        self.artifacts_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        self.run_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}
