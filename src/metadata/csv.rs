use std::fs::File;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::metadata::{MetadataError, MetadataSink, RunProvenance, RunSummary};
use crate::pipeline::ExtractedArtifact;

pub struct CsvSink {
    provenance: RunProvenance,
    artifacts_writer: Mutex<csv::Writer<File>>,
    run_writer: Mutex<csv::Writer<File>>,
}

#[derive(Serialize)]
struct ArtifactCsv<'a> {
    run_id: &'a str,
    sequence_index: usize,
    container: &'a str,
    source_offset: u64,
    content_hash: &'a str,
    detected_extension: &'a str,
    category: &'a str,
    byte_size: u64,
    path: &'a str,
    tool_version: &'a str,
    config_hash: &'a str,
    input_path: &'a str,
}

#[derive(Serialize)]
struct RunSummaryCsv<'a> {
    run_id: &'a str,
    state: String,
    sources: u64,
    failed_sources: u64,
    total_frames_found: u64,
    artifacts_extracted: u64,
    duplicates_skipped: u64,
    blocks_discarded: u64,
    errors: u64,
    interrupted: u64,
    tool_version: &'a str,
    config_hash: &'a str,
    input_path: &'a str,
}

impl CsvSink {
    pub fn new(provenance: RunProvenance, run_output_dir: &Path) -> Result<Self, MetadataError> {
        let meta_dir = run_output_dir.join("metadata");
        std::fs::create_dir_all(&meta_dir)?;

        let artifacts_file = File::create(meta_dir.join("artifacts.csv"))?;
        let run_file = File::create(meta_dir.join("run_summary.csv"))?;

        let mut artifacts_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(artifacts_file);
        let mut run_writer = csv::WriterBuilder::new().has_headers(false).from_writer(run_file);

        artifacts_writer.write_record([
            "run_id",
            "sequence_index",
            "container",
            "source_offset",
            "content_hash",
            "detected_extension",
            "category",
            "byte_size",
            "path",
            "tool_version",
            "config_hash",
            "input_path",
        ])?;

        run_writer.write_record([
            "run_id",
            "state",
            "sources",
            "failed_sources",
            "total_frames_found",
            "artifacts_extracted",
            "duplicates_skipped",
            "blocks_discarded",
            "errors",
            "interrupted",
            "tool_version",
            "config_hash",
            "input_path",
        ])?;

        Ok(Self {
            provenance,
            artifacts_writer: Mutex::new(artifacts_writer),
            run_writer: Mutex::new(run_writer),
        })
    }
}

impl MetadataSink for CsvSink {
    fn record_artifact(
        &self,
        artifact: &ExtractedArtifact,
        relative_path: &str,
    ) -> Result<(), MetadataError> {
        let record = ArtifactCsv {
            run_id: &self.provenance.run_id,
            sequence_index: artifact.sequence_index,
            container: &artifact.container,
            source_offset: artifact.source_offset,
            content_hash: &artifact.content_hash,
            detected_extension: &artifact.detected_extension,
            category: artifact.category.as_str(),
            byte_size: artifact.byte_size,
            path: relative_path,
            tool_version: &self.provenance.tool_version,
            config_hash: &self.provenance.config_hash,
            input_path: &self.provenance.input_path,
        };
        let mut guard = self
            .artifacts_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.serialize(record)?;
        Ok(())
    }

    fn record_run_summary(&self, summary: &RunSummary) -> Result<(), MetadataError> {
        let record = RunSummaryCsv {
            run_id: &summary.run_id,
            state: summary.state.to_string(),
            sources: summary.sources,
            failed_sources: summary.failed_sources,
            total_frames_found: summary.total_frames_found,
            artifacts_extracted: summary.artifacts_extracted,
            duplicates_skipped: summary.duplicates_skipped,
            blocks_discarded: summary.blocks_discarded,
            errors: summary.errors,
            interrupted: summary.interrupted,
            tool_version: &self.provenance.tool_version,
            config_hash: &self.provenance.config_hash,
            input_path: &self.provenance.input_path,
        };
        let mut guard = self.run_writer.lock().unwrap_or_else(PoisonError::into_inner);
        guard.serialize(record)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), MetadataError> {
        let mut artifacts = self
            .artifacts_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut run = self.run_writer.lock().unwrap_or_else(PoisonError::into_inner);
        artifacts.flush()?;
        run.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_support;
    use tempfile::tempdir;

    #[test]
    fn writes_csv_files() {
        let dir = tempdir().expect("tempdir");
        let sink = CsvSink::new(test_support::provenance(), dir.path()).expect("csv sink");

        let artifact = test_support::artifact(dir.path());
        sink.record_artifact(&artifact, "image/extracted_frame_3.png")
            .expect("record artifact");
        sink.record_run_summary(&test_support::summary())
            .expect("record summary");
        sink.flush().expect("flush");

        let mut reader =
            csv::Reader::from_path(dir.path().join("metadata").join("artifacts.csv")).expect("reader");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(&headers[0], "run_id");
        assert_eq!(&headers[6], "category");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("row")).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][6], "image");
        assert_eq!(&rows[0][8], "image/extracted_frame_3.png");

        let summary = std::fs::read_to_string(dir.path().join("metadata").join("run_summary.csv"))
            .expect("read");
        let mut lines = summary.lines();
        assert!(lines.next().expect("header").starts_with("run_id,state,"));
        assert!(lines.next().expect("row").starts_with("run1,completed,1,0,4,3,1,"));
    }
}
