//! Shared helpers for the integration tests: synthetic containers built from
//! real zstd frames and an observer that records every event.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use npkcarve::config::Config;
use npkcarve::pipeline::{ExtractedArtifact, ExtractionObserver};

pub const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

pub fn frame(payload: &[u8]) -> Vec<u8> {
    zstd::encode_all(payload, 3).expect("encode frame")
}

/// Concatenate one frame per payload, returning the buffer and each frame's
/// start offset.
pub fn container_of(payloads: &[Vec<u8>]) -> (Vec<u8>, Vec<u64>) {
    let mut data = Vec::new();
    let mut offsets = Vec::new();
    for payload in payloads {
        offsets.push(data.len() as u64);
        data.extend_from_slice(&frame(payload));
    }
    (data, offsets)
}

/// Payload that starts with a fixed tag and differs per `seed`.
pub fn tagged_payload(tag: &[u8], seed: u32, len: usize) -> Vec<u8> {
    let mut payload = tag.to_vec();
    payload.extend_from_slice(&seed.to_le_bytes());
    payload.extend(std::iter::repeat_n(b'.', len.saturating_sub(payload.len())));
    payload
}

/// 7-bit pseudo random bytes; never contains the frame signature and
/// compresses poorly.
pub fn noise(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((state >> 16) & 0x7F) as u8
        })
        .collect()
}

pub fn serial_config(run_id: &str) -> Config {
    Config {
        run_id: run_id.to_string(),
        fast_mode: false,
        ..Config::default()
    }
}

pub fn parallel_config(run_id: &str, threads: usize) -> Config {
    Config {
        run_id: run_id.to_string(),
        fast_mode: true,
        max_threads: threads,
        ..Config::default()
    }
}

pub fn write_input(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write input");
    path
}

pub fn files_in(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub logs: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub artifacts: Mutex<Vec<ExtractedArtifact>>,
    pub finished: Mutex<Vec<u64>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().expect("lock").clone()
    }

    pub fn frame_logs(&self) -> Vec<String> {
        self.logs()
            .into_iter()
            .filter(|line| line.starts_with("[frame "))
            .collect()
    }

    pub fn artifacts(&self) -> Vec<ExtractedArtifact> {
        self.artifacts.lock().expect("lock").clone()
    }

    pub fn hashes(&self) -> Vec<String> {
        let mut hashes: Vec<String> = self
            .artifacts()
            .into_iter()
            .map(|a| a.content_hash)
            .collect();
        hashes.sort();
        hashes
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.progress.lock().expect("lock").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("lock").clone()
    }
}

impl ExtractionObserver for RecordingObserver {
    fn on_log(&self, line: &str) {
        self.logs.lock().expect("lock").push(line.to_string());
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.progress.lock().expect("lock").push((done, total));
    }

    fn on_artifact(&self, artifact: &ExtractedArtifact) {
        self.artifacts.lock().expect("lock").push(artifact.clone());
    }

    fn on_finished(&self, artifacts_extracted: u64) {
        self.finished.lock().expect("lock").push(artifacts_extracted);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().expect("lock").push(message.to_string());
    }
}
