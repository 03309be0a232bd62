use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input not found: {0}")]
    NotFound(PathBuf),
    #[error("input is not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("input is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Whole container held in memory for the duration of a run.
#[derive(Debug)]
pub struct RawContainer {
    name: String,
    data: Vec<u8>,
}

impl RawContainer {
    /// Reads the full file in one go; frames are located in memory afterwards.
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        if !path.exists() {
            return Err(ContainerError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ContainerError::NotAFile(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self { name, data })
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Container file names used by the multi-source layout: exactly eight
/// ASCII alphanumerics, no extension.
pub fn is_source_name(name: &str) -> bool {
    name.len() == 8 && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Lists the container files of a multi-source directory, sorted by name.
pub fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>, ContainerError> {
    if !dir.exists() {
        return Err(ContainerError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ContainerError::NotADirectory(dir.to_path_buf()));
    }
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if is_source_name(&name.to_string_lossy()) {
            sources.push(entry.path());
        }
    }
    sources.sort();
    Ok(sources)
}
