use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::Config;
use crate::extract::BoundPolicy;
use crate::metadata::MetadataBackendKind;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataBackend {
    Jsonl,
    Csv,
}

impl From<MetadataBackend> for MetadataBackendKind {
    fn from(backend: MetadataBackend) -> Self {
        match backend {
            MetadataBackend::Jsonl => MetadataBackendKind::Jsonl,
            MetadataBackend::Csv => MetadataBackendKind::Csv,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Container file, or a directory of 8-character container files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory; each run writes into <output>/<run_id>
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Dispatch frames one at a time on the main thread
    #[arg(long)]
    pub serial: bool,

    /// Worker threads for the parallel policy
    #[arg(long)]
    pub threads: Option<usize>,

    /// Keep identical payloads
    #[arg(long)]
    pub no_dedup: bool,

    /// Skip classification; everything lands in unknown/
    #[arg(long)]
    pub no_type_detection: bool,

    /// Bound each frame by the next signature or --max-block-size
    #[arg(long)]
    pub windowed: bool,

    /// Window cap in bytes (windowed mode)
    #[arg(long)]
    pub max_block_size: Option<u64>,

    /// Blocks smaller than this are discarded (windowed mode)
    #[arg(long)]
    pub min_block_size: Option<u64>,

    /// Metadata backend
    #[arg(long, value_enum, default_value_t = MetadataBackend::Jsonl)]
    pub metadata_backend: MetadataBackend,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Also append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl CliOptions {
    /// Flags win over the loaded config.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if self.serial {
            cfg.fast_mode = false;
        }
        if let Some(threads) = self.threads {
            cfg.max_threads = threads;
        }
        if self.no_dedup {
            cfg.enable_dedup = false;
        }
        if self.no_type_detection {
            cfg.enable_type_detection = false;
        }
        if self.windowed {
            cfg.bound_policy = BoundPolicy::Windowed;
        }
        if let Some(max) = self.max_block_size {
            cfg.max_block_size = max;
        }
        if let Some(min) = self.min_block_size {
            cfg.min_block_size = min;
        }
    }
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
