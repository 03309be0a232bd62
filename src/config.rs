use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::extract::BoundPolicy;

pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 20 * 1024 * 1024;
pub const DEFAULT_MIN_BLOCK_SIZE: u64 = 1024;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub run_id: String,
    /// Parallel worker pool when true, single-threaded dispatch otherwise.
    #[serde(default = "default_true")]
    pub fast_mode: bool,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    #[serde(default = "default_true")]
    pub enable_dedup: bool,
    /// When false every payload is written to the unknown bucket.
    #[serde(default = "default_true")]
    pub enable_type_detection: bool,
    #[serde(default)]
    pub bound_policy: BoundPolicy,
    #[serde(default = "default_max_block_size")]
    pub max_block_size: u64,
    #[serde(default = "default_min_block_size")]
    pub min_block_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_id: String::new(),
            fast_mode: true,
            max_threads: default_max_threads(),
            enable_dedup: true,
            enable_type_detection: true,
            bound_policy: BoundPolicy::default(),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            bail!("max_threads must be at least 1");
        }
        if self.max_block_size == 0 {
            bail!("max_block_size must be greater than zero");
        }
        if self.min_block_size > self.max_block_size {
            bail!(
                "min_block_size {} exceeds max_block_size {}",
                self.min_block_size,
                self.max_block_size
            );
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_threads() -> usize {
    num_cpus::get().saturating_mul(2).max(1)
}

fn default_max_block_size() -> u64 {
    DEFAULT_MAX_BLOCK_SIZE
}

fn default_min_block_size() -> u64 {
    DEFAULT_MIN_BLOCK_SIZE
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p)?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };

    let mut config: Config = serde_yaml::from_slice(&bytes)?;
    if config.run_id.trim().is_empty() {
        config.run_id = generate_run_id();
    }
    config.validate()?;

    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn generate_run_id() -> String {
    let now = chrono::Utc::now();
    format!("{}_{:08x}", now.format("%Y%m%dT%H%M%SZ"), now.timestamp_subsec_nanos())
}
