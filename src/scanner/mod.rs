pub mod cpu;

use serde::Serialize;

/// Zstandard frame magic, little-endian `0xFD2FB528`.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameLocation {
    pub index: usize,
    pub start_offset: u64,
    pub end_offset: Option<u64>,
}

pub trait SignatureScanner: Send + Sync {
    /// Every non-overlapping signature hit, ascending by offset.
    fn scan(&self, data: &[u8]) -> Vec<FrameLocation>;
}

pub fn build_frame_scanner() -> Box<dyn SignatureScanner> {
    Box::new(cpu::CpuScanner::new(&ZSTD_MAGIC))
}

/// Bounds each location by the next signature, the container end or
/// `start + max_block_size`, whichever comes first.
pub fn apply_windows(locations: &mut [FrameLocation], container_len: u64, max_block_size: u64) {
    let starts: Vec<u64> = locations.iter().map(|loc| loc.start_offset).collect();
    for (i, loc) in locations.iter_mut().enumerate() {
        let next = starts.get(i + 1).copied().unwrap_or(container_len);
        let capped = loc.start_offset.saturating_add(max_block_size);
        loc.end_offset = Some(next.min(capped));
    }
}
