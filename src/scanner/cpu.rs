use memchr::memmem::Finder;

use crate::scanner::{FrameLocation, SignatureScanner};

pub struct CpuScanner {
    finder: Finder<'static>,
}

impl CpuScanner {
    pub fn new(signature: &[u8]) -> Self {
        Self {
            finder: Finder::new(signature).into_owned(),
        }
    }
}

impl SignatureScanner for CpuScanner {
    fn scan(&self, data: &[u8]) -> Vec<FrameLocation> {
        // memmem yields non-overlapping matches, left to right.
        self.finder
            .find_iter(data)
            .enumerate()
            .map(|(index, offset)| FrameLocation {
                index,
                start_offset: offset as u64,
                end_offset: None,
            })
            .collect()
    }
}
