use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// MD5 digest of either the payload or the raw compressed block.
pub type Fingerprint = [u8; 16];

pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    md5::compute(bytes).0
}

pub fn fingerprint_hex(fp: &Fingerprint) -> String {
    hex::encode(fp)
}

/// Per-run set of admitted fingerprints.
#[derive(Debug)]
pub struct DedupIndex {
    enabled: bool,
    seen: Mutex<HashSet<Fingerprint>>,
}

impl DedupIndex {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// True for the first submitter of `fp`; later calls get false.
    /// Always true when dedup is disabled.
    pub fn try_admit(&self, fp: Fingerprint) -> bool {
        if !self.enabled {
            return true;
        }
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert(fp)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
