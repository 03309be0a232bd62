use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::atomic::AtomicUsize;

/// Cooperative stop flag shared by the orchestrator and every task.
///
/// Cloning shares the flag. Once set it stays set until the run it applies
/// to has ended; the pipeline then re-arms it with [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    #[cfg(test)]
    trip_at: Option<(usize, Arc<AtomicUsize>)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that sets itself on its `poll`-th `is_cancelled` call.
    #[cfg(test)]
    pub(crate) fn tripping_at(poll: usize) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trip_at: Some((poll, Arc::new(AtomicUsize::new(0)))),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        #[cfg(test)]
        if let Some((poll, seen)) = &self.trip_at {
            if seen.fetch_add(1, Ordering::SeqCst) + 1 >= *poll {
                self.cancel();
            }
        }
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag between runs. Clones held elsewhere (a Ctrl+C
    /// handler, a run handle) see the cleared flag too.
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
