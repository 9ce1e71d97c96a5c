use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A hierarchical cancellation token.
///
/// A token observes its own flag plus every ancestor flag, so cancelling a
/// parent cancels the whole subtree while a child can be cancelled without
/// touching its siblings. The monitor holds the root; workers and the tuner
/// receive children.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flags: SmallVec<[Arc<AtomicBool>; 2]>,
}

impl CancelToken {
    pub fn new() -> Self {
        let mut flags = SmallVec::new();
        flags.push(Arc::new(AtomicBool::new(false)));
        CancelToken { flags }
    }

    /// Derive a child token. The child is cancelled when either it or any
    /// of its ancestors is cancelled.
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        CancelToken { flags }
    }

    /// Cancel this token (and thereby every token derived from it).
    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::Relaxed))
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
