use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown signal shared between a [`Runner`] and its thread.
///
/// Sequentially consistent for both the load and the store: the flag is
/// read once per loop iteration, the cost does not show.
///
/// [`Runner`]: crate::Runner
#[derive(Debug)]
pub(crate) struct Stop(AtomicBool);

const ORDERING: Ordering = Ordering::SeqCst;

impl Stop {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    #[inline]
    pub(crate) fn get(&self) -> bool {
        self.0.load(ORDERING)
    }

    /// raise the signal, it cannot be lowered again
    #[inline]
    pub(crate) fn toggle(&self) {
        self.0.store(true, ORDERING)
    }
}

impl Default for Stop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[allow(clippy::bool_assert_comparison)]
    #[test]
    fn starts_lowered() {
        assert_eq!(Stop::new().get(), false);
        assert_eq!(Stop::default().get(), false);
    }

    #[test]
    fn toggle_is_seen_across_threads() {
        let stop = Arc::new(Stop::new());
        let remote = Arc::clone(&stop);

        std::thread::spawn(move || remote.toggle()).join().unwrap();

        assert!(stop.get());
        // toggling is idempotent
        stop.toggle();
        assert!(stop.get());
    }
}
