use crate::sync::{AtomicU64, Ordering};

// u64::MAX is never handed out: reaching it resets the counter to zero and bumps again.
#[derive(Debug)]
pub(crate) struct Version {
    counter: AtomicU64,
}

impl Version {
    pub(crate) fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }

    pub(crate) fn bump(&self) -> u64 {
        loop {
            let version = self.counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
            if version != u64::MAX {
                return version;
            }

            self.counter.store(0, Ordering::SeqCst);
        }
    }

    pub(crate) fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
