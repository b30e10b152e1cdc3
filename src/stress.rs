// Drives readers and writers against any target that can be inspected and updated, so the same
// workload can be pointed at a checked handle, a lock or an ArcSwap. Each worker owns a clone of
// the target and all of them are released together once every worker is ready.
//
// Against a checked handle with writers and a non-zero body delay this is expected to abort the
// process; that is how the race scenarios of the demo binary are produced.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;

use crate::assert_condition;
use crate::assertion::AssertionError;
use crate::handle::Ref;

pub trait ReadWriteExt<I> {
    fn inspect(&self, f: &mut dyn FnMut(&I));
    fn update(&self, f: &dyn Fn(&I) -> I);
}

impl<I> ReadWriteExt<I> for Ref<'_, I> {
    fn inspect(&self, f: &mut dyn FnMut(&I)) {
        self.read_only_access(f)
    }

    fn update(&self, f: &dyn Fn(&I) -> I) {
        self.access(|current| *current = f(&*current))
    }
}

impl<I> ReadWriteExt<I> for RwLock<I> {
    fn inspect(&self, f: &mut dyn FnMut(&I)) {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&*guard)
    }

    fn update(&self, f: &dyn Fn(&I) -> I) {
        let mut guard = self.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = f(&*guard);
        *guard = next;
    }
}

#[cfg(feature = "benches")]
impl<I> ReadWriteExt<I> for arc_swap::ArcSwap<I> {
    fn inspect(&self, f: &mut dyn FnMut(&I)) {
        let current = self.load();
        f(&**current)
    }

    fn update(&self, f: &dyn Fn(&I) -> I) {
        self.rcu(|current| f(&**current));
    }
}

impl<I, X: ReadWriteExt<I>> ReadWriteExt<I> for Arc<X> {
    fn inspect(&self, f: &mut dyn FnMut(&I)) {
        (**self).inspect(f)
    }

    fn update(&self, f: &dyn Fn(&I) -> I) {
        (**self).update(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressConfig {
    pub readers: usize,
    pub writers: usize,
    pub iterations: usize,
    // Sleep inside every write body. Reads hold their body twice as long, so every read window
    // spans at least one writer bump.
    pub body_delay: Duration,
}

impl StressConfig {
    pub fn validate(&self) -> Result<(), AssertionError> {
        let workers = self.readers.checked_add(self.writers);
        assert_condition!(
            workers.is_some(),
            AssertionError::OutOfRange,
            "{} readers and {} writers overflow the worker count",
            self.readers,
            self.writers
        );
        assert_condition!(
            workers != Some(0),
            AssertionError::InvalidArgument,
            "at least one reader or writer is required"
        );
        assert_condition!(
            self.iterations > 0,
            AssertionError::OutOfRange,
            "iterations must be positive, got {}",
            self.iterations
        );
        assert_condition!(
            self.body_delay <= Duration::from_secs(1),
            AssertionError::OutOfRange,
            "body delay of {:?} exceeds one second",
            self.body_delay
        );
        Ok(())
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            readers: 4,
            writers: 0,
            iterations: 1000,
            body_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    pub reads: u64,
    pub writes: u64,
    pub elapsed: Duration,
}

enum Role {
    Reader,
    Writer,
}

pub fn run<I, T>(
    target: &T,
    config: &StressConfig,
    write_fn: fn(&I) -> I,
) -> Result<StressReport, AssertionError>
where
    T: ReadWriteExt<I> + Clone + Send,
{
    config.validate()?;
    tracing::debug!(
        readers = config.readers,
        writers = config.writers,
        iterations = config.iterations,
        delay = ?config.body_delay,
        "stress run starting"
    );

    let workers = config.readers + config.writers;
    let ready = AtomicUsize::new(0);
    let start = Instant::now();

    let (reads, writes) = thread::scope(|scope| {
        let handles = (0..workers)
            .map(|idx| {
                let role = if idx < config.readers {
                    Role::Reader
                } else {
                    Role::Writer
                };
                let target = target.clone();
                let ready = &ready;

                scope.spawn(move || {
                    ready.fetch_add(1, Ordering::SeqCst);
                    let backoff = Backoff::new();
                    while ready.load(Ordering::SeqCst) < workers {
                        backoff.snooze();
                    }

                    // Writers bump back to back and readers hold twice the delay, so every read
                    // window spans a writer bump.
                    let mut done = 0u64;
                    while done < config.iterations as u64 {
                        match role {
                            Role::Reader => {
                                target.inspect(&mut |_| pause(config.body_delay * 2));
                                thread::yield_now();
                            }
                            Role::Writer => target.update(&|current| {
                                pause(config.body_delay);
                                write_fn(current)
                            }),
                        }
                        done += 1;
                    }

                    (role, done)
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|err| std::panic::resume_unwind(err)))
            .fold((0, 0), |(reads, writes), (role, done)| match role {
                Role::Reader => (reads + done, writes),
                Role::Writer => (reads, writes + done),
            })
    });

    let report = StressReport {
        reads,
        writes,
        elapsed: start.elapsed(),
    };
    tracing::debug!(?report, "stress run finished");

    Ok(report)
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    use super::{StressConfig, run};
    use crate::assertion::AssertionError;
    use crate::handle::Shared;

    #[test]
    fn rejects_empty_workload() {
        let config = StressConfig {
            readers: 0,
            writers: 0,
            ..StressConfig::default()
        };

        assert!(matches!(config.validate(), Err(AssertionError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = StressConfig {
            iterations: 0,
            ..StressConfig::default()
        };

        assert!(matches!(config.validate(), Err(AssertionError::OutOfRange(_))));
    }

    #[test]
    fn rejects_overflowing_worker_count() {
        let config = StressConfig {
            readers: usize::MAX,
            writers: 1,
            ..StressConfig::default()
        };

        let err = config.validate().unwrap_err();

        assert!(matches!(err, AssertionError::OutOfRange(_)));
        assert!(err.message().ends_with("overflow the worker count"));
    }

    #[test]
    fn readers_only_on_checked_handle() {
        let shared = Shared::new(11u64);
        let config = StressConfig {
            readers: 8,
            iterations: 200,
            ..StressConfig::default()
        };

        let report = run(&shared.get_ref(), &config, |value: &u64| *value).unwrap();

        assert_eq!(report.reads, 1600);
        assert_eq!(report.writes, 0);
        assert_eq!(shared.live_refs(), 0);
        assert_eq!(shared.get_ref().read(), 11);
    }

    #[test]
    fn single_writer_on_checked_handle() {
        let shared = Shared::new(0u64);
        let config = StressConfig {
            readers: 0,
            writers: 1,
            iterations: 500,
            body_delay: Duration::ZERO,
        };

        let report = run(&shared.get_ref(), &config, |value: &u64| value + 1).unwrap();

        assert_eq!(report.writes, 500);
        assert_eq!(shared.get_ref().read(), 500);
    }

    #[test]
    fn contended_writers_on_lock() {
        let lock = Arc::new(RwLock::new(0u64));
        let config = StressConfig {
            readers: 2,
            writers: 4,
            iterations: 250,
            body_delay: Duration::ZERO,
        };

        let report = run(&lock, &config, |value: &u64| value + 1).unwrap();

        assert_eq!(report.reads, 500);
        assert_eq!(report.writes, 1000);
        assert_eq!(*lock.read().unwrap(), 1000);
    }
}
