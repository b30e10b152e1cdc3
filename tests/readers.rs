#![cfg(not(loom))]

use std::thread;
use std::time::Duration;

use lib::Shared;
use lib::stress::{self, StressConfig};
use proptest::proptest;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(16))]

    #[test]
    fn concurrent_read_only_access_never_aborts(num_readers in 2u8..12, num_reads in 10u64..200) {
        let shared = Shared::new(vec![1u64, 2, 3, 4]);

        let total = thread::scope(|scope| {
            let workers = (0..num_readers)
                .map(|idx| {
                    let handle = if idx % 2 == 0 {
                        shared.get_read_ref()
                    } else {
                        shared.get_ref().into()
                    };

                    scope.spawn(move || {
                        let mut sum = 0;
                        for _ in 0..num_reads {
                            sum += handle.read_only_access(|values| values.iter().sum::<u64>());
                            thread::yield_now();
                        }
                        sum
                    })
                })
                .collect::<Vec<_>>();

            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .sum::<u64>()
        });

        assert_eq!(total, 10 * num_reads * num_readers as u64);
        assert_eq!(shared.live_refs(), 0);
    }
}

#[test]
fn slow_readers_overlap_without_aborting() {
    let shared = Shared::new(String::from("stable"));
    let config = StressConfig {
        readers: 6,
        writers: 0,
        iterations: 20,
        body_delay: Duration::from_millis(2),
    };

    let report = stress::run(&shared.get_ref(), &config, String::clone).unwrap();

    assert_eq!(report.reads, 120);
    assert_eq!(shared.get_ref().read(), "stable");
}

#[test]
fn plain_reads_run_alongside_read_only_access() {
    let shared = Shared::new(42u32);

    thread::scope(|scope| {
        for idx in 0..4 {
            let handle = shared.get_ref();
            scope.spawn(move || {
                for _ in 0..500 {
                    if idx % 2 == 0 {
                        assert_eq!(handle.read(), 42);
                    } else {
                        assert_eq!(handle.read_only_access(|value| *value), 42);
                    }
                }
            });
        }
    });

    assert_eq!(shared.live_refs(), 0);
}
