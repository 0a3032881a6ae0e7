//! `RequestRunner`: a bounded-concurrency batch executor with per-item
//! retries (spec.md §4.5). Independent from the global [`crate::pool::RequestPool`]
//! limiter — a batch's `concurrency` bounds how many *workers* run at once,
//! while the pool still bounds how many requests are in flight inside the
//! transport. Both apply; the runner never bypasses the pool, since every
//! item still flows through the full composed middleware chain.
//!
//! Workers are dispatched onto a bounded thread pool fed by a
//! `crossbeam_channel`, the way `maker_web` hands connections off to worker
//! threads through its `crossbeam` queues — adapted here to a channel since
//! the runner drains a finite batch rather than an unbounded connection
//! stream.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;

use crate::error::WayfarerError;

/// Per-item retry policy for a batch (spec.md §4.5: "fixed-delay or
/// caller-chosen policy").
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub concurrency: usize,
    pub retries: RetryPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            concurrency: 4,
            retries: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub duration: Duration,
}

pub struct BatchResult<T> {
    /// `results[i]` corresponds to `items[i]`; ordering is preserved
    /// regardless of completion order (spec.md §4.5).
    pub results: Vec<Result<T, WayfarerError>>,
    pub stats: BatchStats,
}

pub struct RequestRunner {
    config: RunnerConfig,
}

impl RequestRunner {
    pub fn new(config: RunnerConfig) -> Self {
        RequestRunner { config }
    }

    /// Runs `worker` over every item in `items`, bounded to
    /// `config.concurrency` simultaneous workers, retrying a failing item up
    /// to `config.retries.max_attempts` times with a fixed delay between
    /// attempts. A retried item is re-cloned for each attempt since `worker`
    /// consumes its input by value.
    ///
    /// Never panics the batch on a per-item failure — the error is packed
    /// into `results[i]` instead (spec.md §7: "Batch mode never throws the
    /// batch itself").
    pub fn run<I, T, F>(&self, items: Vec<I>, worker: F) -> BatchResult<T>
    where
        I: Clone + Send,
        T: Send,
        F: Fn(I) -> Result<T, WayfarerError> + Send + Sync,
    {
        let total = items.len();
        let started = Instant::now();
        let results: Mutex<Vec<Option<Result<T, WayfarerError>>>> =
            Mutex::new((0..total).map(|_| None).collect());
        let width = self.config.concurrency.max(1).min(total.max(1));
        let (tx, rx) = bounded::<(usize, I)>(total);
        for (i, item) in items.into_iter().enumerate() {
            tx.send((i, item)).expect("channel sized to the batch");
        }
        drop(tx);

        std::thread::scope(|scope| {
            for _ in 0..width {
                let rx = rx.clone();
                let results = &results;
                let worker = &worker;
                let retries = self.config.retries;
                scope.spawn(move || {
                    for (index, item) in rx.iter() {
                        let outcome = run_with_retries(worker, item, retries);
                        results.lock().unwrap()[index] = Some(outcome);
                    }
                });
            }
        });

        let results: Vec<Result<T, WayfarerError>> = results
            .into_inner()
            .unwrap()
            .into_iter()
            .map(|r| r.expect("every index is written exactly once"))
            .collect();
        let successful = results.iter().filter(|r| r.is_ok()).count();

        BatchResult {
            stats: BatchStats {
                total,
                successful,
                failed: total - successful,
                duration: started.elapsed(),
            },
            results,
        }
    }
}

fn run_with_retries<I, T>(
    worker: &(impl Fn(I) -> Result<T, WayfarerError> + Send + Sync),
    item: I,
    retries: RetryPolicy,
) -> Result<T, WayfarerError>
where
    I: Clone,
{
    let attempts = retries.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match worker(item.clone()) {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt + 1 < attempts && !retries.delay.is_zero() {
                    std::thread::sleep(retries.delay);
                }
            }
        }
    }
    Err(last_err.expect("attempts is always >= 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn preserves_result_ordering_regardless_of_completion_order() {
        let runner = RequestRunner::new(RunnerConfig {
            concurrency: 4,
            ..Default::default()
        });
        let items: Vec<u32> = (0..20).collect();
        let result = runner.run(items, |n| {
            // Reverse the natural completion order: larger items sleep less.
            std::thread::sleep(Duration::from_micros((20 - n) as u64 * 50));
            Ok::<u32, WayfarerError>(n * 2)
        });
        let expected: Vec<u32> = (0..20).map(|n| n * 2).collect();
        let actual: Vec<u32> = result.results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn never_exceeds_configured_worker_width() {
        let runner = RequestRunner::new(RunnerConfig {
            concurrency: 2,
            ..Default::default()
        });
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<()> = (0..10).map(|_| ()).collect();
        let c = Arc::clone(&current);
        let m = Arc::clone(&max_seen);
        runner.run(items, move |_| {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            c.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), WayfarerError>(())
        });
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn retries_a_failing_item_up_to_max_attempts_then_gives_up() {
        let runner = RequestRunner::new(RunnerConfig {
            concurrency: 1,
            retries: RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let result = runner.run(vec![()], move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Err::<(), WayfarerError>(WayfarerError::Cancellation)
        });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.stats.failed, 1);
        assert!(result.results[0].is_err());
    }

    #[test]
    fn batch_never_panics_on_per_item_failures_stats_reflect_mix() {
        let runner = RequestRunner::new(RunnerConfig::default());
        let items: Vec<u32> = (0..6).collect();
        let result = runner.run(items, |n| {
            if n % 2 == 0 {
                Ok::<u32, WayfarerError>(n)
            } else {
                Err(WayfarerError::Cancellation)
            }
        });
        assert_eq!(result.stats.total, 6);
        assert_eq!(result.stats.successful, 3);
        assert_eq!(result.stats.failed, 3);
    }
}
