//! Stress helpers.
//!
//! These run the store under concurrent counter updates and readers and
//! report throughput alongside the counts a caller needs to verify the
//! result.

use crate::fixtures::machine;
use rekreativ_core::schema::{COUNTER_HISTORY, MACHINES};
use rekreativ_core::{CoreResult, CounterUpdate, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Counter updates per writer thread.
    pub updates_per_thread: usize,
    /// Number of writer threads.
    pub threads: usize,
    /// Number of machines the writers spread over.
    pub machines: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            updates_per_thread: 250,
            threads: 4,
            machines: 4,
        }
    }
}

impl StressConfig {
    /// A small configuration for unit tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            updates_per_thread: 20,
            threads: 3,
            machines: 2,
        }
    }
}

/// Id of the `n`th stress machine.
pub fn stress_machine_id(n: usize) -> String {
    format!("S{n:03}")
}

/// Adds the machines a stress run writes to.
pub fn prepare_stress_machines(store: &Store, config: &StressConfig) -> CoreResult<()> {
    for n in 0..config.machines {
        let id = stress_machine_id(n);
        store.add_entity(&machine(&id, &format!("STRESS-{n}")))?;
    }
    Ok(())
}

/// Runs concurrent counter updates. Thread `t` reports `t * 1_000_000 + i`
/// on machine `i % machines`, so every thread both raises and lowers the
/// readings other threads left behind.
pub fn stress_counter_updates(store: &Arc<Store>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();
            thread::spawn(move || {
                for i in 0..config.updates_per_thread {
                    let update = CounterUpdate::new(
                        stress_machine_id(i % config.machines),
                        (t * 1_000_000 + i) as u64,
                        "stress",
                    );
                    match store.record_counter_update(update) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs readers against the machine and history collections while
/// a writer thread records updates. Returns the reader result.
pub fn stress_readers_during_updates(
    store: &Arc<Store>,
    config: &StressConfig,
    readers: usize,
) -> StressTestResult {
    let writer_store = Arc::clone(store);
    let writer_config = config.clone();
    let writer = thread::spawn(move || stress_counter_updates(&writer_store, &writer_config));

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let store = Arc::clone(store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let rounds = config.updates_per_thread;
            thread::spawn(move || {
                for _ in 0..rounds {
                    let read = store.count(MACHINES).and_then(|_| store.count(COUNTER_HISTORY));
                    match read {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }
    let _ = writer.join();

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekreativ_core::model::Machine;
    use rekreativ_core::Key;

    #[test]
    fn concurrent_updates_keep_counters_consistent() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = StressConfig::quick();
        prepare_stress_machines(&store, &config).unwrap();

        let result = stress_counter_updates(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, config.threads * config.updates_per_thread);
        assert_eq!(store.count(COUNTER_HISTORY).unwrap(), result.successful_ops);

        let top_thread = (config.threads - 1) * 1_000_000;
        for n in 0..config.machines {
            let m: Machine = store
                .get_entity(&Key::from(stress_machine_id(n)))
                .unwrap()
                .unwrap();
            let last_i = (0..config.updates_per_thread)
                .filter(|i| i % config.machines == n)
                .max()
                .unwrap();
            assert_eq!(m.current_counter, (top_thread + last_i) as u64);
        }
    }

    #[test]
    fn readers_are_not_starved() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = StressConfig::quick();
        prepare_stress_machines(&store, &config).unwrap();

        let result = stress_readers_during_updates(&store, &config, 2);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 2 * config.updates_per_thread);
    }
}
