use std::sync::{Barrier, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use thiserror::Error;

use crate::digits;
use crate::table::CompositeTable;

pub const DEFAULT_LIMIT: u32 = 1_000_000;
pub const DEFAULT_WORKERS: usize = 4;

/// Largest accepted limit. Candidates stay at or below `MAX_ROTATABLE`, so
/// every rotation of every candidate, and all of the arithmetic behind them,
/// stays inside `u32`.
pub const MAX_LIMIT: u32 = digits::MAX_ROTATABLE + 1;

/// Rejected configuration, detected before any thread is spawned.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("limit must be at least 2, got {0}")]
    LimitTooSmall(u32),
    #[error("limit must be at most {max}, got {0}", max = MAX_LIMIT)]
    LimitTooLarge(u32),
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Why a worker bailed out early. The run itself keeps going: the
/// coordinator logs the abort and reports whatever the remaining workers
/// collected.
#[derive(Debug, Error)]
pub enum WorkerAbort {
    #[error("seed queue closed before the terminal sentinel arrived")]
    SeedQueueClosed,
    #[error("result list lock poisoned by a panicked worker")]
    ResultLockPoisoned,
    #[error("worker thread panicked")]
    Panicked,
}

/// Per-worker accounting, owned by the worker while it runs and handed back
/// through its join handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStats {
    pub marking: Duration,
    pub scanning: Duration,
    pub seeds_taken: usize,
}

pub type WorkerOutcome = Result<WorkerStats, WorkerAbort>;

/// One unit of Phase 1 work: a seed whose multiples need marking, or the
/// terminal sentinel. The coordinator sends one sentinel per worker.
enum SeedMessage {
    Seed(u32),
    Done,
}

/// Gate for the dispatcher's first few seeds. The dispatcher parks after
/// enqueuing an early seed until whichever worker picked it up has started
/// marking. A permit counter rather than a bare condvar, so a wake-up that
/// fires before the dispatcher begins waiting is not lost, and the one
/// surplus signal the workers produce sits unused instead of misfiring.
struct Pacer {
    permits: Mutex<usize>,
    ready: Condvar,
}

impl Pacer {
    fn new() -> Self {
        Pacer {
            permits: Mutex::new(0),
            ready: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut permits = self.permits.lock().unwrap();
        while *permits == 0 {
            permits = self.ready.wait(permits).unwrap();
        }
        *permits -= 1;
    }

    fn signal(&self) {
        let mut permits = self.permits.lock().unwrap();
        *permits += 1;
        self.ready.notify_one();
    }
}

/// State shared by the coordinator and every worker for one run.
struct Shared<'a> {
    limit: u32,
    workers: usize,
    table: &'a CompositeTable,
    barrier: &'a Barrier,
    pacer: &'a Pacer,
    found: &'a Mutex<Vec<u32>>,
}

/// Two-phase parallel search for every circular prime below a limit.
///
/// Phase 1 sieves: the coordinator enumerates odd seeds up to the square
/// root of the table ceiling and feeds them through a bounded queue to a
/// pool of identical workers, which strike each seed's multiples from the
/// shared table. A full-pool barrier separates the phases. Phase 2 scans:
/// each worker walks its own residue class of odd candidates, skips marked
/// or digit-filtered ones, and checks the rotation cycle of the survivors
/// against the same table.
#[derive(Debug)]
pub struct CircularPrimeSearch {
    limit: u32,
    workers: usize,
}

/// Everything a finished run produced. `circular_primes` is deduplicated
/// and sorted ascending.
pub struct SearchReport {
    pub circular_primes: Vec<u32>,
    pub worker_outcomes: Vec<WorkerOutcome>,
    pub total_seeds: usize,
}

impl CircularPrimeSearch {
    pub fn new(limit: u32, workers: usize) -> Result<Self, ConfigError> {
        if limit < 2 {
            return Err(ConfigError::LimitTooSmall(limit));
        }
        if limit > MAX_LIMIT {
            return Err(ConfigError::LimitTooLarge(limit));
        }
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(CircularPrimeSearch { limit, workers })
    }

    /// Run the full search to completion and hand back the report.
    pub fn run(&self) -> SearchReport {
        let table = CompositeTable::new(rotation_ceiling(self.limit));
        let found = Mutex::new(Vec::new());
        let barrier = Barrier::new(self.workers);
        let pacer = Pacer::new();
        let (seed_tx, seed_rx) = bounded(self.workers);

        let shared = Shared {
            limit: self.limit,
            workers: self.workers,
            table: &table,
            barrier: &barrier,
            pacer: &pacer,
            found: &found,
        };

        let mut worker_outcomes = Vec::with_capacity(self.workers);

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers);
            for tid in 0..self.workers {
                let seeds = seed_rx.clone();
                let shared = &shared;
                handles.push(scope.spawn(move || run_worker(tid, seeds, shared)));
            }
            drop(seed_rx);

            dispatch_seeds(&seed_tx, &shared);

            // One terminal sentinel per worker.
            for _ in 0..self.workers {
                if seed_tx.send(SeedMessage::Done).is_err() {
                    break;
                }
            }

            // 2 is prime by definition and never enters the odd-only scan.
            if self.limit > 2 {
                insert_two(&found);
            }

            for (tid, handle) in handles.into_iter().enumerate() {
                let outcome = match handle.join() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(WorkerAbort::Panicked),
                };
                if let Err(ref abort) = outcome {
                    eprintln!("Warning: worker {} aborted: {}", tid, abort);
                }
                worker_outcomes.push(outcome);
            }
        });

        let mut circular_primes = found
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        circular_primes.sort_unstable();
        circular_primes.dedup();

        let total_seeds = worker_outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok())
            .map(|stats| stats.seeds_taken)
            .sum();

        SearchReport {
            circular_primes,
            worker_outcomes,
            total_seeds,
        }
    }
}

impl SearchReport {
    pub fn print(&self) {
        for (tid, outcome) in self.worker_outcomes.iter().enumerate() {
            match outcome {
                Ok(stats) => println!(
                    "Worker {}: marking {}us ({:.2}ms) | scanning {}us ({:.2}ms) | {} seeds",
                    tid,
                    stats.marking.as_micros(),
                    stats.marking.as_micros() as f64 / 1000.0,
                    stats.scanning.as_micros(),
                    stats.scanning.as_micros() as f64 / 1000.0,
                    stats.seeds_taken,
                ),
                Err(abort) => println!("Worker {}: aborted ({})", tid, abort),
            }
        }

        println!("\nTotal seeds processed: {}", self.total_seeds);
        println!("Circular primes found: {}", self.circular_primes.len());
        for prime in &self.circular_primes {
            println!("{}", prime);
        }
    }
}

/// Smallest all-nines value with at least as many digits as `limit - 1`.
///
/// Rotating a zero-free number never changes its digit count, so every
/// rotation of a scanned candidate fits under this ceiling. The table is
/// sized and sieved to it, which keeps rotation lookups in bounds even when
/// the limit is not a power of ten.
fn rotation_ceiling(limit: u32) -> u32 {
    let mut ceiling = 9;
    while ceiling < limit - 1 {
        ceiling = ceiling * 10 + 9;
    }
    ceiling
}

fn dispatch_seeds(seed_tx: &Sender<SeedMessage>, shared: &Shared) {
    let table_limit = shared.table.limit();
    let root = (table_limit as f64).sqrt().ceil() as u32;

    for i in (3..=root).step_by(2) {
        if shared.table.is_composite(i) {
            continue;
        }

        if seed_tx.send(SeedMessage::Seed(i)).is_err() {
            eprintln!("Warning: every worker is gone, dropping remaining seeds from {}", i);
            return;
        }

        // Throttle the first few seeds: park until the worker that took this
        // one reaches its second multiple. Skipped when that multiple lies
        // beyond the table, since the wake-up would never come.
        let second_multiple = i as u64 * (i as u64 + 1);
        if (i as u64 - 3) < shared.workers as u64 && second_multiple <= table_limit as u64 {
            shared.pacer.wait();
        }
    }
}

/// Insert 2 into the result list. Recovers the guard from a poisoned lock so
/// a degraded run still reports 2.
fn insert_two(found: &Mutex<Vec<u32>>) {
    found
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(2);
}

fn run_worker(tid: usize, seeds: Receiver<SeedMessage>, shared: &Shared) -> WorkerOutcome {
    let mut stats = WorkerStats::default();

    let marking = mark_seed_multiples(&seeds, shared, &mut stats);

    // Rendezvous even when Phase 1 aborted: the rest of the pool must not be
    // left stranded, and no scan may start before every marker is done.
    shared.barrier.wait();

    marking?;
    scan_residue_class(tid, shared, &mut stats)?;

    Ok(stats)
}

fn mark_seed_multiples(
    seeds: &Receiver<SeedMessage>,
    shared: &Shared,
    stats: &mut WorkerStats,
) -> Result<(), WorkerAbort> {
    let table_limit = shared.table.limit();

    loop {
        let seed = match seeds.recv() {
            Ok(SeedMessage::Seed(seed)) => seed,
            Ok(SeedMessage::Done) => return Ok(()),
            Err(_) => return Err(WorkerAbort::SeedQueueClosed),
        };

        let started = Instant::now();
        stats.seeds_taken += 1;

        for j in seed..=table_limit / seed {
            shared.table.mark_composite(seed * j);
            if (seed as u64 - 3) <= shared.workers as u64 && j == seed + 1 {
                shared.pacer.signal();
            }
        }

        stats.marking += started.elapsed();
    }
}

fn scan_residue_class(
    tid: usize,
    shared: &Shared,
    stats: &mut WorkerStats,
) -> Result<(), WorkerAbort> {
    let started = Instant::now();

    for i in scan_values(tid, shared.workers, shared.limit) {
        if shared.table.is_composite(i) || !digits::digit_filter(i) {
            continue;
        }

        let mut rotated = digits::rotate(i);
        let mut circular = true;
        while rotated != i {
            if shared.table.is_composite(rotated) {
                circular = false;
                break;
            }
            rotated = digits::rotate(rotated);
        }

        if circular {
            let mut list = shared
                .found
                .lock()
                .map_err(|_| WorkerAbort::ResultLockPoisoned)?;
            list.push(i);
        }
    }

    stats.scanning = started.elapsed();
    Ok(())
}

/// The odd numbers below `limit` owned by worker `tid`: `3 + 2 * tid`, then
/// every `2 * workers` after that. Across all ids the classes cover each
/// odd number in `[3, limit)` exactly once.
fn scan_values(tid: usize, workers: usize, limit: u32) -> impl Iterator<Item = u32> {
    (3 + 2 * tid as u64..limit as u64)
        .step_by(2 * workers)
        .map(|i| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELOW_100: [u32; 13] = [2, 3, 5, 7, 11, 13, 17, 31, 37, 71, 73, 79, 97];

    fn run_search(limit: u32, workers: usize) -> SearchReport {
        CircularPrimeSearch::new(limit, workers).unwrap().run()
    }

    #[test]
    fn test_results_below_100() {
        let report = run_search(100, 4);
        assert_eq!(report.circular_primes, BELOW_100);
    }

    #[test]
    fn test_results_below_1000() {
        let mut expected = BELOW_100.to_vec();
        expected.extend([113, 131, 197, 199, 311, 337, 373, 719, 733, 919, 971, 991]);
        expected.sort_unstable();

        let report = run_search(1000, 4);
        assert_eq!(report.circular_primes.len(), 25);
        assert_eq!(report.circular_primes, expected);
    }

    #[test]
    fn test_results_below_one_million() {
        let mut expected = vec![
            2, 3, 5, 7, 11, 13, 31, 17, 71, 37, 73, 79, 97, 113, 131, 311, 197, 971, 719, 199,
            919, 991, 337, 373, 733, 1193, 1931, 3119, 9311, 3779, 7793, 7937, 9377, 11939, 19391,
            39119, 91193, 93911, 19937, 37199, 71993, 93719, 99371, 193939, 939391, 393919,
            939193, 391939, 919393, 199933, 999331, 993319, 933199, 331999, 319993,
        ];
        expected.sort_unstable();

        let report = run_search(1_000_000, 4);
        assert_eq!(report.circular_primes.len(), 55);
        assert_eq!(report.circular_primes, expected);
    }

    #[test]
    fn test_two_is_present_only_above_two() {
        assert_eq!(run_search(2, 1).circular_primes, Vec::<u32>::new());
        assert_eq!(run_search(3, 2).circular_primes, vec![2]);
        assert_eq!(run_search(10, 3).circular_primes, vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_two_survives_a_poisoned_result_lock() {
        let found = Mutex::new(vec![3u32]);

        thread::scope(|scope| {
            let poisoner = scope.spawn(|| {
                let _guard = found.lock().unwrap();
                panic!("leave the result lock poisoned");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(found.is_poisoned());

        insert_two(&found);

        let list = found
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(list, vec![3, 2]);
    }

    #[test]
    fn test_limit_need_not_be_a_power_of_ten() {
        // 139 is prime but its rotation 391 = 17 * 23 is not, and 391 lies
        // past the limit. The table must still know it.
        let report = run_search(150, 4);
        assert!(!report.circular_primes.contains(&139));
        assert_eq!(
            report.circular_primes,
            vec![2, 3, 5, 7, 11, 13, 17, 31, 37, 71, 73, 79, 97, 113, 131]
        );
    }

    #[test]
    fn test_repeated_runs_agree() {
        let first = run_search(1000, 4);
        let second = run_search(1000, 4);
        assert_eq!(first.circular_primes, second.circular_primes);
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let baseline = run_search(10_000, 4);
        for workers in [1, 2, 3, 7] {
            let report = run_search(10_000, workers);
            assert_eq!(
                report.circular_primes, baseline.circular_primes,
                "workers = {}",
                workers
            );
        }
    }

    #[test]
    fn test_every_result_is_circular_below_fifty_thousand() {
        let report = run_search(50_000, 4);
        assert!(!report.circular_primes.is_empty());

        for &value in &report.circular_primes {
            assert!(digits::is_prime(value), "{} is not prime", value);
            assert!(digits::digit_filter(value), "{} fails the digit filter", value);
            for rotated in digits::rotation_cycle(value) {
                assert!(
                    digits::is_prime(rotated),
                    "rotation {} of {} is not prime",
                    rotated,
                    value
                );
            }
        }

        for known in BELOW_100 {
            assert!(report.circular_primes.contains(&known));
        }
    }

    #[test]
    fn test_seed_count_below_100() {
        // With limit 100 the only composite odd number under the root is 9,
        // and the pacing handshake orders seed 3's marking of 9 before the
        // dispatcher reads cell 9. The seed set is exactly {3, 5, 7} on
        // every run.
        let report = run_search(100, 4);
        assert_eq!(report.total_seeds, 3);
        assert!(report.worker_outcomes.iter().all(|outcome| outcome.is_ok()));
    }

    #[test]
    fn test_seed_accounting_below_ten_thousand() {
        let report = run_search(10_000, 4);

        // Odd primes up to the root (here 100) are always seeded. An odd
        // composite is seeded only when the dispatcher reads its cell before
        // a marker reaches it, so the total floats between the 24 odd primes
        // and the 49 odd numbers in range.
        assert!(report.total_seeds >= 24, "took {}", report.total_seeds);
        assert!(report.total_seeds <= 49, "took {}", report.total_seeds);

        let from_workers: usize = report
            .worker_outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok())
            .map(|stats| stats.seeds_taken)
            .sum();
        assert_eq!(from_workers, report.total_seeds);
    }

    #[test]
    fn test_scan_values_partition_the_odd_range() {
        for workers in [1, 2, 3, 4, 5, 8] {
            let mut all: Vec<u32> = (0..workers)
                .flat_map(|tid| scan_values(tid, workers, 101))
                .collect();
            all.sort_unstable();

            let expected: Vec<u32> = (3u32..101).step_by(2).collect();
            assert_eq!(all, expected, "workers = {}", workers);
        }

        // A worker whose first candidate is already past the limit owns
        // nothing.
        assert_eq!(scan_values(7, 8, 10).count(), 0);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert_eq!(
            CircularPrimeSearch::new(0, 4).unwrap_err(),
            ConfigError::LimitTooSmall(0)
        );
        assert_eq!(
            CircularPrimeSearch::new(1, 4).unwrap_err(),
            ConfigError::LimitTooSmall(1)
        );
        assert_eq!(
            CircularPrimeSearch::new(100, 0).unwrap_err(),
            ConfigError::NoWorkers
        );
        assert_eq!(
            CircularPrimeSearch::new(MAX_LIMIT + 1, 4).unwrap_err(),
            ConfigError::LimitTooLarge(MAX_LIMIT + 1)
        );
        assert!(CircularPrimeSearch::new(2, 1).is_ok());
        assert!(CircularPrimeSearch::new(MAX_LIMIT, 4).is_ok());
    }
}
