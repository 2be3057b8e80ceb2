//! Insertion workloads used to measure lock contention.
//!
//! The driver only times the workloads; printing is left to the caller.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use synclist_thread_pool::ThreadPool;

use crate::{
    ConcurrentList, Key,
    error::{Error, Result},
    node_arena::ArenaStats,
    options::BenchOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    SingleThread,
    MultiThread { threads: usize },
}

#[derive(Debug, Clone)]
pub struct BenchReport {
    pub workload: Workload,
    pub inserted: usize,
    pub elapsed: Duration,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs_f64();
        match self.workload {
            Workload::SingleThread => write!(
                f,
                "Single thread: inserted {} nodes in {:.3} seconds",
                self.inserted, secs
            ),
            Workload::MultiThread { threads } => write!(
                f,
                "{} threads: inserted {} total in {:.3} seconds",
                threads, self.inserted, secs
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchSummary {
    pub single: BenchReport,
    pub multi: BenchReport,
    pub final_count: usize,
    pub arena: ArenaStats,
}

/// Inserts keys `0..ops` with value `key * 10` from the calling thread.
pub fn run_single_threaded(list: &ConcurrentList, ops: usize) -> Result<BenchReport> {
    let top = Key::try_from(ops)
        .ok()
        .filter(|n| n.checked_mul(10).is_some())
        .ok_or_else(|| Error::InvalidOptions(format!("{} keys overflow the key range", ops)))?;

    let start = Instant::now();
    for key in 0..top {
        list.insert(key, key * 10)?;
    }

    Ok(BenchReport {
        workload: Workload::SingleThread,
        inserted: ops,
        elapsed: start.elapsed(),
    })
}

/// Worker `i` inserts the disjoint key range
/// `i * ops_per_thread .. (i + 1) * ops_per_thread` with value `key * 2`.
/// Elapsed time is taken after every worker has finished.
pub fn run_multi_threaded(
    list: &Arc<ConcurrentList>,
    options: &BenchOptions,
) -> Result<BenchReport> {
    options.validate()?;

    let pool = ThreadPool::new(options.threads);
    let failures = Arc::new(Mutex::new(Vec::new()));
    let ops = options.ops_per_thread as Key;

    let start = Instant::now();
    for worker in 0..options.threads {
        let list = list.clone();
        let failures = failures.clone();
        pool.execute(move || {
            let first = worker as Key * ops;
            for key in first..first + ops {
                if let Err(err) = list.insert(key, key * 2) {
                    failures.lock().push(format!("worker {}: {}", worker, err));
                    return;
                }
            }
        });
    }
    join_workers(pool)?;
    let elapsed = start.elapsed();

    if let Some(failure) = failures.lock().first() {
        return Err(Error::Worker(failure.clone()));
    }

    Ok(BenchReport {
        workload: Workload::MultiThread {
            threads: options.threads,
        },
        inserted: options.multi_thread_ops(),
        elapsed,
    })
}

fn join_workers(pool: ThreadPool) -> Result<()> {
    pool.join().map_err(|err| Error::Worker(err.to_string()))
}

/// Runs the single-threaded then the multi-threaded workload against one
/// list and tears the list down once all workers are joined.
pub fn run(options: &BenchOptions) -> Result<BenchSummary> {
    options.validate()?;

    let list = Arc::new(ConcurrentList::new());

    let single = run_single_threaded(&list, options.single_thread_ops)?;
    tracing::info!("{}", single);

    let multi = run_multi_threaded(&list, options)?;
    tracing::info!("{}", multi);

    let list = Arc::into_inner(list)
        .ok_or_else(|| Error::Worker("list still shared after join".to_string()))?;
    let final_count = list.len();
    let arena = list.destroy();

    Ok(BenchSummary {
        single,
        multi,
        final_count,
        arena,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_tracing;

    #[test]
    fn test_single_threaded_values() {
        let list = ConcurrentList::new();
        let report = run_single_threaded(&list, 100).unwrap();

        assert_eq!(report.inserted, 100);
        assert_eq!(list.len(), 100);
        assert_eq!(list.get(7), Some(70));
        assert_eq!(list.entries().first(), Some(&(99, 990)));
    }

    #[test]
    fn test_multi_threaded_disjoint_ranges() {
        init_tracing();

        let list = Arc::new(ConcurrentList::new());
        let mut opts = BenchOptions::new();
        opts.threads(3).ops_per_thread(500);

        let report = run_multi_threaded(&list, &opts).unwrap();
        assert_eq!(report.workload, Workload::MultiThread { threads: 3 });
        assert_eq!(report.inserted, 1_500);
        assert_eq!(list.len(), 1_500);
        for key in [0, 499, 500, 1_000, 1_499] {
            assert_eq!(list.get(key), Some(key * 2));
        }
        assert_eq!(list.get(1_500), None);
    }

    #[test]
    fn test_single_threaded_rejects_overflowing_ops() {
        let list = ConcurrentList::new();
        let err = run_single_threaded(&list, usize::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_worker_insert_failure_fails_run() {
        let list = Arc::new(ConcurrentList::new());
        let mut opts = BenchOptions::new();
        opts.threads(2).ops_per_thread(100);

        list.fail_next_insert();
        let err = run_multi_threaded(&list, &opts).unwrap_err();
        assert!(matches!(err, Error::Worker(ref msg) if msg.contains("Alloc")));

        // The very first insert fails, so that worker adds nothing.
        assert_eq!(list.len(), 100);
        assert_eq!(list.entries().len(), 100);
        let stats = list.arena_stats();
        assert_eq!(stats.live(), list.len() as u64 + 2);
    }

    #[test]
    fn test_worker_panic_maps_to_worker_error() {
        let pool = ThreadPool::new(2);
        pool.execute(|| panic!("worker blew up"));
        pool.execute(|| {});

        let err = join_workers(pool).unwrap_err();
        assert!(matches!(err, Error::Worker(ref msg) if msg.contains("panicked")));
    }

    #[test]
    fn test_report_display() {
        let single = BenchReport {
            workload: Workload::SingleThread,
            inserted: 10,
            elapsed: Duration::from_millis(1_500),
        };
        assert_eq!(
            single.to_string(),
            "Single thread: inserted 10 nodes in 1.500 seconds"
        );

        let multi = BenchReport {
            workload: Workload::MultiThread { threads: 4 },
            inserted: 40,
            elapsed: Duration::from_millis(250),
        };
        assert_eq!(
            multi.to_string(),
            "4 threads: inserted 40 total in 0.250 seconds"
        );
    }
}
