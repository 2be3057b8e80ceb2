use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::JoinHandle,
};

use crossbeam::channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("{0} job(s) panicked")]
    Panicked(usize),
}

enum Task {
    Action(Box<dyn FnOnce() + Send + 'static>),
    Terminate,
}

/// Bookkeeping shared between the pool handle and its workers.
#[derive(Default)]
struct PoolState {
    pending: Mutex<usize>,
    idle: Condvar,
    panicked: Mutex<usize>,
}

impl PoolState {
    fn job_queued(&self) {
        *self.pending.lock() += 1;
    }

    fn job_done(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.idle.wait(&mut pending);
        }
    }
}

/// A fixed set of named worker threads fed from one unbounded channel.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Sender<Task>,
    state: Arc<PoolState>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "ThreadPool size must be greater than 0.");

        let (sender, receiver) = crossbeam::channel::unbounded();
        let state = Arc::new(PoolState::default());
        let workers = (0..size)
            .map(|id| Worker::new(id, receiver.clone(), state.clone()))
            .collect();
        tracing::debug!("thread pool started with {} workers", size);
        Self {
            workers,
            sender,
            state,
        }
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.state.job_queued();
        self.sender
            .send(Task::Action(Box::new(f)))
            .expect("Failed to send job.");
    }

    /// Blocks until every job queued so far has finished, panicked ones included.
    pub fn wait(&self) {
        self.state.wait_idle();
    }

    /// Number of jobs that panicked since the pool was created.
    pub fn panicked(&self) -> usize {
        *self.state.panicked.lock()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Waits for outstanding jobs, then stops and joins every worker.
    pub fn join(mut self) -> Result<(), PoolError> {
        self.wait();
        self.shutdown();
        match self.panicked() {
            0 => Ok(()),
            n => Err(PoolError::Panicked(n)),
        }
    }

    fn shutdown(&mut self) {
        for _ in 0..self.workers.len() {
            self.sender
                .send(Task::Terminate)
                .expect("Failed to send termination signal.");
        }

        for mut worker in self.workers.drain(..) {
            if let Some(thread) = worker.thread.take() {
                thread.join().expect("Failed to join worker thread.");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, recv: Receiver<Task>, state: Arc<PoolState>) -> Self {
        let thread = std::thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                Self::run_loop(id, recv, state);
            })
            .expect("Failed to create worker thread.");
        Self {
            thread: Some(thread),
        }
    }

    fn run_loop(id: usize, recv: Receiver<Task>, state: Arc<PoolState>) {
        loop {
            match recv.recv() {
                Ok(Task::Action(action)) => {
                    tracing::trace!("Worker {} got a job; executing.", id);
                    if panic::catch_unwind(AssertUnwindSafe(action)).is_err() {
                        tracing::error!("Worker {} job panicked.", id);
                        *state.panicked.lock() += 1;
                    }
                    state.job_done();
                }
                Ok(Task::Terminate) => {
                    tracing::debug!("Worker {} terminated; shutting down.", id);
                    break;
                }
                Err(_) => {
                    tracing::error!("Worker {} disconnected; shutting down.", id);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Barrier,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    use std::time::Duration;

    #[test]
    fn test_create_pool() {
        let pool = ThreadPool::new(4);
        assert_eq!(pool.len(), 4);
    }

    #[test]
    #[should_panic(expected = "greater than 0")]
    fn test_zero_size_pool() {
        let _ = ThreadPool::new(0);
    }

    #[test]
    fn test_wait_for_job() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        pool.execute(move || {
            std::thread::sleep(Duration::from_millis(20));
            c.fetch_add(1, Ordering::SeqCst);
        });

        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_on_idle_pool() {
        let pool = ThreadPool::new(2);
        pool.wait();
        assert!(pool.join().is_ok());
    }

    #[test]
    fn test_concurrent_tasks() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        for _ in 0..100 {
            let c = Arc::clone(&counter);
            let b = Arc::clone(&barrier);
            pool.execute(move || {
                b.wait();
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_drop_finishes_running_job() {
        let pool = ThreadPool::new(2);
        let terminated = Arc::new(AtomicBool::new(false));

        let t = Arc::clone(&terminated);
        pool.execute(move || {
            std::thread::sleep(Duration::from_millis(50));
            t.store(true, Ordering::SeqCst);
        });

        drop(pool);

        assert!(terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_heavy_load() {
        let pool = ThreadPool::new(8);
        let counter = Arc::new(AtomicUsize::new(0));

        const TASKS: usize = 10_000;
        for _ in 0..TASKS {
            let c = Arc::clone(&counter);
            pool.execute(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), TASKS);
    }

    #[test]
    fn test_panicking_job_is_counted() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.execute(|| panic!("boom"));
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            pool.execute(move || {
                std::thread::sleep(Duration::from_micros(rand::random::<u64>() % 200));
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait();
        assert_eq!(pool.panicked(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(matches!(pool.join(), Err(PoolError::Panicked(1))));
    }
}
