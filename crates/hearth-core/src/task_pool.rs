//! Background worker pool for blocking fetch work.
//!
//! Fetchers hand I/O and decoding to this pool so that `fetch` returns a
//! future immediately and the host's update loop never blocks.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use async_executor::{Executor, Task};

/// How long an idle worker sleeps before checking for new tasks.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

struct Shared {
    executor: Executor<'static>,
    shutdown: AtomicBool,
}

/// A fixed-size pool of worker threads driving an `async-executor`.
///
/// ```ignore
/// let pool = TaskPool::new(2)?;
/// let task = pool.spawn(async { std::fs::read("clip.wav") });
/// // `task` is a future; poll it from the update loop or block on it.
/// ```
pub struct TaskPool {
    shared: Arc<Shared>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl TaskPool {
    /// Create a pool with `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let shared = Arc::new(Shared {
            executor: Executor::new(),
            shutdown: AtomicBool::new(false),
        });

        let mut threads = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let worker = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("hearth-task-{i}"))
                .spawn(move || {
                    while !worker.shutdown.load(Ordering::Acquire) {
                        if !worker.executor.try_tick() {
                            thread::sleep(IDLE_BACKOFF);
                        }
                    }
                })?;
            threads.push(handle);
        }

        tracing::debug!("TaskPool started with {} threads", num_threads);
        Ok(Self { shared, threads })
    }

    /// Create a pool sized for the machine, leaving one core for the host loop.
    pub fn default_threads() -> io::Result<Self> {
        Self::new(num_cpus::get().saturating_sub(1))
    }

    /// Spawn a future on the pool. The returned task is itself a future.
    ///
    /// Dropping the task cancels it.
    pub fn spawn<T>(&self, future: impl Future<Output = T> + Send + 'static) -> Task<T>
    where
        T: Send + 'static,
    {
        self.shared.executor.spawn(future)
    }

    /// Run a blocking closure on a worker thread.
    pub fn spawn_blocking<T, F>(&self, f: F) -> Task<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.shared.executor.spawn(async move { f() })
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop the workers and wait for them to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            if let Err(e) = handle.join() {
                tracing::error!("Task pool thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("threads", &self.threads.len())
            .finish()
    }
}
