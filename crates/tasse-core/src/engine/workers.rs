use super::progress::{Progress, ProgressReporter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on the number of worker threads.
pub const MAX_THREADS: usize = 32;

/// Shared cooperative cancellation flag.
///
/// Cloning yields a handle to the same flag. Workers stop claiming new items
/// once it is set; items already in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Resolves the worker count from a request, capped by the available
/// parallelism and [`MAX_THREADS`].
pub fn resolve_thread_count(requested: Option<usize>) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested
        .unwrap_or(available)
        .min(available)
        .min(MAX_THREADS)
        .max(1)
}

/// Outcome of one [`WorkerPool::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub claimed: usize,
    pub completed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

struct Dispatcher<E> {
    next: Mutex<usize>,
    total: usize,
    aborted: AtomicBool,
    first_error: Mutex<Option<E>>,
}

impl<E> Dispatcher<E> {
    fn new(total: usize) -> Self {
        Self {
            next: Mutex::new(0),
            total,
            aborted: AtomicBool::new(false),
            first_error: Mutex::new(None),
        }
    }

    /// Hands out the next unclaimed index together with the number of
    /// indices claimed so far.
    fn claim(&self, cancel: &CancelToken) -> Option<(usize, usize)> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel.is_cancelled() || self.aborted.load(Ordering::Relaxed) || *next >= self.total {
            return None;
        }
        let index = *next;
        *next += 1;
        Some((index, *next))
    }

    fn claimed(&self) -> usize {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, error: E) {
        self.aborted.store(true, Ordering::SeqCst);
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take_error(&self) -> Option<E> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Fixed-size pool of worker threads pulling item indices from a shared
/// counter.
///
/// Each worker is identified by a stable `thread_id` in `0..threads()`, which
/// callers use to index per-thread state. When the underlying thread pool
/// cannot be created the pool degrades to running every item on the calling
/// thread as `thread_id` 0.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.clamp(1, MAX_THREADS);
        if threads == 1 {
            return Self {
                pool: None,
                threads: 1,
            };
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tasse-worker-{i}"))
            .build()
        {
            Ok(pool) => {
                debug!(threads, "Worker pool created.");
                Self {
                    pool: Some(pool),
                    threads,
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to create worker threads, running sequentially.");
                Self {
                    pool: None,
                    threads: 1,
                }
            }
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Executes `work(thread_id, index)` exactly once for every index in
    /// `0..work_count` unless cancelled or aborted by an error.
    ///
    /// The first error stops all workers from claiming further items and is
    /// returned once every in-flight item has finished.
    pub fn run<F, E>(
        &self,
        work_count: usize,
        cancel: &CancelToken,
        reporter: &ProgressReporter,
        work: F,
    ) -> Result<RunSummary, E>
    where
        F: Fn(usize, usize) -> Result<(), E> + Sync,
        E: Send,
    {
        let start = Instant::now();
        let dispatcher = Dispatcher::new(work_count);
        let completed = AtomicUsize::new(0);
        let milestone = (work_count / 10).max(1);

        reporter.report(Progress::SnapshotsStart {
            total: work_count as u64,
        });

        let worker = |thread_id: usize| {
            while let Some((index, claimed)) = dispatcher.claim(cancel) {
                reporter.report(Progress::SnapshotClaimed {
                    claimed: claimed as u64,
                    total: work_count as u64,
                });
                if claimed % milestone == 0 {
                    info!(
                        percent = claimed * 100 / work_count,
                        claimed,
                        total = work_count,
                        "Processing snapshots."
                    );
                }
                match work(thread_id, index) {
                    Ok(()) => {
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => dispatcher.fail(e),
                }
            }
        };

        match &self.pool {
            Some(pool) => {
                pool.broadcast(|ctx| worker(ctx.index()));
            }
            None => worker(0),
        }

        let summary = RunSummary {
            claimed: dispatcher.claimed(),
            completed: completed.load(Ordering::Relaxed),
            cancelled: cancel.is_cancelled(),
            elapsed: start.elapsed(),
        };
        reporter.report(Progress::SnapshotsFinish {
            processed: summary.completed as u64,
            cancelled: summary.cancelled,
        });

        match dispatcher.take_error() {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}
