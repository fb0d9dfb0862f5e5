/// Work-submission capability.
///
/// The asset cache and the resource manager hand background work (pack reads,
/// decompression, staging copies) to a `JobQueue` they do not own and never wait
/// on; completion is observed through their own state machines.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use crossbeam_channel::{Receiver, Sender};
use crate::error::{Error, Result};

/// Fire-and-forget unit of background work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Background execution capability
pub trait JobQueue: Send + Sync {
    /// Schedule `job`. Must not block on the job's completion.
    fn submit(&self, job: Job);
}

/// Run a job, turning a panic into a logged error so the caller survives
pub(crate) fn run_guarded(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        crate::engine_error!("galaxy3d::JobQueue", "Background job panicked: {}", reason);
    }
}

// ============================================================================
// Thread pool
// ============================================================================

struct PoolShared {
    pending: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

/// Fixed set of worker threads fed through a crossbeam channel
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<PoolShared>,
}

impl ThreadPool {
    /// Spawn `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InitializationFailed("ThreadPool needs at least one worker".to_string()));
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let shared = Arc::new(PoolShared {
            pending: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver: Receiver<Job> = receiver.clone();
            let shared = shared.clone();
            let worker = std::thread::Builder::new()
                .name(format!("galaxy3d-stream-{}", index))
                .spawn(move || {
                    for job in receiver.iter() {
                        run_guarded(job);
                        if shared.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                            let _guard = shared.idle_lock.lock();
                            shared.idle.notify_all();
                        }
                    }
                })
                .map_err(|e| Error::InitializationFailed(format!("cannot spawn worker {}: {}", index, e)))?;
            workers.push(worker);
        }

        crate::engine_debug!("galaxy3d::ThreadPool", "Started {} workers", threads);

        Ok(Self { sender: Some(sender), workers, shared })
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted but not finished
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Block until every submitted job has finished (including jobs they submitted)
    pub fn wait_idle(&self) {
        let mut guard = match self.shared.idle_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while self.shared.pending.load(Ordering::Acquire) > 0 {
            guard = match self.shared.idle.wait(guard) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

impl JobQueue for ThreadPool {
    fn submit(&self, job: Job) {
        let Some(sender) = &self.sender else { return };
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(job).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            crate::engine_error!("galaxy3d::ThreadPool", "Job dropped: workers have shut down");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop once the backlog is drained
        self.sender = None;
        let current = std::thread::current().id();
        for worker in self.workers.drain(..) {
            // A job holding the last reference drops the pool from a worker
            if worker.thread().id() == current {
                continue;
            }
            let _ = worker.join();
        }
    }
}

// ============================================================================
// Inline and deferred queues
// ============================================================================

/// Runs each job on the submitting thread before `submit` returns
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateJobQueue;

impl JobQueue for ImmediateJobQueue {
    fn submit(&self, job: Job) {
        run_guarded(job);
    }
}

/// Collects jobs until the host calls `run_pending`
///
/// Suits single-threaded hosts that drain background work at a fixed point of
/// the frame, and tests that need to observe the "still loading" state.
#[derive(Default)]
pub struct DeferredJobQueue {
    jobs: Mutex<Vec<Job>>,
}

impl DeferredJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs
    pub fn pending(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    /// Run queued jobs in submission order until the queue is empty.
    /// Returns the number of jobs executed.
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;
        loop {
            let batch = match self.jobs.lock() {
                Ok(mut jobs) => std::mem::take(&mut *jobs),
                Err(_) => return executed,
            };
            if batch.is_empty() {
                return executed;
            }
            for job in batch {
                run_guarded(job);
                executed += 1;
            }
        }
    }
}

impl JobQueue for DeferredJobQueue {
    fn submit(&self, job: Job) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job);
        }
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
