use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::config::RuntimeOpts;
use crate::foundation::error::{BindError, BindResult};

/// Bounded pool running native calls off the caller's thread.
///
/// At most `threads + max_queued` calls are admitted at once; further submitters block until a
/// slot frees up.
pub(crate) struct WorkerPool {
    pool: rayon::ThreadPool,
    gate: Arc<Gate>,
}

impl WorkerPool {
    pub(crate) fn new(opts: &RuntimeOpts) -> BindResult<Self> {
        opts.validate()?;

        let prefix = opts.thread_name_prefix.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(move |i| format!("{prefix}-{i}"))
            .panic_handler(|_| tracing::error!("native call panicked on a worker thread"));
        if let Some(n) = opts.threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| {
            BindError::validation(format!("failed to build native worker pool: {e}"))
        })?;

        let capacity = pool.current_num_threads().saturating_add(opts.max_queued);
        Ok(Self {
            pool,
            gate: Arc::new(Gate::new(capacity)),
        })
    }

    pub(crate) fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Calls admitted and not yet finished.
    pub(crate) fn in_flight(&self) -> usize {
        *self.gate.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `job` on the pool, blocking while the pool is saturated.
    ///
    /// Must not be called from a pool worker: a saturated pool would wait on itself.
    pub(crate) fn submit<T, F>(&self, job: F) -> PendingCall<T>
    where
        T: Send + 'static,
        F: FnOnce() -> BindResult<T> + Send + 'static,
    {
        let permit = self.gate.acquire();
        let (tx, rx) = mpsc::sync_channel(1);
        self.pool.spawn(move || {
            let out = job();
            drop(permit);
            // The caller may have stopped waiting; the result (and any handles in it) drops here.
            let _ = tx.send(out);
        });
        PendingCall { rx }
    }
}

struct Gate {
    capacity: usize,
    in_flight: Mutex<usize>,
    freed: Condvar,
}

impl Gate {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_flight: Mutex::new(0),
            freed: Condvar::new(),
        }
    }

    fn acquire(self: &Arc<Self>) -> Permit {
        let mut n = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while *n >= self.capacity {
            n = self.freed.wait(n).unwrap_or_else(PoisonError::into_inner);
        }
        *n += 1;
        Permit(self.clone())
    }
}

struct Permit(Arc<Gate>);

impl Drop for Permit {
    fn drop(&mut self) {
        let mut n = self.0.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *n = n.saturating_sub(1);
        self.0.freed.notify_one();
    }
}

/// Result of a native call that may still be running.
#[must_use = "dropping a PendingCall discards its result"]
pub struct PendingCall<T> {
    rx: mpsc::Receiver<BindResult<T>>,
}

impl<T> PendingCall<T> {
    /// Block until the call finishes.
    pub fn wait(self) -> BindResult<T> {
        self.rx.recv().map_err(|_| worker_lost())?
    }

    /// Block for at most `timeout`.
    ///
    /// On timeout the call keeps running on its worker and its outputs are released when it
    /// finishes.
    pub fn wait_timeout(self, timeout: Duration) -> BindResult<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(out) => out,
            Err(RecvTimeoutError::Timeout) => Err(BindError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(worker_lost()),
        }
    }

    /// Non-blocking poll. `None` while the call is still running.
    pub fn try_wait(&self) -> Option<BindResult<T>> {
        match self.rx.try_recv() {
            Ok(out) => Some(out),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_lost())),
        }
    }
}

fn worker_lost() -> BindError {
    BindError::native("worker stopped before the native call completed")
}
