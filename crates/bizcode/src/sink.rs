//! Background registry emission.
//!
//! The formatter pushes each trace into a bounded lock-free queue and
//! returns. One worker thread drains the queue into the [`Registry`].
//! When the queue is full the record is dropped; the caller never waits.
//!
//! ```text
//!   formatter ──try_emit──► ArrayQueue (bounded) ──pop──► worker ──► Registry::record
//!                   │ full                                  ▲
//!                   └──► dropped += 1          unpark ──────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use bizcode_core::CodeInfo;
use crossbeam_queue::ArrayQueue;

use crate::error::{Error, Result};
use crate::registry::Registry;

/// One composite code and its trace, head first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub code: String,
    pub trace: Vec<CodeInfo>,
}

/// Destination for trace records.
///
/// `try_emit` must not block; return `false` if the record was dropped.
pub trait TraceSink: Send + Sync {
    fn try_emit(&self, record: TraceRecord) -> bool;
}

/// State shared between the sink handles and the worker.
struct Shared {
    queue: ArrayQueue<TraceRecord>,
    registry: Arc<Registry>,
    shutdown: AtomicBool,
    /// Records accepted into the queue.
    accepted: AtomicU64,
    /// Records popped and handed to the registry.
    handled: AtomicU64,
    /// Records that added a new code.
    recorded: AtomicU64,
    /// Records refused because the queue was full or shut down.
    dropped: AtomicU64,
}

/// Owns the worker thread draining records into a [`Registry`].
///
/// Call [`RegistryWorker::stop`] to drain and join. Dropping the worker
/// only signals shutdown; records still queued are lost.
pub struct RegistryWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl RegistryWorker {
    /// Start the worker. `capacity` is the queue depth (at least 1);
    /// `idle_park` bounds how long an idle worker sleeps between checks.
    pub fn spawn(registry: Arc<Registry>, capacity: usize, idle_park: Duration) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity.max(1)),
            registry,
            shutdown: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            handled: AtomicU64::new(0),
            recorded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("bizcode-registry".into())
            .spawn(move || worker_loop(worker_shared, idle_park))
            .map_err(Error::Spawn)?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// A cloneable, non-blocking handle for the formatter.
    pub fn sink(&self) -> RegistrySink {
        RegistrySink {
            shared: Arc::clone(&self.shared),
            worker: self.handle.as_ref().map(|h| h.thread().clone()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    /// Wait until every accepted record has been handled, or `timeout`
    /// passes. Returns `true` if the queue was fully drained.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let accepted = self.shared.accepted.load(Ordering::Acquire);
            if self.shared.handled.load(Ordering::Acquire) >= accepted {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            if let Some(h) = &self.handle {
                h.thread().unpark();
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Records that added a new code to the registry.
    pub fn recorded(&self) -> u64 {
        self.shared.recorded.load(Ordering::Relaxed)
    }

    /// Records dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Signal shutdown, let the worker drain what is queued, and join it.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("registry worker panicked");
            }
        }
    }
}

impl Drop for RegistryWorker {
    fn drop(&mut self) {
        // Not joined: dropping must not block the owner.
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = &self.handle {
            h.thread().unpark();
        }
    }
}

/// Producer side of a [`RegistryWorker`].
#[derive(Clone)]
pub struct RegistrySink {
    shared: Arc<Shared>,
    worker: Option<Thread>,
}

impl TraceSink for RegistrySink {
    fn try_emit(&self, record: TraceRecord) -> bool {
        if self.shared.shutdown.load(Ordering::Relaxed) {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.shared.queue.push(record) {
            Ok(()) => {
                self.shared.accepted.fetch_add(1, Ordering::AcqRel);
                if let Some(t) = &self.worker {
                    t.unpark();
                }
                true
            }
            Err(record) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(code = %record.code, "registry queue full, trace dropped");
                false
            }
        }
    }
}

fn worker_loop(shared: Arc<Shared>, idle_park: Duration) {
    tracing::debug!("registry worker started");
    loop {
        match shared.queue.pop() {
            Some(record) => {
                if shared.registry.record(&record.code, record.trace) {
                    shared.recorded.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(code = %record.code, "new code recorded");
                }
                shared.handled.fetch_add(1, Ordering::AcqRel);
            }
            None => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                thread::park_timeout(idle_park);
            }
        }
    }
    tracing::debug!(
        recorded = shared.recorded.load(Ordering::Relaxed),
        dropped = shared.dropped.load(Ordering::Relaxed),
        "registry worker stopped"
    );
}
