#![forbid(unsafe_code)]

//! UI-affine effect scheduling.
//!
//! Controls are not thread-safe, so every mutation of a control goes through
//! the [`UiScheduler`] of the thread that owns it. The scheduler is a FIFO
//! queue with two entrances:
//!
//! - **Local** ([`UiScheduler::schedule`]): called on the UI thread. When the
//!   queue is idle the job runs synchronously, so a binding's initial write
//!   lands before `bind` returns. When a job is already running (a write
//!   triggered from inside another write) the new job is appended and runs
//!   as soon as the current one finishes.
//! - **Remote** ([`RemoteScheduler::schedule`]): callable from any thread.
//!   Jobs travel over a channel and run on the UI thread the next time the
//!   event loop calls [`UiScheduler::run_pending`]. Jobs from one sender keep
//!   their relative order.
//!
//! # Invariants
//!
//! 1. Local jobs run in the order they were scheduled.
//! 2. No job runs while another job is running (no interleaving).
//! 3. A panicking job does not wedge the queue: the draining flag is reset
//!    during unwinding.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

type Job = Box<dyn FnOnce()>;
type RemoteJob = Box<dyn FnOnce() + Send>;

thread_local! {
    static CURRENT: UiScheduler = UiScheduler::new(config_from_env());
}

fn config_from_env() -> SchedulerConfig {
    SchedulerConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(%err, "ignoring scheduler configuration from environment");
        SchedulerConfig::default()
    })
}

struct UiQueue {
    config: SchedulerConfig,
    draining: Cell<bool>,
    pending: RefCell<VecDeque<Job>>,
    executed: Cell<u64>,
    remote_tx: mpsc::Sender<RemoteJob>,
    remote_rx: mpsc::Receiver<RemoteJob>,
}

/// Serial executor bound to the UI thread that created it.
#[derive(Clone)]
pub struct UiScheduler {
    queue: Rc<UiQueue>,
}

impl UiScheduler {
    /// Create a standalone scheduler. Most code wants [`UiScheduler::current`].
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let (remote_tx, remote_rx) = mpsc::channel();
        Self {
            queue: Rc::new(UiQueue {
                config,
                draining: Cell::new(false),
                pending: RefCell::new(VecDeque::new()),
                executed: Cell::new(0),
                remote_tx,
                remote_rx,
            }),
        }
    }

    /// The scheduler owned by the calling thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(Clone::clone)
    }

    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.queue.config
    }

    /// A `Send` handle that posts jobs back onto this scheduler.
    #[must_use]
    pub fn remote(&self) -> RemoteScheduler {
        RemoteScheduler {
            tx: self.queue.remote_tx.clone(),
        }
    }

    /// Run `job` on this thread, after any job already in progress.
    pub fn schedule(&self, job: impl FnOnce() + 'static) {
        self.queue.pending.borrow_mut().push_back(Box::new(job));
        if !self.queue.draining.get() {
            self.drain_local();
        }
    }

    /// Pull queued remote jobs (up to the configured budget) and run them,
    /// together with anything queued locally. Returns the number of jobs run.
    pub fn run_pending(&self) -> usize {
        let budget = self.queue.config.remote_budget.unwrap_or(usize::MAX);
        let mut pulled = 0usize;
        while pulled < budget {
            let Ok(job) = self.queue.remote_rx.try_recv() else {
                break;
            };
            let job: Job = job;
            self.queue.pending.borrow_mut().push_back(job);
            pulled += 1;
        }
        if pulled > 0 {
            tracing::trace!(pulled, "pulled remote jobs");
        }
        if self.queue.draining.get() {
            return 0;
        }
        self.drain_local()
    }

    /// Jobs waiting in the local queue.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.pending.borrow().len()
    }

    /// Total jobs executed by this scheduler.
    #[must_use]
    pub fn executed_count(&self) -> u64 {
        self.queue.executed.get()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.queue.draining.get()
    }

    fn drain_local(&self) -> usize {
        let _guard = DrainGuard::enter(&self.queue.draining);
        let mut ran = 0;
        loop {
            let job = self.queue.pending.borrow_mut().pop_front();
            let Some(job) = job else {
                break;
            };
            job();
            ran += 1;
            self.queue.executed.set(self.queue.executed.get() + 1);
        }
        ran
    }
}

impl std::fmt::Debug for UiScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiScheduler")
            .field("pending", &self.pending_count())
            .field("draining", &self.is_draining())
            .field("executed", &self.executed_count())
            .finish()
    }
}

struct DrainGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> DrainGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Cross-thread handle onto a [`UiScheduler`].
#[derive(Clone, Debug)]
pub struct RemoteScheduler {
    tx: mpsc::Sender<RemoteJob>,
}

impl RemoteScheduler {
    /// Queue `job` for the UI thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Disconnected`] if the owning thread is gone.
    pub fn schedule(&self, job: impl FnOnce() + Send + 'static) -> Result<(), SchedulerError> {
        self.tx
            .send(Box::new(job))
            .map_err(|_| SchedulerError::Disconnected)
    }
}
