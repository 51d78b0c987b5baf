//! Main-thread dispatcher
//!
//! Game state may only be read from the game's own update thread. Code
//! running elsewhere (request tasks, worker threads) queues closures here;
//! the game thread runs them by calling [`Dispatcher::drain`] once per tick.
//!
//! The first thread to drain becomes the designated thread for the life of
//! the dispatcher, unless one was bound at construction. Drains from any
//! other thread are refused.

mod handle;

pub use handle::{DispatchError, DispatchHandle};

use crate::config::DispatcherConfig;
use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread::{self, ThreadId};
use tokio::sync::oneshot;
use tracing::{error, trace, warn};

/// Queue length above which enqueueing logs a warning
pub const DEFAULT_SOFT_LIMIT: usize = 5000;

type Action = Box<dyn FnOnce() + Send + 'static>;

/// What a call to [`Dispatcher::drain`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Ran this many actions
    Ran(usize),
    /// Nothing was queued
    Empty,
    /// Called from a thread other than the designated one; nothing ran
    WrongThread,
    /// Called from inside an action that is being drained; nothing ran
    Reentrant,
}

/// Queue of closures to run on the designated thread
pub struct Dispatcher {
    queue: Mutex<Vec<Action>>,
    designated: OnceLock<ThreadId>,
    draining: AtomicBool,
    soft_limit: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher whose designated thread is the first to drain it
    pub fn new() -> Self {
        Self::with_soft_limit(DEFAULT_SOFT_LIMIT)
    }

    pub fn with_soft_limit(soft_limit: usize) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            designated: OnceLock::new(),
            draining: AtomicBool::new(false),
            soft_limit,
        }
    }

    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::with_soft_limit(config.soft_limit)
    }

    /// Create a dispatcher bound to the calling thread from the start
    pub fn bound_to_current_thread() -> Self {
        let dispatcher = Self::new();
        let _ = dispatcher.designated.set(thread::current().id());
        dispatcher
    }

    /// The process-wide dispatcher used by game-state readers
    pub fn global() -> &'static Dispatcher {
        static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();
        GLOBAL.get_or_init(Dispatcher::new)
    }

    /// The designated thread, once established
    pub fn designated_thread(&self) -> Option<ThreadId> {
        self.designated.get().copied()
    }

    /// Whether the caller is on the designated thread
    pub fn is_designated_thread(&self) -> bool {
        self.designated_thread() == Some(thread::current().id())
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Number of actions waiting for the next drain
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    /// Queue an action for the designated thread.
    ///
    /// Never rejects: past the soft limit a warning is logged and the
    /// action is still accepted.
    pub fn enqueue<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.lock_queue();
        if queue.len() >= self.soft_limit {
            warn!(
                "[Dispatcher] Queue size {} exceeded {}. Action may be delayed.",
                queue.len(),
                self.soft_limit
            );
        }
        queue.push(Box::new(action));
    }

    /// Run every queued action, in enqueue order.
    ///
    /// The queue is swapped out under the lock and actions run unlocked,
    /// so an action may enqueue more work; that work runs on the next
    /// drain. A panicking action is logged and the rest still run.
    pub fn drain(&self) -> DrainOutcome {
        let current = thread::current().id();
        let designated = *self.designated.get_or_init(|| current);
        if designated != current {
            error!(
                "[Dispatcher] drain called from non-designated thread {:?}. Ignored.",
                current
            );
            return DrainOutcome::WrongThread;
        }

        if self.is_draining() {
            trace!("[Dispatcher] drain called while draining. Ignored.");
            return DrainOutcome::Reentrant;
        }

        let actions = mem::take(&mut *self.lock_queue());
        if actions.is_empty() {
            return DrainOutcome::Empty;
        }

        self.draining.store(true, Ordering::Release);
        let _reset = DrainingGuard(&self.draining);

        let count = actions.len();
        for action in actions {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(action)) {
                error!("[Dispatcher] Error executing action: {}", panic_message(&*panic));
            }
        }

        DrainOutcome::Ran(count)
    }

    /// Run `func` on the designated thread and get a handle to its result.
    ///
    /// On the designated thread outside of a drain, `func` runs immediately
    /// and the handle is already resolved. Otherwise it is queued and the
    /// handle resolves when a drain runs it.
    pub fn enqueue_async<T, F>(&self, func: F) -> DispatchHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_designated_thread() && !self.is_draining() {
            return DispatchHandle::ready(run_caught(func));
        }

        let (tx, rx) = oneshot::channel();
        self.enqueue(move || {
            // The caller may have dropped the handle; the result is discarded then
            let _ = tx.send(run_caught(func));
        });
        DispatchHandle::pending(rx)
    }

    fn lock_queue(&self) -> MutexGuard<'_, Vec<Action>> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .field("designated", &self.designated_thread())
            .field("draining", &self.is_draining())
            .field("soft_limit", &self.soft_limit)
            .finish()
    }
}

struct DrainingGuard<'a>(&'a AtomicBool);

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn run_caught<T>(func: impl FnOnce() -> T) -> Result<T, DispatchError> {
    panic::catch_unwind(AssertUnwindSafe(func))
        .map_err(|panic| DispatchError::Panicked(panic_message(&*panic)))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
