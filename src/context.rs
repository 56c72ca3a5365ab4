//! The execution environment a computation runs in. The caller supplies a [`Context`]; the
//! executor only ever asks it whether work may continue, how wide to fan out and to run a set of
//! tasks to completion. Two implementations ship with the crate: a work stealing thread pool and
//! a single threaded one for deterministic execution.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// One unit of work handed to [`Context::call`]. Tasks may borrow the calculator driving them,
/// so a context must run them before returning.
pub type Task<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

/// Caller supplied execution environment.
pub trait Context: Sync {
    /// `false` once the computation should stop. Checked by the executor at partition
    /// boundaries; going inactive aborts the computation cooperatively.
    fn is_active(&self) -> bool;

    /// Targeted number of tasks running concurrently.
    fn parallelism(&self) -> usize;

    /// Run all tasks to completion, blocking the caller. Answers the error of the first failed
    /// task, after all tasks have finished. An inactive context refuses the work with
    /// [`Error::Aborted`] without running anything.
    fn call(&self, tasks: Vec<Task<'_>>) -> Result<()>;
}

/// A [`Context`] backed by a bounded work stealing thread pool.
pub struct ThreadPoolContext {
    pool: rayon::ThreadPool,
    active: AtomicBool,
}

impl ThreadPoolContext {
    /// A context running up to `parallelism` tasks concurrently.
    pub fn new(parallelism: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .map_err(|error| {
                Error::invalid_argument(format!("cannot build thread pool: {error}"))
            })?;
        Ok(ThreadPoolContext {
            pool,
            active: AtomicBool::new(true),
        })
    }

    /// Stop accepting work. Running tasks finish, computations observing the flag abort.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Relaxed);
    }
}

impl Context for ThreadPoolContext {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn call(&self, tasks: Vec<Task<'_>>) -> Result<()> {
        if !self.is_active() {
            return Err(Error::Aborted);
        }
        let first_error: Mutex<Option<Error>> = Mutex::new(None);
        self.pool.scope(|scope| {
            for task in tasks {
                scope.spawn(|_| {
                    if let Err(error) = task() {
                        first_error.lock().get_or_insert(error);
                    }
                });
            }
        });
        match first_error.into_inner() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A [`Context`] running every task on the calling thread, in order. Useful for tests and for
/// embedding into environments which bring their own threading.
pub struct SequentialContext {
    active: AtomicBool,
}

impl SequentialContext {
    pub fn new() -> Self {
        SequentialContext {
            active: AtomicBool::new(true),
        }
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Relaxed);
    }
}

impl Default for SequentialContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for SequentialContext {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn parallelism(&self) -> usize {
        1
    }

    fn call(&self, tasks: Vec<Task<'_>>) -> Result<()> {
        if !self.is_active() {
            return Err(Error::Aborted);
        }
        let mut first_error = None;
        for task in tasks {
            if let Err(error) = task() {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
