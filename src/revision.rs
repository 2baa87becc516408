//! Module-state revision counter
//!
//! Every successful module mutation bumps the revision while holding its lock.
//! Persistence takes the same lock to snapshot module state, so a persisted
//! document never mixes state from before and during one mutation.
//!
//! The lock is reentrant: a snapshot taken under `observe` may lazily load a
//! module view, which itself runs under the lock.

use parking_lot::ReentrantMutex;
use std::cell::Cell;

#[derive(Debug, Default)]
pub struct Revision {
    counter: ReentrantMutex<Cell<u64>>,
}

impl Revision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision
    pub fn current(&self) -> u64 {
        self.counter.lock().get()
    }

    /// Run a mutation under the lock; the revision advances only on success
    pub fn mutate<R, E>(&self, f: impl FnOnce() -> Result<R, E>) -> Result<R, E> {
        let counter = self.counter.lock();
        let result = f()?;
        counter.set(counter.get() + 1);
        Ok(result)
    }

    /// Record a change that happened outside a mutation, such as a re-read
    /// that found different values in the graph
    pub fn advance(&self) {
        let counter = self.counter.lock();
        counter.set(counter.get() + 1);
    }

    /// Read module state under the lock, with the revision it corresponds to
    pub fn observe<R>(&self, f: impl FnOnce(u64) -> R) -> R {
        let counter = self.counter.lock();
        f(counter.get())
    }
}
