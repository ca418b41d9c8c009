//! Shared handle for risk state used from more than one thread.
//!
//! The live path polls the same `CircuitBreaker` from the order loop and the
//! P&L feed. Every read-modify-write goes through `with`, so a sequence like
//! "record trade, then check halt" runs under one lock acquisition.

use std::sync::Arc;

use parking_lot::Mutex;

/// Cloneable, thread-safe wrapper around a risk component.
#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}
