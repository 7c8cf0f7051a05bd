//! State shared between clones of a value.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

/// Handle to a value shared by every clone of the handle.
///
/// Access is scoped to a closure so a guard never outlives the statement that
/// needs it. A panic inside another closure does not make the value
/// unreachable: the poisoned lock is recovered and the last written state is
/// used.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    /// Wraps `value` in a fresh handle.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Runs `access` with exclusive access to the value.
    pub fn with<R>(&self, access: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        access(&mut guard)
    }

    /// Replaces the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.with(|current| mem::replace(current, value))
    }
}

impl<T: Clone> Shared<T> {
    /// Copy of the current value.
    pub fn snapshot(&self) -> T {
        self.with(|value| value.clone())
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|value| f.debug_tuple("Shared").field(value).finish())
    }
}
