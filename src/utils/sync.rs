use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutex wrapper exposing closure-scoped access to the guarded value.
///
/// Keeps lock acquisition and release in one place so callers cannot
/// hold a guard across a publish or a callback by accident.
pub struct Synchronized<T> {
    inner: Mutex<T>,
}

impl<T> Synchronized<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// Not re-entrant: calling `with_lock` again on the same value from
    /// inside `f` deadlocks.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}

impl<T: fmt::Debug> fmt::Debug for Synchronized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(guard) => f.debug_tuple("Synchronized").field(&*guard).finish(),
            None => f.write_str("Synchronized(<locked>)"),
        }
    }
}

/// Cheaply clonable atomic flag with get-and-set.
/// Wraps an `AtomicBool` in `Arc<CachePadded<...>>` to avoid false sharing.
#[derive(Clone)]
#[repr(transparent)]
pub struct AtomicFlag(Arc<CachePadded<AtomicBool>>);

impl AtomicFlag {
    #[inline]
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(CachePadded::new(AtomicBool::new(initial))))
    }

    #[inline(always)]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn set(&self, v: bool) {
        self.0.store(v, Ordering::Release)
    }

    /// Atomically set the flag and return the previous value.
    /// The at-most-once dispose primitive.
    #[inline(always)]
    pub fn get_and_set(&self, v: bool) -> bool {
        self.0.swap(v, Ordering::AcqRel)
    }
}

impl fmt::Debug for AtomicFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicFlag")
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_get_and_set_returns_previous() {
        let flag = AtomicFlag::new(false);
        assert!(!flag.get_and_set(true));
        assert!(flag.get_and_set(true));
        assert!(flag.get());
    }

    #[test]
    fn flag_clones_share_state() {
        let flag = AtomicFlag::new(false);
        let other = flag.clone();
        flag.set(true);
        assert!(other.get());
    }

    #[test]
    fn synchronized_scoped_access() {
        let cell = Synchronized::new(vec![1, 2]);
        let len = cell.with_lock(|v| {
            v.push(3);
            v.len()
        });
        assert_eq!(len, 3);
    }
}
