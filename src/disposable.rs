use crate::utils::{AtomicFlag, Synchronized};
use std::sync::Arc;

/// Uniform resource-release contract.
///
/// `dispose` is idempotent: the first call releases resources, subsequent
/// calls are silent no-ops.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

/// Disposable built from a closure, run at most once.
pub struct AnonymousDisposable {
    action: Synchronized<Option<Box<dyn FnOnce() + Send>>>,
}

impl AnonymousDisposable {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Synchronized::new(Some(Box::new(action))),
        }
    }
}

impl Disposable for AnonymousDisposable {
    fn dispose(&self) {
        if let Some(action) = self.action.with_lock(|slot| slot.take()) {
            action();
        }
    }
}

/// Disposes an ordered list of disposables exactly once, in order.
pub struct CompositeDisposable {
    parts: Synchronized<Vec<Arc<dyn Disposable>>>,
    disposed: AtomicFlag,
}

impl CompositeDisposable {
    pub fn new() -> Self {
        Self {
            parts: Synchronized::new(Vec::new()),
            disposed: AtomicFlag::new(false),
        }
    }

    pub fn of(parts: Vec<Arc<dyn Disposable>>) -> Self {
        Self {
            parts: Synchronized::new(parts),
            disposed: AtomicFlag::new(false),
        }
    }

    /// Add a part, or dispose it immediately if the composite already was.
    pub fn add(&self, part: Arc<dyn Disposable>) {
        if self.disposed.get() {
            part.dispose();
            return;
        }
        self.parts.with_lock(|parts| parts.push(part));
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        if self.disposed.get_and_set(true) {
            return;
        }
        let parts = self.parts.with_lock(std::mem::take);
        for part in parts {
            part.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn anonymous_disposable_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let d = AnonymousDisposable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        d.dispose();
        d.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn composite_disposes_in_order_once() {
        let order = Arc::new(Synchronized::new(Vec::new()));
        let composite = CompositeDisposable::new();
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            composite.add(Arc::new(AnonymousDisposable::new(move || {
                order.with_lock(|o| o.push(tag));
            })));
        }
        composite.dispose();
        composite.dispose();
        assert_eq!(order.with_lock(|o| o.clone()), vec!["a", "b", "c"]);
    }

    #[test]
    fn composite_disposes_late_additions_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeDisposable::new();
        composite.dispose();
        let c = count.clone();
        composite.add(Arc::new(AnonymousDisposable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
