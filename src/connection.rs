use crate::disposable::Disposable;
use crate::hook::signal_error;
use crate::utils::{AtomicFlag, Synchronized};
use std::sync::Arc;

/// Shared callback consuming values of `T`.
pub type Consumer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Live binding between a producer of inputs and a single consumer.
///
/// Dispose is at-most-once; `accept` after dispose is reported via the
/// error hook and never reaches the consumer.
pub struct Connection<I> {
    accept_fn: Box<dyn Fn(I) + Send + Sync>,
    teardown: Synchronized<Option<Box<dyn FnOnce() + Send>>>,
    disposed: AtomicFlag,
    broken: bool,
}

impl<I> Connection<I> {
    pub fn new(
        accept: impl Fn(I) + Send + Sync + 'static,
        dispose: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            accept_fn: Box::new(accept),
            teardown: Synchronized::new(Some(Box::new(dispose))),
            disposed: AtomicFlag::new(false),
            broken: false,
        }
    }

    /// Inert connection returned when construction fails, so callers never
    /// receive a null-like value. Accepts silently, disposes trivially.
    pub fn broken() -> Self {
        Self {
            accept_fn: Box::new(|_| {}),
            teardown: Synchronized::new(None),
            disposed: AtomicFlag::new(false),
            broken: true,
        }
    }

    /// Deliver a value to the bound consumer.
    pub fn accept(&self, value: I) {
        if self.disposed.get() {
            if !self.broken {
                signal_error!("[Connection] accept called after dispose");
            }
            return;
        }
        (self.accept_fn)(value);
    }
}

impl<I> Disposable for Connection<I> {
    fn dispose(&self) {
        if self.disposed.get_and_set(true) {
            return;
        }
        if let Some(teardown) = self.teardown.with_lock(|slot| slot.take()) {
            teardown();
        }
    }
}

/// Factory producing a [`Connection`] when given an output sink.
///
/// Implementations that support only one live consumer reject a second
/// concurrent `connect` by signalling the error hook and returning a
/// broken Connection.
pub trait Connectable<I, O>: Send + Sync {
    fn connect(&self, output: Consumer<O>) -> Connection<I>;
}

/// Connectable built from a closure.
pub struct AnonymousConnectable<I, O> {
    connect_fn: Box<dyn Fn(Consumer<O>) -> Connection<I> + Send + Sync>,
}

impl<I, O> AnonymousConnectable<I, O> {
    pub fn new(
        connect: impl Fn(Consumer<O>) -> Connection<I> + Send + Sync + 'static,
    ) -> Self {
        Self {
            connect_fn: Box::new(connect),
        }
    }
}

impl<I, O> Connectable<I, O> for AnonymousConnectable<I, O> {
    fn connect(&self, output: Consumer<O>) -> Connection<I> {
        (self.connect_fn)(output)
    }
}
