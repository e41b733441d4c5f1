use crate::connection::Consumer;
use crate::hook::signal_error;
use crate::utils::Synchronized;
use std::sync::Arc;

/// Consumes routed effect payloads and may feed events back into the loop.
///
/// `handle` may complete asynchronously: clone the callback, hand it to
/// another thread and send events later. The clone must not be used past
/// `stop_handling` — the callback's output is nulled on dispose and any
/// late dispatch is reported via the error hook.
pub trait EffectHandler<P, E>: Send + Sync + 'static {
    fn handle(&self, payload: P, output: &EffectCallback<E>);

    /// Release handler resources when the owning connection is disposed.
    fn stop_handling(&self) {}
}

impl<P, E, H> EffectHandler<P, E> for H
where
    H: Fn(P, &EffectCallback<E>) + Send + Sync + 'static,
{
    fn handle(&self, payload: P, output: &EffectCallback<E>) {
        self(payload, output)
    }
}

/// Clonable event-dispatch handle given to effect handlers.
pub struct EffectCallback<E> {
    output: Arc<GuardedOutput<E>>,
}

impl<E> Clone for EffectCallback<E> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
        }
    }
}

impl<E> EffectCallback<E> {
    pub(crate) fn new(output: Arc<GuardedOutput<E>>) -> Self {
        Self { output }
    }

    /// Dispatch an event back into the loop.
    pub fn send(&self, event: E) {
        self.output.dispatch(event);
    }
}

/// Output sink gated on a not-yet-disposed slot. Disconnecting nulls the
/// sink so a late dispatch trips the error hook instead of reaching a
/// dead consumer.
pub(crate) struct GuardedOutput<E> {
    sink: Synchronized<Option<Consumer<E>>>,
}

impl<E> GuardedOutput<E> {
    pub(crate) fn new(sink: Consumer<E>) -> Self {
        Self {
            sink: Synchronized::new(Some(sink)),
        }
    }

    pub(crate) fn dispatch(&self, event: E) {
        // Delivered under the slot lock: once `disconnect` returns, no
        // event can still be on its way to the old sink.
        let delivered = self.sink.with_lock(|slot| match slot {
            Some(sink) => {
                sink(event);
                true
            }
            None => false,
        });
        if !delivered {
            signal_error!(
                "[EffectRouter] event dispatched after handler connection was disposed"
            );
        }
    }

    pub(crate) fn disconnect(&self) {
        self.sink.with_lock(|slot| *slot = None);
    }
}
