use crate::disposable::Disposable;
use crate::hook::signal_error;
use crate::publisher::ConnectablePublisher;
use crate::types::{First, Next, Update};
use crate::utils::Synchronized;

/// Serialises model mutation and publishes the results.
///
/// All mutating calls are expected to arrive on the loop's event queue;
/// the internal lock exists because `dispose` and snapshot reads may come
/// from any thread. Publishing happens outside the lock, which is safe
/// because writers are confined to the serial event queue.
pub struct EventProcessor<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    update: Update<M, E, F>,
    publisher: ConnectablePublisher<Next<M, F>>,
    state: Synchronized<ProcessorState<M, E>>,
}

struct ProcessorState<M, E> {
    current: Option<M>,
    queued: Vec<E>,
    started: bool,
    disposed: bool,
}

enum Accepted<E> {
    Dropped,
    Queued,
    Apply(E),
}

impl<M, E, F> EventProcessor<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    pub fn new(update: Update<M, E, F>, publisher: ConnectablePublisher<Next<M, F>>) -> Self {
        Self {
            update,
            publisher,
            state: Synchronized::new(ProcessorState {
                current: None,
                queued: Vec::new(),
                started: false,
                disposed: false,
            }),
        }
    }

    /// Set the first model, publish it with its effects, then drain every
    /// event accepted before start, in FIFO order.
    pub fn start(&self, first: First<M, F>) {
        enum Started<E> {
            Drain(Vec<E>),
            Rejected,
        }

        let outcome = self.state.with_lock(|st| {
            if st.disposed {
                return Started::Rejected;
            }
            if st.started {
                signal_error!("[EventProcessor] start called twice");
                return Started::Rejected;
            }
            st.started = true;
            st.current = Some(first.model.clone());
            Started::Drain(std::mem::take(&mut st.queued))
        });

        let Started::Drain(queued) = outcome else {
            return;
        };
        self.publisher.post(Next::from(first));
        for event in queued {
            self.apply(event);
        }
    }

    /// Queue the event when called before start, otherwise apply `update`
    /// exactly once. Silent no-op after dispose.
    pub fn accept(&self, event: E) {
        let accepted = self.state.with_lock(|st| {
            if st.disposed {
                return Accepted::Dropped;
            }
            if !st.started {
                st.queued.push(event);
                return Accepted::Queued;
            }
            Accepted::Apply(event)
        });

        if let Accepted::Apply(event) = accepted {
            self.apply(event);
        }
    }

    fn apply(&self, event: E) {
        let next = self.state.with_lock(|st| {
            if st.disposed {
                return None;
            }
            let Some(model) = st.current.as_ref() else {
                signal_error!("[EventProcessor] no model while started");
                return None;
            };
            let next = (self.update)(model, event);
            if let Some(model) = next.model() {
                st.current = Some(model.clone());
            }
            Some(next)
        });

        if let Some(next) = next {
            self.publisher.post(next);
        }
    }

    /// Snapshot of the current model; absent before start or after dispose.
    pub fn read_current_model(&self) -> Option<M> {
        self.state.with_lock(|st| st.current.clone())
    }
}

impl<M, E, F> Disposable for EventProcessor<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    fn dispose(&self) {
        self.state.with_lock(|st| {
            st.disposed = true;
            st.current = None;
            st.queued.clear();
        });
        self.publisher.dispose();
    }
}
