use crate::connection::{Connectable, Connection, Consumer};
use crate::disposable::{CompositeDisposable, Disposable};
use crate::hook::signal_error;
use crate::processor::EventProcessor;
use crate::publisher::ConnectablePublisher;
use crate::queue::WorkQueue;
use crate::types::{Initiator, Update};
use crate::utils::AtomicFlag;
use std::sync::Arc;
use uuid::Uuid;
use uuid::fmt::Simple;

/// The runtime composition of update function, event processor, effect
/// handler and observers.
///
/// Events are applied on the serial event queue; effects are scheduled
/// onto the effect queue and may feed events back in at any later time;
/// model snapshots fan out to observers in update-completion order.
/// `dispose` is the sole cancellation primitive: terminal, idempotent,
/// and also triggered by Drop.
pub struct EventLoop<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    id: Simple,
    processor: Arc<EventProcessor<M, E, F>>,
    model_publisher: ConnectablePublisher<M>,
    event_consumer: Consumer<E>,
    connections: CompositeDisposable,
    disposed: AtomicFlag,
    event_queue: WorkQueue,
}

impl<M, E, F> EventLoop<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    /// Wire a loop together and schedule its start. Called by the builder;
    /// `update` and `initiator` arrive already decorated with the logger.
    pub(crate) fn new(
        update: Update<M, E, F>,
        initiator: Initiator<M, F>,
        initial_model: M,
        effect_handler: &Arc<dyn Connectable<F, E>>,
        event_source: &Arc<dyn Connectable<M, E>>,
        event_queue: WorkQueue,
        effect_queue: WorkQueue,
    ) -> Self {
        let id = Uuid::new_v4().simple();
        let next_publisher = ConnectablePublisher::new();
        let model_publisher = ConnectablePublisher::new();
        let processor = Arc::new(EventProcessor::new(update, next_publisher.clone()));
        let disposed = AtomicFlag::new(false);

        // Events from any producer funnel through the event queue.
        let event_consumer: Consumer<E> = {
            let processor = processor.clone();
            let event_queue = event_queue.clone();
            Arc::new(move |event: E| {
                let processor = processor.clone();
                event_queue.submit(move || processor.accept(event));
            })
        };

        let effect_connection = Arc::new(effect_handler.connect(event_consumer.clone()));
        let source_connection = Arc::new(event_source.connect(event_consumer.clone()));

        let next_connection = {
            let model_publisher = model_publisher.clone();
            let source_connection = source_connection.clone();
            let effect_connection = effect_connection.clone();
            let effect_queue = effect_queue.clone();
            let disposed = disposed.clone();
            next_publisher.connect(Arc::new(move |next: crate::types::Next<M, F>| {
                let (model, effects) = next.into_parts();
                if let Some(model) = model {
                    model_publisher.post(model.clone());
                    source_connection.accept(model);
                }
                for effect in effects {
                    let connection = effect_connection.clone();
                    let disposed = disposed.clone();
                    effect_queue.submit(move || {
                        // A job already in flight when the loop is disposed
                        // must stay silent rather than trip the hook.
                        if !disposed.get() {
                            connection.accept(effect);
                        }
                    });
                }
            }))
        };

        let connections = CompositeDisposable::of(vec![
            source_connection as Arc<dyn Disposable>,
            Arc::new(next_connection),
            effect_connection,
        ]);

        {
            let processor = processor.clone();
            event_queue.submit(move || processor.start(initiator(initial_model)));
        }

        tracing::debug!("[EventLoop:{id}] started");

        Self {
            id,
            processor,
            model_publisher,
            event_consumer,
            connections,
            disposed,
            event_queue,
        }
    }

    /// Feed an event into the loop; it is applied asynchronously on the
    /// event queue. Signals the error hook once disposed.
    pub fn dispatch_event(&self, event: E) {
        if self.disposed.get() {
            signal_error!("[EventLoop:{}] event dispatched after dispose", self.id);
            return;
        }
        (self.event_consumer)(event);
    }

    /// Observe model snapshots. The current model (if any) is delivered
    /// immediately; dispose the returned connection to unsubscribe.
    pub fn add_observer(&self, observer: impl Fn(M) + Send + Sync + 'static) -> Connection<M> {
        self.model_publisher.connect(Arc::new(observer))
    }

    /// Snapshot of the current model, serialised through the event queue.
    /// Absent once the loop is disposed.
    pub fn latest_model(&self) -> Option<M> {
        let processor = self.processor.clone();
        self.event_queue
            .submit_wait(move || processor.read_current_model())
    }
}

impl<M, E, F> Disposable for EventLoop<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    fn dispose(&self) {
        if self.disposed.get_and_set(true) {
            return;
        }
        self.model_publisher.dispose();
        self.processor.dispose();
        self.connections.dispose();
        tracing::debug!("[EventLoop:{}] disposed", self.id);
    }
}

impl<M, E, F> Drop for EventLoop<M, E, F>
where
    M: Clone + Send + 'static,
    E: Send + 'static,
    F: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
