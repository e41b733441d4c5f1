use crate::connection::Connectable;
use crate::event_loop::EventLoop;
use crate::logger::{LoopLogger, NoopLogger};
use crate::queue::WorkQueue;
use crate::types::{First, Initiator, Next, NullEventSource, Update};
use std::sync::Arc;

/// Configuration of a loop: update function, effect handler, and the
/// optional collaborators. Unset queues default to fresh serial queues,
/// the unset event source to the null source, the unset logger to the
/// no-op logger.
pub struct LoopBuilder<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    update: Update<M, E, F>,
    effect_handler: Arc<dyn Connectable<F, E>>,
    initiator: Initiator<M, F>,
    event_source: Arc<dyn Connectable<M, E>>,
    event_queue: Option<WorkQueue>,
    effect_queue: Option<WorkQueue>,
    logger: Arc<dyn LoopLogger<M, E, F>>,
}

impl<M, E, F> LoopBuilder<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    pub fn new(
        update: impl Fn(&M, E) -> Next<M, F> + Send + Sync + 'static,
        effect_handler: impl Connectable<F, E> + 'static,
    ) -> Self {
        Self {
            update: Arc::new(update),
            effect_handler: Arc::new(effect_handler),
            initiator: Arc::new(First::new),
            event_source: Arc::new(NullEventSource),
            event_queue: None,
            effect_queue: None,
            logger: Arc::new(NoopLogger),
        }
    }

    /// Replace the default initiator (which starts with no effects).
    pub fn with_initiator(mut self, initiator: impl Fn(M) -> First<M, F> + Send + Sync + 'static) -> Self {
        self.initiator = Arc::new(initiator);
        self
    }

    /// Attach an event source; it observes model updates and may emit
    /// events, including synchronously while connecting.
    pub fn with_event_source(mut self, source: impl Connectable<M, E> + 'static) -> Self {
        self.event_source = Arc::new(source);
        self
    }

    pub fn with_event_queue(mut self, queue: WorkQueue) -> Self {
        self.event_queue = Some(queue);
        self
    }

    /// Use a caller-supplied effect queue. A concurrent queue is allowed;
    /// cross-effect ordering then becomes non-deterministic.
    pub fn with_effect_queue(mut self, queue: WorkQueue) -> Self {
        self.effect_queue = Some(queue);
        self
    }

    pub fn with_logger(mut self, logger: impl LoopLogger<M, E, F> + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Build and start a loop from `model`.
    pub fn start_from(&self, model: M) -> EventLoop<M, E, F> {
        let logger = self.logger.clone();
        let update = self.update.clone();
        let logged_update: Update<M, E, F> = Arc::new(move |model, event: E| {
            logger.will_update(model, &event);
            let next = update(model, event.clone());
            logger.did_update(model, &event, &next);
            next
        });

        let logger = self.logger.clone();
        let initiator = self.initiator.clone();
        let logged_initiator: Initiator<M, F> = Arc::new(move |model: M| {
            logger.will_initiate(&model);
            let first = initiator(model.clone());
            logger.did_initiate(&model, &first);
            first
        });

        EventLoop::new(
            logged_update,
            logged_initiator,
            model,
            &self.effect_handler,
            &self.event_source,
            self.event_queue
                .clone()
                .unwrap_or_else(|| WorkQueue::serial("loop-events")),
            self.effect_queue
                .clone()
                .unwrap_or_else(|| WorkQueue::serial("loop-effects")),
        )
    }
}

impl<M, E, F> Clone for LoopBuilder<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            update: self.update.clone(),
            effect_handler: self.effect_handler.clone(),
            initiator: self.initiator.clone(),
            event_source: self.event_source.clone(),
            event_queue: self.event_queue.clone(),
            effect_queue: self.effect_queue.clone(),
            logger: self.logger.clone(),
        }
    }
}
