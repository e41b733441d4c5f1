use crate::builder::LoopBuilder;
use crate::connection::{Connectable, Consumer};
use crate::disposable::{CompositeDisposable, Disposable};
use crate::event_loop::EventLoop;
use crate::hook::signal_error;
use crate::queue::WorkQueue;
use crate::state_machine::{MachineState, StartStopStateMachine};
use std::sync::Arc;

/// Lifecycle manager that starts and stops a loop while preserving its
/// configuration and last-known model.
///
/// While stopped it owns the builder, the pending initial model and the
/// registered view connectables; while running it owns the live loop plus
/// the view/observer attachments. All lifecycle operations serialise on a
/// dedicated queue and must not be invoked re-entrantly from loop
/// callbacks.
pub struct LoopController<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    machine: StartStopStateMachine<ControllerConfig<M, E, F>, ActiveLoop<M, E, F>>,
}

struct ControllerConfig<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    builder: LoopBuilder<M, E, F>,
    model: M,
    views: Vec<Arc<dyn Connectable<M, E>>>,
}

struct ActiveLoop<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    event_loop: Arc<EventLoop<M, E, F>>,
    builder: LoopBuilder<M, E, F>,
    views: Vec<Arc<dyn Connectable<M, E>>>,
    attachments: CompositeDisposable,
}

impl<M, E, F> LoopController<M, E, F>
where
    M: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    pub fn new(builder: LoopBuilder<M, E, F>, initial_model: M) -> Self {
        Self {
            machine: StartStopStateMachine::new(
                "LoopController",
                ControllerConfig {
                    builder,
                    model: initial_model,
                    views: Vec::new(),
                },
                WorkQueue::serial("loop-controller"),
            ),
        }
    }

    /// True from the moment a start begins until the matching stop has
    /// fully completed. Callable from any thread.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    /// Register a model sink / event source pair for future runs.
    /// Permitted only while stopped.
    pub fn connect_view(&self, view: impl Connectable<M, E> + 'static) {
        let view: Arc<dyn Connectable<M, E>> = Arc::new(view);
        self.machine
            .mutate_if_stopped("connect view", move |cfg| cfg.views.push(view));
    }

    /// Drop every registered view. Permitted only while stopped.
    pub fn disconnect_views(&self) {
        self.machine
            .mutate_if_stopped("disconnect views", |cfg| cfg.views.clear());
    }

    /// Replace the configured initial model. Permitted only while stopped.
    pub fn replace_model(&self, model: M) {
        self.machine
            .mutate_if_stopped("replace model", move |cfg| cfg.model = model);
    }

    /// Current model: the live loop's latest model while running, the
    /// configured initial model while stopped.
    pub fn model(&self) -> M {
        self.machine.read(|state| match state {
            MachineState::Stopped(cfg) => cfg.model.clone(),
            MachineState::Running(active) => match active.event_loop.latest_model() {
                Some(model) => model,
                None => {
                    signal_error!("[LoopController] running loop has no model");
                    panic!("running loop has no model");
                }
            },
        })
    }

    /// Build and start a loop from the configured model.
    /// Signals the error hook if already running.
    pub fn start(&self) {
        self.start_with("start", None);
    }

    /// Build and start a loop from `model` instead of the configured one.
    pub fn start_from(&self, model: M) {
        self.start_with("start", Some(model));
    }

    fn start_with(&self, op: &'static str, model_override: Option<M>) {
        self.machine.transition_to_running(op, move |cfg| {
            let model = model_override.unwrap_or_else(|| cfg.model.clone());
            let event_loop = Arc::new(cfg.builder.start_from(model));

            let attachments = CompositeDisposable::new();
            for view in &cfg.views {
                let loop_for_events = event_loop.clone();
                let event_sink: Consumer<E> =
                    Arc::new(move |event: E| loop_for_events.dispatch_event(event));
                let view_connection = Arc::new(view.connect(event_sink));

                // Forward every model snapshot into the view; the current
                // model is replayed to it immediately.
                let into_view = view_connection.clone();
                let observer = event_loop.add_observer(move |model: M| into_view.accept(model));

                attachments.add(view_connection);
                attachments.add(Arc::new(observer));
            }

            Ok(ActiveLoop {
                event_loop,
                builder: cfg.builder,
                views: cfg.views,
                attachments,
            })
        });
    }

    /// Dispose the running loop, retaining its latest model as the new
    /// configured initial model. Signals the error hook if already stopped.
    pub fn stop(&self) {
        self.machine.transition_to_stopped("stop", |active| {
            let model = match active.event_loop.latest_model() {
                Some(model) => model,
                None => {
                    signal_error!("[LoopController] running loop has no model");
                    panic!("running loop has no model");
                }
            };
            active.attachments.dispose();
            active.event_loop.dispose();
            Ok(ControllerConfig {
                builder: active.builder,
                model,
                views: active.views,
            })
        });
    }
}
