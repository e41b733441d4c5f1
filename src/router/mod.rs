pub use handler::{EffectCallback, EffectHandler};

mod handler;

use crate::connection::{Connectable, Connection, Consumer};
use crate::disposable::{AnonymousDisposable, Disposable};
use crate::hook::signal_error;
use crate::utils::AtomicFlag;
use handler::GuardedOutput;
use std::sync::Arc;

/// Declarative routing from an effect value to exactly one handler.
///
/// Routes are appended fluently and become immutable once the router is
/// turned into a [`Connectable`]. For every accepted effect exactly one
/// route must match; zero or several matches are a programmer error
/// reported via the error hook.
///
/// Variant routing is expressed through extractor closures:
///
/// ```ignore
/// let router = EffectRouter::new()
///     .route_payload(
///         |effect| match effect {
///             Effect::Save(payload) => Some(payload.clone()),
///             _ => None,
///         },
///         save_handler,
///     )
///     .route_constant(Effect::Refresh, refresh_handler);
/// ```
pub struct EffectRouter<F, E> {
    routes: Vec<Route<F, E>>,
}

struct Route<F, E> {
    connect_fn: Box<dyn Fn(Consumer<E>) -> LiveRoute<F> + Send + Sync>,
}

struct LiveRoute<F> {
    accept_fn: Box<dyn Fn(&F) -> bool + Send + Sync>,
    teardown: AnonymousDisposable,
}

impl<F, E> EffectRouter<F, E>
where
    F: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Route effects for which `extract` yields a payload to `handler`.
    pub fn route_payload<P, X, H>(mut self, extract: X, handler: H) -> Self
    where
        P: Send + 'static,
        X: Fn(&F) -> Option<P> + Send + Sync + 'static,
        H: EffectHandler<P, E>,
    {
        let extract = Arc::new(extract);
        let handler = Arc::new(handler);

        self.routes.push(Route {
            connect_fn: Box::new(move |output: Consumer<E>| {
                let guarded = Arc::new(GuardedOutput::new(output));
                let callback = EffectCallback::new(guarded.clone());
                let extract = extract.clone();
                let handler = handler.clone();
                let stop = handler.clone();

                LiveRoute {
                    accept_fn: Box::new(move |effect: &F| match extract(effect) {
                        Some(payload) => {
                            handler.handle(payload, &callback);
                            true
                        }
                        None => false,
                    }),
                    teardown: AnonymousDisposable::new(move || {
                        guarded.disconnect();
                        stop.stop_handling();
                    }),
                }
            }),
        });
        self
    }

    /// Route effects equal to `value` to `handler`; the handler receives
    /// the matching effect.
    pub fn route_constant<H>(self, value: F, handler: H) -> Self
    where
        F: Clone + PartialEq + Sync,
        H: EffectHandler<F, E>,
    {
        self.route_payload(
            move |effect: &F| (*effect == value).then(|| effect.clone()),
            handler,
        )
    }

    /// Compose every route into a single `Connectable<Effect, Event>`.
    pub fn into_connectable(self) -> RouterConnectable<F, E> {
        RouterConnectable {
            routes: Arc::new(self.routes),
            connected: AtomicFlag::new(false),
        }
    }
}

impl<F, E> Default for EffectRouter<F, E>
where
    F: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The composed router. Supports one live consumer at a time; a second
/// concurrent `connect` signals the error hook and returns a broken
/// Connection. Reconnecting after dispose is allowed.
pub struct RouterConnectable<F, E> {
    routes: Arc<Vec<Route<F, E>>>,
    connected: AtomicFlag,
}

impl<F, E> Connectable<F, E> for RouterConnectable<F, E>
where
    F: Send + 'static,
    E: Send + 'static,
{
    fn connect(&self, output: Consumer<E>) -> Connection<F> {
        if self.connected.get_and_set(true) {
            signal_error!("[EffectRouter] supports only one connection at a time");
            return Connection::broken();
        }

        let live: Arc<Vec<LiveRoute<F>>> = Arc::new(
            self.routes
                .iter()
                .map(|route| (route.connect_fn)(output.clone()))
                .collect(),
        );

        let accept_routes = live.clone();
        let connected = self.connected.clone();
        Connection::new(
            move |effect: F| {
                let matched = accept_routes
                    .iter()
                    .filter(|route| (route.accept_fn)(&effect))
                    .count();
                if matched != 1 {
                    signal_error!(
                        "[EffectRouter] expected exactly 1 route to match, got {matched}"
                    );
                }
            },
            move || {
                for route in live.iter() {
                    route.teardown.dispose();
                }
                connected.set(false);
            },
        )
    }
}
