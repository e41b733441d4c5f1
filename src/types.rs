use crate::connection::{Connectable, Connection, Consumer};
use std::sync::Arc;

/// Initial state produced when a loop starts: the first model plus any
/// effects to dispatch before regular event processing begins.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct First<M, F> {
    pub model: M,
    pub effects: Vec<F>,
}

impl<M, F> First<M, F> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            effects: Vec::new(),
        }
    }

    pub fn with_effects(model: M, effects: Vec<F>) -> Self {
        Self { model, effects }
    }

    #[inline]
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }
}

/// Result of applying `update` once: an optional successor model plus a
/// list of effects. An absent model means "no state change".
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Next<M, F> {
    model: Option<M>,
    effects: Vec<F>,
}

impl<M, F> Next<M, F> {
    /// Advance to `model` with no effects.
    pub fn next(model: M) -> Self {
        Self {
            model: Some(model),
            effects: Vec::new(),
        }
    }

    /// Advance to `model` and dispatch `effects`.
    pub fn next_with_effects(model: M, effects: Vec<F>) -> Self {
        Self {
            model: Some(model),
            effects,
        }
    }

    /// Keep the current model, dispatch `effects`.
    pub fn dispatch_effects(effects: Vec<F>) -> Self {
        Self {
            model: None,
            effects,
        }
    }

    /// Keep the current model, dispatch nothing.
    pub fn no_change() -> Self {
        Self {
            model: None,
            effects: Vec::new(),
        }
    }

    #[inline]
    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    #[inline]
    pub fn effects(&self) -> &[F] {
        &self.effects
    }

    pub fn into_parts(self) -> (Option<M>, Vec<F>) {
        (self.model, self.effects)
    }
}

impl<M, F> From<First<M, F>> for Next<M, F> {
    fn from(first: First<M, F>) -> Self {
        Next {
            model: Some(first.model),
            effects: first.effects,
        }
    }
}

/// Pure transition function: current model + event → [`Next`].
pub type Update<M, E, F> = Arc<dyn Fn(&M, E) -> Next<M, F> + Send + Sync>;

/// Produces the [`First`] from the starting model when a loop starts.
pub type Initiator<M, F> = Arc<dyn Fn(M) -> First<M, F> + Send + Sync>;

/// Event source that never emits and ignores model updates; the default
/// when a loop is built without one.
pub struct NullEventSource;

impl<M, E> Connectable<M, E> for NullEventSource {
    fn connect(&self, _output: Consumer<E>) -> Connection<M> {
        Connection::new(|_| {}, || {})
    }
}
