use crate::connection::{Connection, Consumer};
use crate::disposable::Disposable;
use crate::hook::signal_error;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::Arc;
use uuid::Uuid;

/// Fan-out broadcaster: accepts values from one producer and forwards them
/// to every subscriber until disposed.
///
/// The latest posted value is retained and replayed to new subscribers, so
/// a late subscriber immediately observes the current value.
///
/// Delivery happens with the re-entrant registry lock held: a consumer
/// callback may subscribe, unsubscribe or post again from the delivering
/// thread without deadlocking (set mutations take effect on the next
/// post), while `dispose` from another thread cannot complete in the
/// middle of a delivery — once it returns, no callback runs.
pub struct ConnectablePublisher<T: Clone + Send + 'static> {
    inner: Arc<ReentrantMutex<RefCell<State<T>>>>,
}

struct Registry<T> {
    subscribers: Vec<(Uuid, Consumer<T>)>,
    last: Option<T>,
}

enum State<T> {
    Open(Registry<T>),
    Closed,
}

impl<T: Clone + Send + 'static> ConnectablePublisher<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(State::Open(Registry {
                subscribers: Vec::new(),
                last: None,
            })))),
        }
    }

    /// Deliver `value` to every subscriber present at the start of the
    /// call, in subscription order. Silently ignored once disposed.
    pub fn post(&self, value: T) {
        let guard = self.inner.lock();
        let consumers: Vec<Consumer<T>> = {
            let mut state = guard.borrow_mut();
            match &mut *state {
                State::Closed => return,
                State::Open(reg) => {
                    reg.last = Some(value.clone());
                    reg.subscribers.iter().map(|(_, c)| c.clone()).collect()
                }
            }
        };
        // The RefCell borrow is released before delivery so callbacks can
        // re-enter the registry; the lock itself stays held.
        for consumer in consumers {
            consumer(value.clone());
        }
    }

    /// Subscribe a sink. Multiple subscribers are allowed; the returned
    /// Connection's accept is unused and its dispose unsubscribes.
    pub fn connect(&self, sink: Consumer<T>) -> Connection<T> {
        let token = Uuid::new_v4();
        {
            let guard = self.inner.lock();
            let registered = {
                let mut state = guard.borrow_mut();
                match &mut *state {
                    State::Closed => None,
                    State::Open(reg) => {
                        reg.subscribers.push((token, sink.clone()));
                        Some(reg.last.clone())
                    }
                }
            };
            match registered {
                None => {
                    drop(guard);
                    signal_error!("[ConnectablePublisher] connect called after dispose");
                    return Connection::broken();
                }
                // Replay with the lock held so the replayed value and
                // subsequent posts cannot arrive out of order.
                Some(Some(value)) => sink(value),
                Some(None) => {}
            }
        }

        let inner = self.inner.clone();
        Connection::new(
            |_| {},
            move || {
                let guard = inner.lock();
                let mut state = guard.borrow_mut();
                if let State::Open(reg) = &mut *state {
                    reg.subscribers.retain(|(t, _)| *t != token);
                }
            },
        )
    }
}

impl<T: Clone + Send + 'static> Clone for ConnectablePublisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for ConnectablePublisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Disposable for ConnectablePublisher<T> {
    /// Close the publisher and drop all subscribers. Further `post` is
    /// ignored; further `connect` signals the hook and returns broken.
    fn dispose(&self) {
        let guard = self.inner.lock();
        *guard.borrow_mut() = State::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::testing::HookRecorder;
    use crate::utils::Synchronized;

    fn recording_sink(log: &Arc<Synchronized<Vec<String>>>) -> Consumer<String> {
        let log = log.clone();
        Arc::new(move |v: String| log.with_lock(|l| l.push(v)))
    }

    #[test]
    fn posts_fan_out_in_subscription_order() {
        let publisher = ConnectablePublisher::<String>::new();
        let log = Arc::new(Synchronized::new(Vec::new()));
        let first = log.clone();
        let second = log.clone();
        let _a = publisher.connect(Arc::new(move |v: String| {
            first.with_lock(|l| l.push(format!("a:{v}")));
        }));
        let _b = publisher.connect(Arc::new(move |v: String| {
            second.with_lock(|l| l.push(format!("b:{v}")));
        }));

        publisher.post("x".into());
        assert_eq!(log.with_lock(|l| l.clone()), vec!["a:x", "b:x"]);
    }

    #[test]
    fn connect_replays_latest_value() {
        let publisher = ConnectablePublisher::<String>::new();
        publisher.post("one".into());
        publisher.post("two".into());

        let log = Arc::new(Synchronized::new(Vec::new()));
        let _conn = publisher.connect(recording_sink(&log));
        publisher.post("three".into());

        assert_eq!(log.with_lock(|l| l.clone()), vec!["two", "three"]);
    }

    #[test]
    fn disposed_subscription_stops_receiving() {
        let publisher = ConnectablePublisher::<String>::new();
        publisher.post("seed".into());

        let log = Arc::new(Synchronized::new(Vec::new()));
        let conn = publisher.connect(recording_sink(&log));
        conn.dispose();
        publisher.post("late".into());

        assert_eq!(log.with_lock(|l| l.clone()), vec!["seed"]);
    }

    #[test]
    fn reentrant_unsubscribe_from_callback_takes_effect_next_post() {
        let publisher = ConnectablePublisher::<u32>::new();
        let log = Arc::new(Synchronized::new(Vec::new()));

        let conn_slot: Arc<Synchronized<Option<Connection<u32>>>> =
            Arc::new(Synchronized::new(None));
        let slot = conn_slot.clone();
        let l = log.clone();
        let conn = publisher.connect(Arc::new(move |v: u32| {
            l.with_lock(|log| log.push(v));
            // Unsubscribe from inside the delivery callback.
            if let Some(conn) = slot.with_lock(|s| s.take()) {
                conn.dispose();
            }
        }));
        conn_slot.with_lock(|s| *s = Some(conn));

        publisher.post(1);
        publisher.post(2);
        assert_eq!(log.with_lock(|l| l.clone()), vec![1]);
    }

    #[test]
    fn reentrant_subscribe_from_callback_receives_later_posts() {
        let publisher = ConnectablePublisher::<u32>::new();
        let log = Arc::new(Synchronized::new(Vec::new()));

        let nested = publisher.clone();
        let l = log.clone();
        let _conn = publisher.connect(Arc::new(move |v: u32| {
            l.with_lock(|log| log.push(format!("outer:{v}")));
            if v == 1 {
                let l = l.clone();
                let _ = nested.connect(Arc::new(move |v: u32| {
                    l.with_lock(|log| log.push(format!("inner:{v}")));
                }));
            }
        }));

        publisher.post(1);
        publisher.post(2);
        // The nested subscriber gets the replay of 1, then the next post.
        assert_eq!(
            log.with_lock(|l| l.clone()),
            vec!["outer:1", "inner:1", "outer:2", "inner:2"]
        );
    }

    #[test]
    fn dispose_silences_post_and_rejects_connect() {
        let hook = HookRecorder::install();
        let publisher = ConnectablePublisher::<String>::new();
        publisher.dispose();
        publisher.post("ignored".into());

        let log = Arc::new(Synchronized::new(Vec::new()));
        let conn = publisher.connect(recording_sink(&log));
        conn.accept("swallowed".into());
        conn.dispose();

        assert!(log.with_lock(|l| l.is_empty()));
        assert!(hook.contains("connect called after dispose"));
    }
}
