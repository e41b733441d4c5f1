use crate::hook::signal_error;
use crate::queue::WorkQueue;
use crate::utils::Synchronized;
use crossbeam::utils::CachePadded;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Coarse lifecycle state, readable lock-free from any thread.
/// Mutation is confined to the machine's queue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum RawState {
    Stopped = 0,
    TransitioningToRunning = 1,
    Running = 2,
    TransitioningToStopped = 3,
}

impl RawState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RawState::Stopped,
            1 => RawState::TransitioningToRunning,
            2 => RawState::Running,
            _ => RawState::TransitioningToStopped,
        }
    }
}

/// View of the machine's payload handed to [`StartStopStateMachine::read`].
pub enum MachineState<'a, S, R> {
    Stopped(&'a S),
    Running(&'a R),
}

/// Start/stop state machine holding a stopped payload `S` or a running
/// payload `R`, never both. All mutators serialise on a designated queue
/// and block the caller; they must not be invoked from that queue (the
/// violation is reported via the error hook and becomes a no-op).
///
/// `is_running` reads the raw state atomically and returns true through
/// both transitional states: a collaborator fired synchronously inside the
/// start transition already observes a running machine.
pub struct StartStopStateMachine<S, R>
where
    S: Send + 'static,
    R: Send + 'static,
{
    core: Arc<MachineCore<S, R>>,
    queue: WorkQueue,
}

struct MachineCore<S, R> {
    label: String,
    raw: CachePadded<AtomicU8>,
    stopped: Synchronized<Option<S>>,
    running: Synchronized<Option<R>>,
}

impl<S, R> MachineCore<S, R> {
    #[inline]
    fn raw_state(&self) -> RawState {
        RawState::from_u8(self.raw.load(Ordering::Acquire))
    }

    #[inline]
    fn set_raw(&self, state: RawState) {
        self.raw.store(state as u8, Ordering::Release);
    }
}

impl<S, R> StartStopStateMachine<S, R>
where
    S: Send + 'static,
    R: Send + 'static,
{
    pub fn new(label: impl Into<String>, initial: S, queue: WorkQueue) -> Self {
        Self {
            core: Arc::new(MachineCore {
                label: label.into(),
                raw: CachePadded::new(AtomicU8::new(RawState::Stopped as u8)),
                stopped: Synchronized::new(Some(initial)),
                running: Synchronized::new(None),
            }),
            queue,
        }
    }

    #[inline]
    pub fn raw_state(&self) -> RawState {
        self.core.raw_state()
    }

    /// False only when fully stopped; true while running and during both
    /// transitions. Callable from any thread, lock-free.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.core.raw_state() != RawState::Stopped
    }

    fn reject_on_own_queue(&self, op: &str) -> bool {
        if self.queue.on_queue() {
            signal_error!(
                "[StateMachine:{}] {op} must not be called from the machine's own queue",
                self.core.label
            );
            return true;
        }
        false
    }

    /// Update the stopped payload in place; reported via the error hook
    /// when the machine is not stopped.
    pub fn mutate_if_stopped(&self, op: &'static str, f: impl FnOnce(&mut S) + Send + 'static) {
        if self.reject_on_own_queue(op) {
            return;
        }
        let core = self.core.clone();
        self.queue.submit_wait(move || {
            if core.raw_state() != RawState::Stopped {
                signal_error!("[StateMachine:{}] {op} requested while running", core.label);
                return;
            }
            core.stopped.with_lock(|slot| match slot.as_mut() {
                Some(state) => f(state),
                None => signal_error!("[StateMachine:{}] stopped state missing", core.label),
            });
        });
    }

    /// Consume the stopped payload and attempt to produce a running one.
    /// `Err` restores the stopped payload unchanged.
    pub fn transition_to_running(
        &self,
        op: &'static str,
        f: impl FnOnce(S) -> Result<R, S> + Send + 'static,
    ) {
        if self.reject_on_own_queue(op) {
            return;
        }
        let core = self.core.clone();
        self.queue.submit_wait(move || {
            if core.raw_state() != RawState::Stopped {
                signal_error!(
                    "[StateMachine:{}] {op} requested while already running",
                    core.label
                );
                return;
            }
            let Some(state) = core.stopped.with_lock(|slot| slot.take()) else {
                signal_error!("[StateMachine:{}] stopped state missing", core.label);
                return;
            };
            core.set_raw(RawState::TransitioningToRunning);
            match f(state) {
                Ok(running) => {
                    core.running.with_lock(|slot| *slot = Some(running));
                    core.set_raw(RawState::Running);
                }
                Err(stopped) => {
                    core.stopped.with_lock(|slot| *slot = Some(stopped));
                    core.set_raw(RawState::Stopped);
                }
            }
        });
    }

    /// Consume the running payload and attempt to produce a stopped one.
    /// `Err` restores the running payload unchanged.
    pub fn transition_to_stopped(
        &self,
        op: &'static str,
        f: impl FnOnce(R) -> Result<S, R> + Send + 'static,
    ) {
        if self.reject_on_own_queue(op) {
            return;
        }
        let core = self.core.clone();
        self.queue.submit_wait(move || {
            if core.raw_state() != RawState::Running {
                signal_error!(
                    "[StateMachine:{}] {op} requested while already stopped",
                    core.label
                );
                return;
            }
            let Some(state) = core.running.with_lock(|slot| slot.take()) else {
                signal_error!("[StateMachine:{}] running state missing", core.label);
                return;
            };
            core.set_raw(RawState::TransitioningToStopped);
            match f(state) {
                Ok(stopped) => {
                    core.stopped.with_lock(|slot| *slot = Some(stopped));
                    core.set_raw(RawState::Stopped);
                }
                Err(running) => {
                    core.running.with_lock(|slot| *slot = Some(running));
                    core.set_raw(RawState::Running);
                }
            }
        });
    }

    /// Observe the current payload on the machine's queue. Runs inline
    /// when already on the queue, so the machine stays observable from
    /// re-entrant callers. Panics (via the default hook policy) if neither
    /// payload is present, which is only reachable by reading from inside
    /// a transition closure.
    pub fn read<T>(
        &self,
        f: impl for<'a> FnOnce(MachineState<'a, S, R>) -> T + Send + 'static,
    ) -> T
    where
        T: Send + 'static,
    {
        let core = self.core.clone();
        self.queue.submit_wait(move || Self::read_now(&core, f))
    }

    fn read_now<T>(
        core: &MachineCore<S, R>,
        f: impl for<'a> FnOnce(MachineState<'a, S, R>) -> T,
    ) -> T {
        match core.raw_state() {
            RawState::Stopped | RawState::TransitioningToRunning => {
                core.stopped.with_lock(|slot| match slot.as_ref() {
                    Some(state) => f(MachineState::Stopped(state)),
                    None => {
                        signal_error!("[StateMachine:{}] no state to read", core.label);
                        panic!("state machine has no readable state");
                    }
                })
            }
            RawState::Running | RawState::TransitioningToStopped => {
                core.running.with_lock(|slot| match slot.as_ref() {
                    Some(state) => f(MachineState::Running(state)),
                    None => {
                        signal_error!("[StateMachine:{}] no state to read", core.label);
                        panic!("state machine has no readable state");
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::testing::HookRecorder;

    fn machine(label: &str) -> Arc<StartStopStateMachine<String, u32>> {
        Arc::new(StartStopStateMachine::new(
            label,
            "config".to_string(),
            WorkQueue::serial(&format!("{label}-queue")),
        ))
    }

    #[test]
    fn transitions_move_payload_between_slots() {
        let m = machine("t1");
        assert!(!m.is_running());

        m.transition_to_running("start", |cfg| {
            assert_eq!(cfg, "config");
            Ok(42)
        });
        assert!(m.is_running());
        assert_eq!(m.raw_state(), RawState::Running);

        m.transition_to_stopped("stop", |running| {
            assert_eq!(running, 42);
            Ok("retained".to_string())
        });
        assert!(!m.is_running());
        let seen = m.read(|state| match state {
            MachineState::Stopped(s) => s.clone(),
            MachineState::Running(_) => unreachable!(),
        });
        assert_eq!(seen, "retained");
    }

    #[test]
    fn failed_transition_restores_prior_state() {
        let m = machine("t2");
        m.transition_to_running("start", |cfg| Err(cfg));
        assert!(!m.is_running());
        let intact = m.read(|state| matches!(state, MachineState::Stopped(_)));
        assert!(intact);
    }

    #[test]
    fn is_running_is_true_inside_the_start_transition() {
        let m = machine("t3");
        let probe = m.clone();
        let observed = Arc::new(Synchronized::new(None));
        let seen = observed.clone();
        m.transition_to_running("start", move |_| {
            // Re-entrant observation from inside the transition closure.
            seen.with_lock(|s| *s = Some(probe.is_running()));
            Ok(1)
        });
        assert_eq!(observed.with_lock(|s| *s), Some(true));
    }

    #[test]
    fn wrong_state_mutators_signal_hook_and_noop() {
        let hook = HookRecorder::install();
        let m = machine("t4");

        m.transition_to_stopped("stop", |r| Ok(format!("{r}")));
        assert!(hook.contains("stop requested while already stopped"));
        assert!(!m.is_running());

        m.transition_to_running("start", |_| Ok(5));
        m.transition_to_running("start", |_| Ok(6));
        assert!(hook.contains("start requested while already running"));

        m.mutate_if_stopped("replace model", |_| {});
        assert!(hook.contains("replace model requested while running"));
        let running = m.read(|state| match state {
            MachineState::Running(r) => *r == 5,
            MachineState::Stopped(_) => false,
        });
        assert!(running);
    }

    #[test]
    fn mutators_from_own_queue_are_rejected() {
        let hook = HookRecorder::install();
        let queue = WorkQueue::serial("t5-queue");
        let m = Arc::new(StartStopStateMachine::<String, u32>::new(
            "t5",
            "config".to_string(),
            queue.clone(),
        ));
        let inner = m.clone();
        queue.submit_wait(move || {
            inner.mutate_if_stopped("mutate", |_| {});
        });
        assert!(hook.contains("must not be called from the machine's own queue"));
        // The payload is untouched and usable afterwards.
        m.mutate_if_stopped("mutate", |cfg| cfg.push_str("!"));
        let seen = m.read(|state| match state {
            MachineState::Stopped(s) => s.clone(),
            MachineState::Running(_) => unreachable!(),
        });
        assert_eq!(seen, "config!");
    }
}
