pub use crate::builder::LoopBuilder;
pub use crate::connection::{AnonymousConnectable, Connectable, Connection, Consumer};
pub use crate::controller::LoopController;
pub use crate::disposable::{AnonymousDisposable, CompositeDisposable, Disposable};
pub use crate::event_loop::EventLoop;
pub use crate::logger::{FileSink, LogRotation, LoggerConfig, LoopLogger, NoopLogger, TracingLogger};
pub use crate::processor::EventProcessor;
pub use crate::publisher::ConnectablePublisher;
pub use crate::queue::WorkQueue;
pub use crate::router::{EffectCallback, EffectHandler, EffectRouter, RouterConnectable};
pub use crate::state_machine::{MachineState, RawState, StartStopStateMachine};
pub use crate::types::{First, Initiator, Next, NullEventSource, Update};
pub use crate::utils::{AtomicFlag, Synchronized};
